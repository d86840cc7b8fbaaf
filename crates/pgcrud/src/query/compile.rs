//! WHERE predicate compilation.

use super::literal;
use super::operator::{LinkOp, Operator};
use super::types::{QueryGroup, QueryItem};
use crate::error::{CrudError, CrudResult};
use crate::ident::sql_ident;
use crate::value::FieldValue;

/// Compile `groups` into `WHERE ...`.
pub fn compile_where(groups: &[QueryGroup]) -> CrudResult<String> {
    compile_predicate(groups).map(|p| format!("WHERE {p}"))
}

/// Compile `groups` into a bare predicate (no `WHERE` keyword).
pub fn compile_predicate(groups: &[QueryGroup]) -> CrudResult<String> {
    if groups.is_empty() {
        return Err(CrudError::EmptyCondition);
    }

    let mut ordered: Vec<&QueryGroup> = groups.iter().collect();
    ordered.sort_by_key(|g| g.group_order);

    let mut clauses = Vec::with_capacity(ordered.len());
    for group in ordered {
        if let Some(body) = compile_group(group)? {
            clauses.push((
                format!("({body})"),
                LinkOp::parse_or_default(&group.group_link_op),
            ));
        }
    }

    if clauses.is_empty() {
        return Err(CrudError::NoValidCondition);
    }
    Ok(join_linked(&clauses))
}

/// Joins clauses with each clause's own link op; the last link op is unused.
fn join_linked(clauses: &[(String, LinkOp)]) -> String {
    let mut out = String::new();
    for (i, (text, op)) in clauses.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(text);
        if i + 1 < clauses.len() {
            out.push(' ');
            out.push_str(op.as_sql());
        }
    }
    out
}

fn compile_group(group: &QueryGroup) -> CrudResult<Option<String>> {
    if group.group_items.is_empty() {
        return Ok(None);
    }

    let mut items: Vec<&QueryItem> = group.group_items.iter().collect();
    items.sort_by_key(|i| i.group_item_order);

    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        if let Some(text) = compile_item(item)? {
            parts.push((text, LinkOp::parse_or_default(&item.group_item_op)));
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(join_linked(&parts)))
}

fn compile_item(item: &QueryItem) -> CrudResult<Option<String>> {
    let mut fields = item.group_item.iter();
    let Some((field, ops)) = fields.next() else {
        return Ok(None);
    };
    if fields.next().is_some() {
        return Err(CrudError::InvalidGroupItem(format!(
            "expected exactly one field per group item, found {}",
            item.group_item.len()
        )));
    }

    let mut entries = ops.iter();
    let Some((op_name, value)) = entries.next() else {
        return Ok(None);
    };
    if entries.next().is_some() {
        return Err(CrudError::InvalidGroupItem(format!(
            "expected exactly one operator for field '{field}', found {}",
            ops.len()
        )));
    }

    if field.trim().is_empty() || op_name.trim().is_empty() || value.is_null() {
        return Ok(None);
    }

    let op = Operator::parse(op_name)?;
    let column = sql_ident(field)?;
    compile_condition(&column, field, op, value).map(Some)
}

fn compile_condition(
    column: &str,
    field: &str,
    op: Operator,
    value: &FieldValue,
) -> CrudResult<String> {
    if !op.accepts(value) {
        return Err(CrudError::unsupported_value(
            field,
            op.as_str(),
            value.type_name(),
        ));
    }

    if let Some(symbol) = op.comparison_symbol() {
        return Ok(format!(
            "{column}{symbol}{}",
            literal::scalar(field, op.as_str(), value)?
        ));
    }

    if let FieldValue::String(s) = value {
        let (keyword, pattern) = match op {
            Operator::StartsWith => ("LIKE", format!("{s}%")),
            Operator::EndsWith => ("LIKE", format!("%{s}")),
            Operator::Contains => ("LIKE", format!("%{s}%")),
            Operator::NotStartsWith => ("NOT LIKE", format!("{s}%")),
            Operator::NotEndsWith => ("NOT LIKE", format!("%{s}")),
            Operator::NotContains => ("NOT LIKE", format!("%{s}%")),
            _ => return Err(CrudError::unsupported_value(field, op.as_str(), "string")),
        };
        return Ok(format!("{column} {keyword} {}", literal::quote(&pattern)));
    }

    let keyword = if op == Operator::NotIn { "NOT IN" } else { "IN" };
    match literal::list(field, op.as_str(), value)? {
        Some(list) if !list.is_empty() => Ok(format!("{column} {keyword} ({list})")),
        Some(_) => Err(CrudError::InvalidGroupItem(format!(
            "empty value list for field '{field}'"
        ))),
        None => Err(CrudError::unsupported_value(
            field,
            op.as_str(),
            value.type_name(),
        )),
    }
}
