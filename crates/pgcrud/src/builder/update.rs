use std::collections::BTreeSet;

use crate::error::{CrudError, CrudResult};
use crate::ident::sql_ident;
use crate::query::{QueryGroup, compile_where, literal};
use crate::value::{FieldValue, Record};

use super::{ID_FIELD, require_ids, resolve_fields};

/// Fields updated for a batch: `fields` when given, else the first record's keys minus `id`.
pub fn update_fields(records: &[Record], fields: &[String]) -> Vec<String> {
    resolve_fields(records, fields, true)
}

/// `a='x', b=1`. The record's non-id keys must be exactly `fields`.
fn set_clause(index: usize, record: &Record, fields: &[String]) -> CrudResult<String> {
    if fields.is_empty() {
        return Err(CrudError::params("no fields to update"));
    }
    let wanted: BTreeSet<&str> = fields.iter().map(String::as_str).collect();
    let present: BTreeSet<&str> = record
        .keys()
        .map(String::as_str)
        .filter(|k| *k != ID_FIELD)
        .collect();
    if wanted != present {
        return Err(CrudError::params(format!(
            "Record #{}: fields [{}] do not match update fields [{}]",
            index + 1,
            present.into_iter().collect::<Vec<_>>().join(", "),
            wanted.into_iter().collect::<Vec<_>>().join(", "),
        )));
    }

    let mut parts = Vec::with_capacity(fields.len());
    for field in fields {
        let value = record.get(field).unwrap_or(&FieldValue::Null);
        parts.push(format!(
            "{}={}",
            sql_ident(field)?,
            literal::scalar(field, "update", value)?
        ));
    }
    Ok(parts.join(", "))
}

fn single(records: &[Record]) -> CrudResult<&Record> {
    match records {
        [record] => Ok(record),
        _ => Err(CrudError::params(
            "exactly one record is required for an update by ids or by condition",
        )),
    }
}

/// One `UPDATE ... WHERE id='..'` per record, each keyed by its own `id`.
pub fn update_by_records(
    table: &str,
    records: &[Record],
    fields: &[String],
) -> CrudResult<Vec<String>> {
    let table = sql_ident(table)?;
    let fields = update_fields(records, fields);
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let id = match record.get(ID_FIELD) {
                Some(FieldValue::String(id)) if !id.is_empty() => literal::quote(id),
                Some(FieldValue::Integer(id)) => id.to_string(),
                _ => {
                    return Err(CrudError::params(format!(
                        "Record #{}: a non-empty string or integer id is required",
                        i + 1
                    )));
                }
            };
            let set = set_clause(i, record, &fields)?;
            Ok(format!("UPDATE {table} SET {set} WHERE {ID_FIELD}={id}"))
        })
        .collect()
}

/// Apply one record's values to every id in `ids`.
pub fn update_by_ids<S: AsRef<str>>(
    table: &str,
    records: &[Record],
    fields: &[String],
    ids: &[S],
) -> CrudResult<String> {
    let table = sql_ident(table)?;
    require_ids(ids)?;
    let record = single(records)?;
    let set = set_clause(0, record, &update_fields(records, fields))?;
    Ok(format!(
        "UPDATE {table} SET {set} WHERE {ID_FIELD} IN ({})",
        literal::id_list(ids)
    ))
}

/// Apply one record's values to every row matching `groups`.
pub fn update_by_param(
    table: &str,
    records: &[Record],
    fields: &[String],
    groups: &[QueryGroup],
) -> CrudResult<String> {
    let table = sql_ident(table)?;
    let record = single(records)?;
    let where_clause = compile_where(groups)?;
    let set = set_clause(0, record, &update_fields(records, fields))?;
    Ok(format!("UPDATE {table} SET {set} {where_clause}"))
}
