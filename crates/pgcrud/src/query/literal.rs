//! SQL literal formatting for inlined values.
//!
//! Strings that parse as JSON are emitted as a quoted JSON string inside the
//! SQL literal (`{"a":1}` becomes `'"{\"a\":1}"'`), plain strings as `'s'`.
//! Both the condition compiler and the literal INSERT/UPDATE builders use
//! [`scalar`], so the two stay consistent.

use crate::error::{CrudError, CrudResult};
use crate::value::FieldValue;
use chrono::{DateTime, Utc};

/// Fixed-precision timestamp literal body.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Quote `s` as a SQL string literal, doubling embedded single quotes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Whether `s` would be treated as JSON by [`string`].
pub fn looks_like_json(s: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(s).is_ok()
}

/// String literal with JSON sniffing.
pub fn string(s: &str) -> String {
    if looks_like_json(s) {
        quote(&serde_json::Value::String(s.to_string()).to_string())
    } else {
        quote(s)
    }
}

pub fn timestamp(t: &DateTime<Utc>) -> String {
    quote(&t.format(TIMESTAMP_FORMAT).to_string())
}

fn number(field: &str, operator: &str, f: f64) -> CrudResult<String> {
    if f.is_finite() {
        Ok(f.to_string())
    } else {
        Err(CrudError::unsupported_value(field, operator, "non-finite float"))
    }
}

/// Literal for a value inlined into a comparison or a SET/VALUES list.
///
/// `field` and `operator` only label the error for NaN and infinite floats,
/// which have no bare SQL literal.
pub fn scalar(field: &str, operator: &str, value: &FieldValue) -> CrudResult<String> {
    Ok(match value {
        FieldValue::Null => "NULL".to_string(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Float(f) => number(field, operator, *f)?,
        FieldValue::Timestamp(t) => timestamp(t),
        FieldValue::String(s) => string(s),
        FieldValue::StringArray(items) => {
            let body = items
                .iter()
                .map(|s| format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")))
                .collect::<Vec<_>>()
                .join(",");
            quote(&format!("{{{body}}}"))
        }
        FieldValue::NumericArray(items) => {
            let body = items
                .iter()
                .map(|f| number(field, operator, *f))
                .collect::<CrudResult<Vec<_>>>()?
                .join(",");
            quote(&format!("{{{body}}}"))
        }
    })
}

/// Comma-joined element list for `IN (...)`. `None` for non-array values.
pub fn list(field: &str, operator: &str, value: &FieldValue) -> CrudResult<Option<String>> {
    let items = match value {
        FieldValue::StringArray(items) => items.iter().map(|s| quote(s)).collect::<Vec<_>>(),
        FieldValue::NumericArray(items) => items
            .iter()
            .map(|f| number(field, operator, *f))
            .collect::<CrudResult<Vec<_>>>()?,
        _ => return Ok(None),
    };
    Ok(Some(items.join(", ")))
}

/// `'a', 'b'` for a list of ids.
pub fn id_list<S: AsRef<str>>(ids: &[S]) -> String {
    ids.iter()
        .map(|id| quote(id.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
