use serde::{Deserialize, Serialize};
use tokio_postgres::types::ToSql;

use crate::error::{CrudError, CrudResult};
use crate::ident::sql_ident;
use crate::query::literal;
use crate::value::{FieldValue, Record};

use super::{ID_FIELD, resolve_fields};

/// How INSERT values reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    /// Values inlined as SQL literals, one statement per record.
    Literal,
    /// One `$n` statement plus bound values per record.
    #[default]
    Parameterized,
    /// A single binary `COPY ... FROM STDIN` for the whole batch. Fastest for
    /// large batches, but the server returns no ids.
    Copy,
}

/// A parameterized INSERT and its value matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub field_names: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl InsertStatement {
    /// Bind parameters for row `index`.
    pub fn params(&self, index: usize) -> Vec<&(dyn ToSql + Sync)> {
        self.rows
            .get(index)
            .map(|row| row.iter().map(|v| v as &(dyn ToSql + Sync)).collect())
            .unwrap_or_default()
    }
}

/// A binary COPY for a batch.
///
/// `types_sql` selects the target columns without rows; its prepared
/// statement tells the writer each column's wire type.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyStatement {
    pub sql: String,
    pub types_sql: String,
    pub field_names: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

fn columns(fields: &[String]) -> CrudResult<String> {
    let cols = fields
        .iter()
        .map(|f| sql_ident(f))
        .collect::<CrudResult<Vec<_>>>()?;
    Ok(cols.join(", "))
}

fn row_values<'r>(
    index: usize,
    record: &'r Record,
    fields: &[String],
) -> CrudResult<Vec<&'r FieldValue>> {
    fields
        .iter()
        .map(|field| {
            record.get(field).ok_or_else(|| {
                CrudError::params(format!(
                    "Record #{}: required field_name[{field}] is missing",
                    index + 1
                ))
            })
        })
        .collect()
}

fn prepare(records: &[Record], fields: &[String]) -> CrudResult<Vec<String>> {
    if records.is_empty() {
        return Err(CrudError::params("at least one record is required"));
    }
    let fields = resolve_fields(records, fields, false);
    if fields.is_empty() {
        return Err(CrudError::params("no fields to insert"));
    }
    Ok(fields)
}

/// One `INSERT ... VALUES(<literals>) RETURNING id` per record.
pub fn insert_literal(table: &str, records: &[Record], fields: &[String]) -> CrudResult<Vec<String>> {
    let table = sql_ident(table)?;
    let fields = prepare(records, fields)?;
    let cols = columns(&fields)?;

    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let values = row_values(i, record, &fields)?
                .into_iter()
                .zip(&fields)
                .map(|(value, field)| literal::scalar(field, "insert", value))
                .collect::<CrudResult<Vec<_>>>()?
                .join(", ");
            Ok(format!(
                "INSERT INTO {table}({cols}) VALUES({values}) RETURNING {ID_FIELD}"
            ))
        })
        .collect()
}

fn value_rows(records: &[Record], fields: &[String]) -> CrudResult<Vec<Vec<FieldValue>>> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            row_values(i, record, fields).map(|vals| vals.into_iter().cloned().collect())
        })
        .collect()
}

/// One `INSERT ... VALUES($1, ...) RETURNING id` and a row per record.
pub fn insert_parameterized(
    table: &str,
    records: &[Record],
    fields: &[String],
) -> CrudResult<InsertStatement> {
    let table = sql_ident(table)?;
    let fields = prepare(records, fields)?;
    let cols = columns(&fields)?;
    let placeholders = (1..=fields.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let rows = value_rows(records, &fields)?;

    Ok(InsertStatement {
        sql: format!("INSERT INTO {table}({cols}) VALUES({placeholders}) RETURNING {ID_FIELD}"),
        field_names: fields,
        rows,
    })
}

/// `COPY table (cols) FROM STDIN BINARY` and a row per record.
pub fn insert_copy(table: &str, records: &[Record], fields: &[String]) -> CrudResult<CopyStatement> {
    let table = sql_ident(table)?;
    let fields = prepare(records, fields)?;
    let cols = columns(&fields)?;
    let rows = value_rows(records, &fields)?;

    Ok(CopyStatement {
        sql: format!("COPY {table} ({cols}) FROM STDIN BINARY"),
        types_sql: format!("SELECT {cols} FROM {table} LIMIT 0"),
        field_names: fields,
        rows,
    })
}
