//! SQL statement builders.
//!
//! All builders are pure: they validate identifiers, assemble text and
//! parameters, and never touch a connection.
//!
//! - SELECT by ids, by condition, or every row; optional ORDER BY / LIMIT / OFFSET.
//! - INSERT in literal, parameterized or binary COPY ([`InsertMode`]) form.
//! - UPDATE by record id, by id list or by condition; field sets are strict.
//! - DELETE by ids or by condition. [`delete::delete_all`] is separate and
//!   performs no guarding of its own.

pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

pub use delete::{delete_all, delete_by_ids, delete_by_param};
pub use insert::{
    CopyStatement, InsertMode, InsertStatement, insert_copy, insert_literal, insert_parameterized,
};
pub use select::SelectBuilder;
pub use update::{update_by_ids, update_by_param, update_by_records, update_fields};

use crate::error::{CrudError, CrudResult};
use crate::value::Record;

/// Field name of the primary key.
pub const ID_FIELD: &str = "id";

/// Field list for a batch: `fields` when given, else the first record's keys.
pub(crate) fn resolve_fields(records: &[Record], fields: &[String], skip_id: bool) -> Vec<String> {
    if !fields.is_empty() {
        return fields.to_vec();
    }
    records
        .first()
        .map(|r| {
            r.keys()
                .filter(|k| !(skip_id && k.as_str() == ID_FIELD))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn require_ids<S: AsRef<str>>(ids: &[S]) -> CrudResult<()> {
    if ids.is_empty() || ids.iter().any(|id| id.as_ref().is_empty()) {
        return Err(CrudError::params("record ids are required and must be non-empty"));
    }
    Ok(())
}
