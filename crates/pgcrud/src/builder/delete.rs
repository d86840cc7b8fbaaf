use crate::error::CrudResult;
use crate::ident::sql_ident;
use crate::query::{QueryGroup, compile_where, literal};

use super::{ID_FIELD, require_ids};

pub fn delete_by_ids<S: AsRef<str>>(table: &str, ids: &[S]) -> CrudResult<String> {
    let table = sql_ident(table)?;
    require_ids(ids)?;
    Ok(format!(
        "DELETE FROM {table} WHERE {ID_FIELD} IN ({})",
        literal::id_list(ids)
    ))
}

pub fn delete_by_param(table: &str, groups: &[QueryGroup]) -> CrudResult<String> {
    let table = sql_ident(table)?;
    Ok(format!("DELETE FROM {table} {}", compile_where(groups)?))
}

/// Unconditional `DELETE FROM <table>`. Callers restrict this to privileged contexts.
pub fn delete_all(table: &str) -> CrudResult<String> {
    Ok(format!("DELETE FROM {}", sql_ident(table)?))
}
