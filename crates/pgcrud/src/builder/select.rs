use crate::error::CrudResult;
use crate::ident::sql_ident;
use crate::query::{ProjectParams, QueryGroup, SortParams, compile_where, literal};

use super::{ID_FIELD, require_ids};

/// SELECT statement builder.
///
/// ```ignore
/// let sql = SelectBuilder::new("users")?
///     .project(&project)?
///     .sort(&sort)?
///     .limit(20)
///     .by_ids(&["a", "b"])?;
/// // SELECT id, name FROM users WHERE id IN ('a', 'b') ORDER BY name ASC LIMIT 20
/// ```
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: String,
    columns: Vec<String>,
    order_by: Vec<String>,
    limit: i64,
    offset: i64,
}

impl SelectBuilder {
    pub fn new(table: &str) -> CrudResult<Self> {
        Ok(Self {
            table: sql_ident(table)?,
            columns: Vec::new(),
            order_by: Vec::new(),
            limit: 0,
            offset: 0,
        })
    }

    /// Select the fields mapped to `true`, with `id` first.
    pub fn project(mut self, project: &ProjectParams) -> CrudResult<Self> {
        let mut columns = Vec::new();
        for (field, selected) in project {
            if *selected && field != ID_FIELD {
                columns.push(sql_ident(field)?);
            }
        }
        if !columns.is_empty() {
            columns.insert(0, ID_FIELD.to_string());
        }
        self.columns = columns;
        Ok(self)
    }

    /// Add `ORDER BY` terms. `desc` (any case) sorts descending, anything else ascending.
    pub fn sort(mut self, sort: &SortParams) -> CrudResult<Self> {
        for (field, direction) in sort {
            let dir = if direction.trim().eq_ignore_ascii_case("desc") {
                "DESC"
            } else {
                "ASC"
            };
            self.order_by.push(format!("{} {dir}", sql_ident(field)?));
        }
        Ok(self)
    }

    /// Emitted only when greater than zero.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Emitted only when greater than zero.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn by_ids<S: AsRef<str>>(&self, ids: &[S]) -> CrudResult<String> {
        require_ids(ids)?;
        Ok(self.render(Some(format!(
            "WHERE {ID_FIELD} IN ({})",
            literal::id_list(ids)
        ))))
    }

    pub fn by_param(&self, groups: &[QueryGroup]) -> CrudResult<String> {
        Ok(self.render(Some(compile_where(groups)?)))
    }

    pub fn all(&self) -> String {
        self.render(None)
    }

    fn render(&self, predicate: Option<String>) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", self.table);
        if let Some(predicate) = predicate {
            sql.push(' ');
            sql.push_str(&predicate);
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if self.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", self.limit));
        }
        if self.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", self.offset));
        }
        sql
    }
}
