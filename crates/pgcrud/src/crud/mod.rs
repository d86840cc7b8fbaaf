//! CRUD orchestrator.
//!
//! [`Crud`] ties the builders, the access engine, the cache and the audit
//! sink together behind five entry points:
//!
//! - [`Crud::save`]: create or update records
//! - [`Crud::get`]: read by ids, by condition, or all rows (cached)
//! - [`Crud::delete`]: delete by ids or by condition
//! - [`Crud::lookup`]: read without access check or cache
//! - [`Crud::delete_all`]: unconditional table wipe, no access check
//!
//! Entry points never return `Err`; every failure is folded into a
//! [`ResponseMessage`] with one [`ResponseCode`].
//!
//! ```ignore
//! let crud = Crud::new(CrudOptions::new().check_access(true));
//! let params = CrudParams::new("users")
//!     .user("u1", token)
//!     .records(vec![record([("name", "ada".into())])]);
//! let res = crud.save(&client, &params).await;
//! assert!(res.is_success());
//! ```

mod delete;
mod get;
pub mod response;
mod save;

pub use response::{CrudOutcome, ResponseCode, ResponseMessage};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_postgres::types::ToSql;

use crate::access::{AccessRequest, AccessStore, TaskType, check_access};
use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::cache::{CacheStore, DeleteMode, MemoryCache};
use crate::client::GenericClient;
use crate::config::CrudOptions;
use crate::error::{CrudError, CrudResult, TaskKind};
use crate::model::Model;
use crate::query::{ProjectParams, QueryParam, SortParams};
use crate::value::{FieldValue, Record, rows_to_records};

/// Parameters of one CRUD call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrudParams {
    pub table_name: String,
    /// Caller identity, used for access checks and audit records.
    pub user_id: String,
    /// Login token matched against the session table.
    pub token: String,
    /// Records to save.
    pub action_params: Vec<Record>,
    pub query_params: QueryParam,
    pub record_ids: Vec<String>,
    pub project_params: ProjectParams,
    pub sort_params: SortParams,
    /// Explicit field list for inserts and updates.
    pub table_fields: Vec<String>,
    pub skip: i64,
    pub limit: i64,
}

impl CrudParams {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn user(mut self, user_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self.token = token.into();
        self
    }

    pub fn records(mut self, records: Vec<Record>) -> Self {
        self.action_params = records;
        self
    }

    pub fn query(mut self, groups: QueryParam) -> Self {
        self.query_params = groups;
        self
    }

    pub fn ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.record_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn project(mut self, project: ProjectParams) -> Self {
        self.project_params = project;
        self
    }

    pub fn sort(mut self, sort: SortParams) -> Self {
        self.sort_params = sort;
        self
    }

    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.table_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Cache key: table name followed by the JSON of the query, sort,
    /// projection and ids, then the page as `|skip|limit`. All maps are
    /// ordered, so equal requests produce equal keys.
    ///
    /// Paging is normalized the way reads apply it: negative `skip` is 0 and
    /// a non-positive `limit` is 0 (the configured maximum).
    pub fn hash_key(&self) -> String {
        let mut key = self.table_name.clone();
        key.push_str(&serde_json::to_string(&self.query_params).unwrap_or_default());
        key.push_str(&serde_json::to_string(&self.sort_params).unwrap_or_default());
        key.push_str(&serde_json::to_string(&self.project_params).unwrap_or_default());
        key.push_str(&serde_json::to_string(&self.record_ids).unwrap_or_default());
        key.push_str(&format!("|{}|{}", self.skip.max(0), self.limit.max(0)));
        key
    }
}

/// The CRUD orchestrator.
pub struct Crud {
    options: CrudOptions,
    cache: Arc<dyn CacheStore>,
    audit: Option<Arc<dyn AuditSink>>,
    model: Option<Model>,
}

impl Crud {
    pub fn new(options: CrudOptions) -> Self {
        Self {
            options,
            cache: Arc::new(MemoryCache::default()),
            audit: None,
            model: None,
        }
    }

    /// Share a cache between instances, or plug in another store.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Validate saved records against `model`.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn options(&self) -> &CrudOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    async fn authorize<S: AccessStore>(
        &self,
        store: &S,
        params: &CrudParams,
        task: TaskType,
        record_ids: &[String],
    ) -> CrudResult<()> {
        if !self.options.check_access {
            return Ok(());
        }
        let request = AccessRequest {
            user_id: params.user_id.clone(),
            token: params.token.clone(),
            task,
            table_name: params.table_name.clone(),
            record_ids: record_ids.to_vec(),
        };
        let decision = check_access(store, &request).await?;
        if decision.permitted {
            Ok(())
        } else {
            Err(CrudError::unauthorized(format!(
                "{} access denied on {}: {}",
                task, params.table_name, decision.reason
            )))
        }
    }

    async fn timed<T>(
        &self,
        sql: &str,
        fut: impl Future<Output = CrudResult<T>>,
    ) -> CrudResult<T> {
        let start = Instant::now();
        let result = match self.options.timeout() {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(CrudError::Timeout(limit)),
            },
            None => fut.await,
        };
        tracing::debug!(
            target: "pgcrud.sql",
            sql,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "statement executed"
        );
        result
    }

    async fn query_records<C: GenericClient>(
        &self,
        client: &C,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        task: TaskKind,
    ) -> CrudResult<Vec<Record>> {
        let rows = self
            .timed(sql, client.query(sql, params))
            .await
            .map_err(|e| tag(task, e))?;
        rows_to_records(&rows)
    }

    async fn execute<C: GenericClient>(
        &self,
        client: &C,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        task: TaskKind,
    ) -> CrudResult<u64> {
        self.timed(sql, client.execute(sql, params))
            .await
            .map_err(|e| tag(task, e))
    }

    /// Run a `RETURNING id` statement and collect the returned ids.
    async fn returning_ids<C: GenericClient>(
        &self,
        client: &C,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        task: TaskKind,
    ) -> CrudResult<Vec<String>> {
        let records = self.query_records(client, sql, params, task).await?;
        Ok(records
            .into_iter()
            .filter_map(|mut r| match r.remove(crate::builder::ID_FIELD) {
                Some(FieldValue::String(id)) => Some(id),
                Some(FieldValue::Integer(id)) => Some(id.to_string()),
                _ => None,
            })
            .collect())
    }

    fn invalidate(&self, table: &str) {
        self.cache.delete(table, "", DeleteMode::Table);
    }

    /// Record an audit entry when enabled; failures are appended to `message`.
    async fn record_audit(
        &self,
        action: AuditAction,
        enabled: bool,
        actor_id: &str,
        entry: AuditEntry,
        message: String,
    ) -> String {
        let (true, Some(sink)) = (enabled, self.audit.as_ref()) else {
            return message;
        };
        match sink.record(action, actor_id, &entry).await {
            Ok(_) => message,
            Err(err) => {
                tracing::warn!(
                    target: "pgcrud.audit",
                    action = action.as_str(),
                    table = %entry.table_name,
                    error = %err,
                    "audit log failed"
                );
                format!("{message} | Audit-log-error: {err}")
            }
        }
    }

    fn wants_before(&self, enabled: bool) -> bool {
        enabled && self.audit.is_some()
    }
}

/// Attach the executing task to an executor failure.
fn tag(task: TaskKind, err: CrudError) -> CrudError {
    match err {
        CrudError::Query(e) => CrudError::from_db_error(task, e),
        e @ (CrudError::Timeout(_) | CrudError::Execution { .. } | CrudError::Decode { .. }) => e,
        other => CrudError::execution(task, other.to_string()),
    }
}

fn respond(
    table: &str,
    operation: &str,
    result: CrudResult<(String, CrudOutcome)>,
    fallback: ResponseCode,
) -> ResponseMessage {
    match result {
        Ok((message, outcome)) => {
            tracing::info!(
                target: "pgcrud",
                table,
                operation,
                count = outcome.record_count,
                "{message}"
            );
            ResponseMessage::success(message, outcome)
        }
        Err(err) => {
            let code = err.response_code(fallback);
            tracing::warn!(
                target: "pgcrud",
                table,
                operation,
                code = code.as_str(),
                error = %err,
                "crud task failed"
            );
            ResponseMessage::error(code, err.to_string())
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests;
