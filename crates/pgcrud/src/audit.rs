//! Audit-log sinks.
//!
//! The orchestrator records `(action, actor, {table, before, after})` after a
//! successful task. Sink failures are reported back in the response message
//! and never undo the task.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CrudResult;
use crate::value::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Read => "read",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        }
    }
}

/// Payload of one audit record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditEntry {
    pub table_name: String,
    /// Rows as they were before the task (update / delete).
    pub before: Vec<Record>,
    /// Rows or parameters the task applied.
    pub after: serde_json::Value,
}

/// Acknowledgement returned by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditAck {
    pub message: String,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(
        &self,
        action: AuditAction,
        actor_id: &str,
        entry: &AuditEntry,
    ) -> CrudResult<AuditAck>;
}

/// Emits audit records as `tracing` events on target `pgcrud.audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(
        &self,
        action: AuditAction,
        actor_id: &str,
        entry: &AuditEntry,
    ) -> CrudResult<AuditAck> {
        let before = serde_json::to_string(&entry.before)?;
        tracing::info!(
            target: "pgcrud.audit",
            action = action.as_str(),
            actor_id,
            table = %entry.table_name,
            before = %before,
            after = %entry.after,
            "audit"
        );
        Ok(AuditAck {
            message: format!("{} audit recorded", action.as_str()),
        })
    }
}

/// Writes audit records into the audit table through a connection pool.
#[cfg(feature = "pool")]
pub struct PgAuditSink {
    pool: deadpool_postgres::Pool,
    table: String,
}

#[cfg(feature = "pool")]
impl PgAuditSink {
    pub fn new(pool: deadpool_postgres::Pool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[cfg(feature = "pool")]
#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(
        &self,
        action: AuditAction,
        actor_id: &str,
        entry: &AuditEntry,
    ) -> CrudResult<AuditAck> {
        use crate::client::GenericClient;
        use crate::value::FieldValue;

        let sql = format!(
            "INSERT INTO {}(table_name, log_records, new_log_records, log_type, log_by, log_at) \
             VALUES($1, $2, $3, $4, $5, $6)",
            crate::ident::sql_ident(&self.table)?
        );
        let table_name = FieldValue::from(entry.table_name.as_str());
        let before = FieldValue::String(serde_json::to_string(&entry.before)?);
        let after = FieldValue::String(entry.after.to_string());
        let log_type = FieldValue::from(action.as_str());
        let log_by = FieldValue::from(actor_id);
        let log_at = FieldValue::Timestamp(chrono::Utc::now());

        let client = self.pool.get().await?;
        client
            .execute(
                &sql,
                &[&table_name, &before, &after, &log_type, &log_by, &log_at],
            )
            .await?;
        Ok(AuditAck {
            message: format!("{} audit recorded", action.as_str()),
        })
    }
}
