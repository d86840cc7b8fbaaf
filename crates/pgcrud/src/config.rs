//! Orchestrator configuration.

use crate::builder::InsertMode;
use crate::error::CrudResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Names of the tables the CRUD layer reads and writes on its own behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub audit_table: String,
    pub access_table: String,
    pub role_table: String,
    pub user_table: String,
    pub user_profile_table: String,
    pub service_table: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            audit_table: "audits".to_string(),
            access_table: "access_keys".to_string(),
            role_table: "roles".to_string(),
            user_table: "users".to_string(),
            user_profile_table: "user_profile".to_string(),
            service_table: "services".to_string(),
        }
    }
}

/// Which actions emit audit-log entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditFlags {
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
}

/// Configuration for [`Crud`](crate::Crud).
///
/// ```ignore
/// let options = CrudOptions::new()
///     .check_access(true)
///     .cache_expire(Duration::from_secs(60))
///     .log_update(true);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrudOptions {
    pub tables: TableNames,
    /// Upper bound applied to every requested limit.
    pub max_query_limit: i64,
    /// Cache lifetime in seconds.
    pub cache_expire: u64,
    pub cache_enabled: bool,
    /// Run the access engine before every task.
    pub check_access: bool,
    pub audit: AuditFlags,
    pub insert_mode: InsertMode,
    /// Per-statement timeout in milliseconds.
    pub query_timeout_ms: Option<u64>,
}

impl Default for CrudOptions {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            max_query_limit: 10_000,
            cache_expire: 300,
            cache_enabled: true,
            check_access: false,
            audit: AuditFlags::default(),
            insert_mode: InsertMode::default(),
            query_timeout_ms: None,
        }
    }
}

impl CrudOptions {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from TOML. Missing keys keep their defaults.
    ///
    /// ```toml
    /// check_access = true
    /// max_query_limit = 500
    ///
    /// [tables]
    /// user_table = "app_users"
    ///
    /// [audit]
    /// update = true
    /// ```
    pub fn from_toml_str(s: &str) -> CrudResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    pub fn max_query_limit(mut self, limit: i64) -> Self {
        self.max_query_limit = limit;
        self
    }

    pub fn cache_expire(mut self, ttl: Duration) -> Self {
        self.cache_expire = ttl.as_secs();
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn check_access(mut self, enabled: bool) -> Self {
        self.check_access = enabled;
        self
    }

    pub fn log_create(mut self, enabled: bool) -> Self {
        self.audit.create = enabled;
        self
    }

    pub fn log_read(mut self, enabled: bool) -> Self {
        self.audit.read = enabled;
        self
    }

    pub fn log_update(mut self, enabled: bool) -> Self {
        self.audit.update = enabled;
        self
    }

    pub fn log_delete(mut self, enabled: bool) -> Self {
        self.audit.delete = enabled;
        self
    }

    pub fn insert_mode(mut self, mode: InsertMode) -> Self {
        self.insert_mode = mode;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_expire)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    /// Clamp a requested limit to `max_query_limit`; zero or less means the maximum.
    pub fn effective_limit(&self, requested: i64) -> i64 {
        if requested <= 0 || requested > self.max_query_limit {
            self.max_query_limit
        } else {
            requested
        }
    }
}
