//! # pgcrud
//!
//! Generic CRUD helpers over PostgreSQL.
//!
//! ## Features
//!
//! - **Condition compiler**: grouped, ordered query conditions compiled into a `WHERE` clause
//! - **Access checks**: session, admin, ownership, table-level and record-level role grants
//! - **Statement builders**: SELECT / INSERT / UPDATE / DELETE with validated identifiers
//! - **Orchestrator**: `save` / `get` / `delete` with transactions, cache and audit log
//! - **Models**: optional field-level validation before any SQL is built
//! - **Transaction-friendly**: pass any `GenericClient` (connection, pooled client, transaction);
//!   inside an open transaction writes nest through a savepoint
//!
//! ## Condition compiler
//!
//! ```ignore
//! use pgcrud::query::{QueryGroup, QueryItem, compile_where};
//!
//! let groups = vec![
//!     QueryGroup::new(vec![QueryItem::new("id", "eq", "X")]).order(1).link_op("or"),
//!     QueryGroup::new(vec![QueryItem::new("table_name", "eq", "services")]).order(2),
//! ];
//! assert_eq!(
//!     compile_where(&groups)?,
//!     "WHERE (id='X') OR (table_name='services')"
//! );
//! ```
//!
//! ## Orchestrator
//!
//! ```ignore
//! use pgcrud::{Crud, CrudOptions, CrudParams, record};
//!
//! let pool = pgcrud::create_pool(&database_url)?;
//! let client = pool.get().await?;
//! let crud = Crud::new(CrudOptions::new().check_access(true));
//!
//! let res = crud
//!     .save(&client, &CrudParams::new("users")
//!         .user(user_id, token)
//!         .records(vec![record([("name", "ada".into())])]))
//!     .await;
//! assert!(res.is_success());
//! ```

pub mod access;
pub mod audit;
pub mod builder;
pub mod cache;
pub mod changeset;
pub mod client;
pub mod config;
pub mod crud;
pub mod error;
pub mod ident;
pub mod model;
pub mod query;
pub mod transaction;
pub mod validate;
pub mod value;

#[cfg(test)]
mod test_support;

pub use access::{AccessDecision, AccessRequest, AccessStore, PgAccessStore, TaskType, check_access};
pub use audit::{AuditAction, AuditEntry, AuditSink, TracingAuditSink};
pub use builder::{InsertMode, SelectBuilder};
pub use cache::{CacheStore, DeleteMode, MemoryCache};
pub use changeset::{ValidationCode, ValidationError, ValidationErrors};
pub use client::GenericClient;
pub use config::{AuditFlags, CrudOptions, TableNames};
pub use crud::{Crud, CrudOutcome, CrudParams, ResponseCode, ResponseMessage};
pub use error::{CrudError, CrudResult, TaskKind};
pub use model::{DataType, FieldDesc, Model, RecordMapping};
pub use query::{Operator, QueryGroup, QueryItem, QueryParam, compile_where};
pub use value::{FieldValue, Record, record};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use audit::PgAuditSink;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_manager_config};
