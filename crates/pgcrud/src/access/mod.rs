//! Role and ownership based access decisions.
//!
//! [`check_access`] validates the caller's session, loads the actor and its
//! role grants from an [`AccessStore`], then runs the engine's strategy chain:
//!
//! 1. inactive account: deny
//! 2. admin: permit
//! 3. no role grant at all: deny
//! 4. actor created every target record: permit
//! 5. every table-level grant carries the task's capability: permit
//! 6. every target record has a grant carrying the capability: permit
//!
//! Decisions are recomputed on every call; nothing here is cached.

pub mod engine;
pub mod grant;
pub mod store;
pub mod task;

pub use engine::{
    AccessContext, AccessDecision, AccessRequest, Decision, Strategy, check_access,
    record_permitted, table_permitted,
};
pub use grant::{Actor, RoleGrant, ServiceInfo, Session};
pub use store::{AccessStore, PgAccessStore};
pub use task::TaskType;
