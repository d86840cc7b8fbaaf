//! Query-condition compiler.
//!
//! A condition is an ordered list of [`QueryGroup`]s, each holding ordered
//! [`QueryItem`]s of the form `field -> { operator -> value }`. The compiler
//! turns it into a single WHERE predicate:
//!
//! ```ignore
//! use pgcrud::query::{compile_where, QueryGroup, QueryItem};
//!
//! let groups = vec![
//!     QueryGroup::new(vec![QueryItem::new("id", "eq", "X")]).order(1).link_op("or"),
//!     QueryGroup::new(vec![QueryItem::new("table_name", "eq", "services")]).order(2),
//! ];
//! assert_eq!(compile_where(&groups)?, "WHERE (id='X') OR (table_name='services')");
//! # Ok::<(), pgcrud::CrudError>(())
//! ```
//!
//! Output is byte-identical for identical input; the CRUD layer relies on that
//! for its cache keys.

pub mod compile;
pub mod literal;
pub mod operator;
pub mod types;

pub use compile::{compile_predicate, compile_where};
pub use operator::{LinkOp, Operator};
pub use types::{ProjectParams, QueryGroup, QueryItem, QueryParam, SortParams};
