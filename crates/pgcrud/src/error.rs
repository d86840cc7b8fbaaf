//! Error types for pgcrud

use crate::changeset::ValidationErrors;
use crate::crud::ResponseCode;
use thiserror::Error;

/// Result type alias for pgcrud operations
pub type CrudResult<T> = Result<T, CrudError>;

/// Error types for CRUD operations
#[derive(Debug, Error)]
pub enum CrudError {
    /// Malformed or incomplete input
    #[error("Params error: {0}")]
    Params(String),

    /// Missing or unknown login session
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Access denied
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Login session has expired
    #[error("Token expired: {0}")]
    TokenExpired(String),

    /// Task type is not one of create, read, update, delete
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    /// No where condition supplied
    #[error("where condition is required")]
    EmptyCondition,

    /// Every group or item of the condition was empty
    #[error("no valid where condition specified")]
    NoValidCondition,

    /// Group item does not carry exactly one field and one operator
    #[error("Invalid group item: {0}")]
    InvalidGroupItem(String),

    /// Operator name outside the catalog
    #[error("Unknown or unsupported operator: {0}")]
    UnknownOperator(String),

    /// Operator does not accept the value type
    #[error("Unsupported value type {value_type} for field '{field}' with operator '{operator}'")]
    UnsupportedValue {
        field: String,
        operator: String,
        value_type: String,
    },

    /// Invalid SQL identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Create- and update-shaped records in one save call
    #[error("You may only create or update record(s), not both at the same time")]
    SaveConflict,

    /// Executor failure for a specific task
    #[error("{task} error: {message}")]
    Execution { task: TaskKind, message: String },

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Record validation failed
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Connection setup error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Executor stage an [`CrudError::Execution`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Insert,
    Update,
    Delete,
    Read,
    Save,
    Remove,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskKind::Insert => "insert",
            TaskKind::Update => "update",
            TaskKind::Delete => "delete",
            TaskKind::Read => "read",
            TaskKind::Save => "save",
            TaskKind::Remove => "remove",
        };
        f.write_str(s)
    }
}

impl CrudError {
    /// Create a params error
    pub fn params(message: impl Into<String>) -> Self {
        Self::Params(message.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create an execution error for a task
    pub fn execution(task: TaskKind, message: impl Into<String>) -> Self {
        Self::Execution {
            task,
            message: message.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_value(
        field: impl Into<String>,
        operator: impl Into<String>,
        value_type: impl Into<String>,
    ) -> Self {
        Self::UnsupportedValue {
            field: field.into(),
            operator: operator.into(),
            value_type: value_type.into(),
        }
    }

    /// Check if this is an authentication or authorization error
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated(_) | Self::Unauthorized(_) | Self::TokenExpired(_)
        )
    }

    /// Check if this error comes from compiling a where condition
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyCondition
                | Self::NoValidCondition
                | Self::InvalidGroupItem(_)
                | Self::UnknownOperator(_)
                | Self::UnsupportedValue { .. }
                | Self::InvalidIdentifier(_)
        )
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Wrap a driver error as an execution error for `task`, keeping the
    /// constraint name and SQLSTATE when the server reported one.
    pub fn from_db_error(task: TaskKind, err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let message = match db_err.constraint() {
                Some(constraint) => format!(
                    "{} ({}: {})",
                    db_err.message(),
                    db_err.code().code(),
                    constraint
                ),
                None => format!("{} ({})", db_err.message(), db_err.code().code()),
            };
            return Self::execution(task, message);
        }
        Self::execution(task, err.to_string())
    }

    /// Map this error onto the response code returned to callers.
    ///
    /// `fallback` is used for executor failures that carry no task of their own.
    pub fn response_code(&self, fallback: ResponseCode) -> ResponseCode {
        match self {
            Self::Unauthenticated(_) | Self::Unauthorized(_) => ResponseCode::UnAuthorized,
            Self::TokenExpired(_) => ResponseCode::TokenExpired,
            Self::Params(_)
            | Self::UnknownTaskType(_)
            | Self::EmptyCondition
            | Self::NoValidCondition
            | Self::InvalidGroupItem(_)
            | Self::UnknownOperator(_)
            | Self::UnsupportedValue { .. }
            | Self::InvalidIdentifier(_)
            | Self::Validation(_) => ResponseCode::ParamsError,
            Self::SaveConflict => ResponseCode::SaveError,
            Self::Execution { task, .. } => match task {
                TaskKind::Insert => ResponseCode::InsertError,
                TaskKind::Update => ResponseCode::UpdateError,
                TaskKind::Delete => ResponseCode::DeleteError,
                TaskKind::Read => ResponseCode::ReadError,
                TaskKind::Save => ResponseCode::SaveError,
                TaskKind::Remove => ResponseCode::RemoveError,
            },
            _ => fallback,
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for CrudError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<serde_json::Error> for CrudError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for CrudError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<ValidationErrors> for CrudError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
