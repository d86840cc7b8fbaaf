//! Transaction helpers.
//!
//! CRUD entry points only hold a shared `&impl GenericClient`, so write batches
//! are wrapped with explicit statements issued through that client:
//!
//! - a plain connection gets `BEGIN` / `COMMIT` / `ROLLBACK`;
//! - a client that reports [`GenericClient::in_transaction`] (for example a
//!   `tokio_postgres::Transaction`) gets a uniquely named `SAVEPOINT`, then
//!   `RELEASE SAVEPOINT` or `ROLLBACK TO SAVEPOINT`, so the caller's own
//!   commit or rollback still decides the outcome.
//!
//! Pass a dedicated connection (not one shared with other tasks) when calling
//! the write paths on a plain connection.
//!
//! # Example
//!
//! ```ignore
//! use pgcrud::{CrudResult, GenericClient};
//!
//! async fn demo(client: &impl GenericClient) -> CrudResult<u64> {
//!     pgcrud::transaction!(client, {
//!         let n = client.execute("UPDATE users SET active = false", &[]).await?;
//!         Ok(n)
//!     })
//! }
//! ```
//!
//! [`GenericClient::in_transaction`]: crate::client::GenericClient::in_transaction

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CrudError;

static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Statements that open, commit and roll back one transaction scope.
#[doc(hidden)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxScope {
    pub begin: String,
    pub commit: String,
    pub rollback: String,
}

impl TxScope {
    /// Top-level block, or a fresh savepoint when `nested`.
    pub fn new(nested: bool) -> Self {
        if !nested {
            return Self {
                begin: "BEGIN".to_string(),
                commit: "COMMIT".to_string(),
                rollback: "ROLLBACK".to_string(),
            };
        }
        let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = format!("pgcrud_sp_{n}");
        Self {
            begin: format!("SAVEPOINT {name}"),
            commit: format!("RELEASE SAVEPOINT {name}"),
            rollback: format!("ROLLBACK TO SAVEPOINT {name}"),
        }
    }
}

/// Runs the given block inside a database transaction.
///
/// - Issues `BEGIN` (or `SAVEPOINT` inside an open transaction) on `$client`.
/// - Issues `COMMIT` (or `RELEASE SAVEPOINT`) on `Ok(_)`.
/// - Issues `ROLLBACK` (or `ROLLBACK TO SAVEPOINT`) on `Err(_)` and returns
///   the block's error.
///
/// The block must evaluate to `pgcrud::CrudResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $body:block) => {{
        let __pgcrud_client = $client;
        let __pgcrud_scope = $crate::transaction::TxScope::new(
            $crate::client::GenericClient::in_transaction(__pgcrud_client),
        );
        $crate::client::GenericClient::execute(__pgcrud_client, &__pgcrud_scope.begin, &[])
            .await?;

        let __pgcrud_tx_body_result: $crate::CrudResult<_> = async { $body }.await;
        match __pgcrud_tx_body_result {
            Ok(value) => {
                $crate::client::GenericClient::execute(
                    __pgcrud_client,
                    &__pgcrud_scope.commit,
                    &[],
                )
                .await?;
                Ok(value)
            }
            Err(error) => {
                match $crate::client::GenericClient::execute(
                    __pgcrud_client,
                    &__pgcrud_scope.rollback,
                    &[],
                )
                .await
                {
                    Ok(_) => Err(error),
                    Err(rollback_err) => {
                        Err($crate::transaction::rollback_failed(error, rollback_err))
                    }
                }
            }
        }
    }};
}

/// Fold a failed rollback into the error that caused it, keeping its kind.
#[doc(hidden)]
pub fn rollback_failed(error: CrudError, rollback_err: CrudError) -> CrudError {
    match error {
        CrudError::Execution { task, message } => CrudError::Execution {
            task,
            message: format!("{message} (rollback failed: {rollback_err})"),
        },
        other => CrudError::Connection(format!("{other} (rollback failed: {rollback_err})")),
    }
}
