//! Test doubles shared by the unit tests.

use std::sync::Mutex;
use std::time::Duration;

use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

use crate::client::GenericClient;
use crate::error::{CrudError, CrudResult};
use crate::value::FieldValue;

/// Records every statement; queries return no rows, executes affect one row.
#[derive(Default)]
pub(crate) struct RecordingClient {
    statements: Mutex<Vec<String>>,
    /// Number of bound parameters per statement, in call order.
    bound: Mutex<Vec<usize>>,
    /// Rows handed to `copy_in_rows`.
    copied: Mutex<Vec<Vec<FieldValue>>>,
    /// 1-based call number that fails.
    fail_on: Option<usize>,
    delay: Option<Duration>,
    /// Reported by `in_transaction`.
    open_transaction: bool,
}

impl RecordingClient {
    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// A client that behaves like an already open transaction.
    pub fn in_open_transaction() -> Self {
        Self {
            open_transaction: true,
            ..Default::default()
        }
    }

    pub fn with_open_transaction(mut self) -> Self {
        self.open_transaction = true;
        self
    }

    fn record(&self, sql: &str, params: usize) -> CrudResult<()> {
        let mut statements = self.statements.lock().unwrap();
        statements.push(sql.to_string());
        self.bound.lock().unwrap().push(params);
        if self.fail_on == Some(statements.len()) {
            return Err(CrudError::Connection("connection reset".into()));
        }
        Ok(())
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn bound(&self) -> Vec<usize> {
        self.bound.lock().unwrap().clone()
    }

    pub fn copied(&self) -> Vec<Vec<FieldValue>> {
        self.copied.lock().unwrap().clone()
    }
}

impl GenericClient for RecordingClient {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CrudResult<Vec<Row>> {
        self.record(sql, params.len())?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Vec::new())
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CrudResult<u64> {
        self.record(sql, params.len())?;
        Ok(1)
    }

    fn in_transaction(&self) -> bool {
        self.open_transaction
    }

    async fn copy_in_rows(
        &self,
        copy_sql: &str,
        types_sql: &str,
        rows: &[Vec<FieldValue>],
    ) -> CrudResult<u64> {
        self.record(types_sql, 0)?;
        self.record(copy_sql, 0)?;
        self.copied.lock().unwrap().extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }
}
