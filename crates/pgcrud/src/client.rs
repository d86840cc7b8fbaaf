//! Generic client trait for unified database access.

use crate::error::{CrudError, CrudResult};
use crate::value::FieldValue;
use bytes::Bytes;
use tokio_postgres::Row;
use tokio_postgres::binary_copy::BinaryCopyInWriter;
use tokio_postgres::types::{ToSql, Type};

/// A trait that unifies database clients and transactions.
///
/// Every CRUD entry point accepts `&impl GenericClient`, so callers can pass a
/// plain connection, a pooled client, or an open transaction.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = CrudResult<Vec<Row>>> + Send;

    /// Execute a query and return the **first** row.
    ///
    /// Returns `CrudError::Params` if no rows are returned.
    fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = CrudResult<Row>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            rows.into_iter()
                .next()
                .ok_or_else(|| CrudError::params("Expected one row, got none"))
        }
    }

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = CrudResult<Option<Row>>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            Ok(rows.into_iter().next())
        }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = CrudResult<u64>> + Send;

    /// Whether this client is already inside a transaction block.
    ///
    /// [`crate::transaction!`] nests through a savepoint when it is.
    fn in_transaction(&self) -> bool {
        false
    }

    /// Stream `rows` through a binary `COPY ... FROM STDIN` and return the
    /// number of rows copied.
    ///
    /// `types_sql` is prepared to learn the column types; it must select the
    /// COPY target columns in the same order.
    fn copy_in_rows(
        &self,
        copy_sql: &str,
        types_sql: &str,
        rows: &[Vec<FieldValue>],
    ) -> impl std::future::Future<Output = CrudResult<u64>> + Send {
        let _ = (copy_sql, types_sql, rows);
        async { Err(CrudError::Connection("COPY is not supported by this client".into())) }
    }
}

async fn copy_binary(
    client: &tokio_postgres::Client,
    copy_sql: &str,
    types_sql: &str,
    rows: &[Vec<FieldValue>],
) -> CrudResult<u64> {
    let statement = client.prepare(types_sql).await?;
    let types: Vec<Type> = statement.columns().iter().map(|c| c.type_().clone()).collect();

    let sink = client.copy_in::<_, Bytes>(copy_sql).await?;
    let mut writer = std::pin::pin!(BinaryCopyInWriter::new(sink, &types));
    for row in rows {
        let values: Vec<&(dyn ToSql + Sync)> =
            row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        writer.as_mut().write(&values).await?;
    }
    Ok(writer.finish().await?)
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CrudResult<Vec<Row>> {
        Ok(tokio_postgres::Client::query(self, sql, params).await?)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CrudResult<u64> {
        Ok(tokio_postgres::Client::execute(self, sql, params).await?)
    }

    async fn copy_in_rows(
        &self,
        copy_sql: &str,
        types_sql: &str,
        rows: &[Vec<FieldValue>],
    ) -> CrudResult<u64> {
        copy_binary(self, copy_sql, types_sql, rows).await
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CrudResult<Vec<Row>> {
        Ok(tokio_postgres::Transaction::query(self, sql, params).await?)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CrudResult<u64> {
        Ok(tokio_postgres::Transaction::execute(self, sql, params).await?)
    }

    fn in_transaction(&self) -> bool {
        true
    }

    async fn copy_in_rows(
        &self,
        copy_sql: &str,
        types_sql: &str,
        rows: &[Vec<FieldValue>],
    ) -> CrudResult<u64> {
        // Same connection, so the copy joins the open transaction.
        copy_binary(tokio_postgres::GenericClient::client(self), copy_sql, types_sql, rows).await
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CrudResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        GenericClient::query(&***self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> CrudResult<u64> {
        GenericClient::execute(&***self, sql, params).await
    }

    async fn copy_in_rows(
        &self,
        copy_sql: &str,
        types_sql: &str,
        rows: &[Vec<FieldValue>],
    ) -> CrudResult<u64> {
        copy_binary(&***self, copy_sql, types_sql, rows).await
    }
}
