use serde_json::json;

use crate::access::{AccessStore, PgAccessStore, TaskType};
use crate::audit::{AuditAction, AuditEntry};
use crate::builder::{self, SelectBuilder, delete_by_ids, delete_by_param};
use crate::client::GenericClient;
use crate::error::{CrudError, CrudResult, TaskKind};

use super::{Crud, CrudOutcome, CrudParams, ResponseCode, ResponseMessage, respond};

impl Crud {
    /// Delete the rows named by `record_ids`, or else matching `query_params`.
    pub async fn delete<C: GenericClient>(
        &self,
        client: &C,
        params: &CrudParams,
    ) -> ResponseMessage {
        let store = PgAccessStore::new(client, &self.options.tables);
        self.delete_with(client, &store, params).await
    }

    /// Delete every row of `params.table_name`. No access check.
    pub async fn delete_all<C: GenericClient>(
        &self,
        client: &C,
        params: &CrudParams,
    ) -> ResponseMessage {
        let result = self.wipe(client, &params.table_name).await;
        respond(&params.table_name, "delete_all", result, ResponseCode::DeleteError)
    }

    pub(crate) async fn delete_with<C: GenericClient, S: AccessStore>(
        &self,
        client: &C,
        store: &S,
        params: &CrudParams,
    ) -> ResponseMessage {
        let result = self.remove(client, store, params).await;
        respond(&params.table_name, "delete", result, ResponseCode::RemoveError)
    }

    async fn remove<C: GenericClient, S: AccessStore>(
        &self,
        client: &C,
        store: &S,
        params: &CrudParams,
    ) -> CrudResult<(String, CrudOutcome)> {
        let table = params.table_name.as_str();
        let select = SelectBuilder::new(table)?;
        let (sql, before_sql) = if !params.record_ids.is_empty() {
            (
                delete_by_ids(table, &params.record_ids)?,
                select.by_ids(&params.record_ids)?,
            )
        } else if !params.query_params.is_empty() {
            (
                delete_by_param(table, &params.query_params)?,
                select.by_param(&params.query_params)?,
            )
        } else {
            return Err(CrudError::execution(
                TaskKind::Remove,
                "record ids or query params are required to delete",
            ));
        };

        self.authorize(store, params, TaskType::Delete, &params.record_ids)
            .await?;

        let capture = self.wants_before(self.options.audit.delete);
        let (before, affected) = crate::transaction!(client, {
            let before = if capture {
                self.query_records(client, &before_sql, &[], TaskKind::Delete)
                    .await?
            } else {
                Vec::new()
            };
            let affected = self.execute(client, &sql, &[], TaskKind::Delete).await?;
            Ok((before, affected))
        })?;

        self.invalidate(table);

        let entry = AuditEntry {
            table_name: table.to_string(),
            before,
            after: json!({
                "recordIds": params.record_ids,
                "queryParams": params.query_params,
            }),
        };
        let message = self
            .record_audit(
                AuditAction::Delete,
                self.options.audit.delete,
                &params.user_id,
                entry,
                "Record(s) deleted successfully".to_string(),
            )
            .await;

        Ok((
            message,
            CrudOutcome {
                query_param: params.query_params.clone(),
                record_ids: params.record_ids.clone(),
                record_count: affected as usize,
                table_records: Vec::new(),
            },
        ))
    }

    async fn wipe<C: GenericClient>(
        &self,
        client: &C,
        table: &str,
    ) -> CrudResult<(String, CrudOutcome)> {
        let sql = builder::delete_all(table)?;
        let affected = self.execute(client, &sql, &[], TaskKind::Delete).await?;
        self.invalidate(table);
        Ok((
            "All record(s) deleted successfully".to_string(),
            CrudOutcome {
                record_count: affected as usize,
                ..Default::default()
            },
        ))
    }
}
