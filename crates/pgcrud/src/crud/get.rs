use serde_json::json;

use crate::access::{AccessStore, PgAccessStore, TaskType};
use crate::audit::{AuditAction, AuditEntry};
use crate::builder::SelectBuilder;
use crate::client::GenericClient;
use crate::error::{CrudResult, TaskKind};
use crate::value::Record;

use super::{Crud, CrudOutcome, CrudParams, ResponseCode, ResponseMessage, respond};

impl Crud {
    /// Read records by `record_ids`, by `query_params`, or the whole table.
    ///
    /// Non-empty results are cached under [`CrudParams::hash_key`].
    pub async fn get<C: GenericClient>(&self, client: &C, params: &CrudParams) -> ResponseMessage {
        let store = PgAccessStore::new(client, &self.options.tables);
        self.get_with(client, &store, params).await
    }

    /// Read records without access check, cache or audit.
    pub async fn lookup<C: GenericClient>(
        &self,
        client: &C,
        params: &CrudParams,
    ) -> ResponseMessage {
        let result = self
            .fetch(client, params, false)
            .await
            .map(|records| ("Record(s) retrieved successfully".to_string(), outcome(params, records)));
        respond(&params.table_name, "lookup", result, ResponseCode::ReadError)
    }

    pub(crate) async fn get_with<C: GenericClient, S: AccessStore>(
        &self,
        client: &C,
        store: &S,
        params: &CrudParams,
    ) -> ResponseMessage {
        let result = self.read(client, store, params).await;
        respond(&params.table_name, "get", result, ResponseCode::ReadError)
    }

    async fn read<C: GenericClient, S: AccessStore>(
        &self,
        client: &C,
        store: &S,
        params: &CrudParams,
    ) -> CrudResult<(String, CrudOutcome)> {
        self.authorize(store, params, TaskType::Read, &params.record_ids)
            .await?;
        let records = self.fetch(client, params, true).await?;

        let entry = AuditEntry {
            table_name: params.table_name.clone(),
            before: Vec::new(),
            after: json!({
                "recordIds": params.record_ids,
                "queryParams": params.query_params,
            }),
        };
        let message = self
            .record_audit(
                AuditAction::Read,
                self.options.audit.read,
                &params.user_id,
                entry,
                "Record(s) retrieved successfully".to_string(),
            )
            .await;
        Ok((message, outcome(params, records)))
    }

    async fn fetch<C: GenericClient>(
        &self,
        client: &C,
        params: &CrudParams,
        cached: bool,
    ) -> CrudResult<Vec<Record>> {
        let table = params.table_name.as_str();
        let use_cache = cached && self.options.cache_enabled;
        let key = params.hash_key();

        if use_cache
            && let Some(records) = self.cache.get(table, &key)
            && !records.is_empty()
        {
            tracing::debug!(target: "pgcrud", table, count = records.len(), "cache hit");
            return Ok(records);
        }

        let select = SelectBuilder::new(table)?
            .project(&params.project_params)?
            .sort(&params.sort_params)?
            .limit(self.options.effective_limit(params.limit))
            .offset(params.skip.max(0));
        let sql = if !params.record_ids.is_empty() {
            select.by_ids(&params.record_ids)?
        } else if !params.query_params.is_empty() {
            select.by_param(&params.query_params)?
        } else {
            select.all()
        };

        let records = self.query_records(client, &sql, &[], TaskKind::Read).await?;
        if use_cache && !records.is_empty() {
            self.cache
                .set(table, &key, records.clone(), self.options.cache_ttl());
        }
        Ok(records)
    }
}

fn outcome(params: &CrudParams, records: Vec<Record>) -> CrudOutcome {
    CrudOutcome {
        query_param: params.query_params.clone(),
        record_ids: params.record_ids.clone(),
        record_count: records.len(),
        table_records: records,
    }
}
