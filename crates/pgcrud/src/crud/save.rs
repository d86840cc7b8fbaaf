use crate::access::{AccessStore, PgAccessStore, TaskType};
use crate::audit::{AuditAction, AuditEntry};
use crate::builder::{
    ID_FIELD, InsertMode, SelectBuilder, insert_copy, insert_literal, insert_parameterized,
    update_by_ids, update_by_param, update_by_records,
};
use crate::client::GenericClient;
use crate::error::{CrudError, CrudResult, TaskKind};
use crate::value::{FieldValue, Record};

use super::{
    Crud, CrudOutcome, CrudParams, ResponseCode, ResponseMessage, respond, tag, to_json,
};

/// What a save request turns into.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SaveTask {
    /// New records, with empty ids stripped.
    Create(Vec<Record>),
    Update,
}

/// A record's update id as text: a non-empty string or any integer.
fn record_id(record: &Record) -> Option<String> {
    match record.get(ID_FIELD) {
        Some(FieldValue::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(FieldValue::Integer(id)) => Some(id.to_string()),
        _ => None,
    }
}

pub(crate) fn classify(params: &CrudParams) -> CrudResult<SaveTask> {
    let records = &params.action_params;
    if records.is_empty() {
        return Err(CrudError::params("actionParams: at least one record is required"));
    }

    let mut creates = Vec::new();
    let mut updates = 0usize;
    for (i, record) in records.iter().enumerate() {
        match record.get(ID_FIELD) {
            Some(FieldValue::String(id)) if !id.is_empty() => updates += 1,
            Some(FieldValue::Integer(_)) => updates += 1,
            None | Some(FieldValue::Null) | Some(FieldValue::String(_)) => {
                let mut record = record.clone();
                record.remove(ID_FIELD);
                creates.push(record);
            }
            Some(other) => {
                return Err(CrudError::params(format!(
                    "Record #{}: id must be a string or an integer, got {}",
                    i + 1,
                    other.type_name()
                )));
            }
        }
    }

    if updates > 0 && !creates.is_empty() {
        return Err(CrudError::SaveConflict);
    }
    if updates > 0 {
        return Ok(SaveTask::Update);
    }
    if records.len() == 1 && (!params.record_ids.is_empty() || !params.query_params.is_empty()) {
        return Ok(SaveTask::Update);
    }
    Ok(SaveTask::Create(creates))
}

impl Crud {
    /// Create or update `params.action_params`.
    ///
    /// Records carrying a non-empty string or integer `id` are updated by that id; a
    /// single record without id is applied to `record_ids` or to the rows
    /// matching `query_params`; anything else is inserted.
    pub async fn save<C: GenericClient>(&self, client: &C, params: &CrudParams) -> ResponseMessage {
        let store = PgAccessStore::new(client, &self.options.tables);
        self.save_with(client, &store, params).await
    }

    pub(crate) async fn save_with<C: GenericClient, S: AccessStore>(
        &self,
        client: &C,
        store: &S,
        params: &CrudParams,
    ) -> ResponseMessage {
        let result = match classify(params) {
            Ok(SaveTask::Create(records)) => self.create(client, store, params, records).await,
            Ok(SaveTask::Update) => self.update(client, store, params).await,
            Err(err) => Err(err),
        };
        respond(&params.table_name, "save", result, ResponseCode::SaveError)
    }

    async fn create<C: GenericClient, S: AccessStore>(
        &self,
        client: &C,
        store: &S,
        params: &CrudParams,
        mut records: Vec<Record>,
    ) -> CrudResult<(String, CrudOutcome)> {
        self.authorize(store, params, TaskType::Create, &[]).await?;

        if let Some(model) = &self.model {
            for record in records.iter_mut() {
                model.apply_defaults(record);
            }
            model.validate_records(&records, false)?;
        }

        let table = params.table_name.as_str();
        let fields = params.table_fields.as_slice();
        let ids = match self.options.insert_mode {
            InsertMode::Parameterized => {
                let insert = insert_parameterized(table, &records, fields)?;
                crate::transaction!(client, {
                    let mut ids = Vec::with_capacity(insert.rows.len());
                    for i in 0..insert.rows.len() {
                        let returned = self
                            .returning_ids(client, &insert.sql, &insert.params(i), TaskKind::Insert)
                            .await?;
                        ids.extend(returned);
                    }
                    Ok(ids)
                })?
            }
            InsertMode::Literal => {
                let statements = insert_literal(table, &records, fields)?;
                crate::transaction!(client, {
                    let mut ids = Vec::with_capacity(statements.len());
                    for sql in &statements {
                        ids.extend(self.returning_ids(client, sql, &[], TaskKind::Insert).await?);
                    }
                    Ok(ids)
                })?
            }
            InsertMode::Copy => {
                let copy = insert_copy(table, &records, fields)?;
                let copied = crate::transaction!(client, {
                    self.timed(
                        &copy.sql,
                        client.copy_in_rows(&copy.sql, &copy.types_sql, &copy.rows),
                    )
                    .await
                    .map_err(|e| tag(TaskKind::Insert, e))
                })?;
                tracing::debug!(target: "pgcrud", table, copied, "rows copied");
                Vec::new()
            }
        };

        self.invalidate(table);

        let entry = AuditEntry {
            table_name: table.to_string(),
            before: Vec::new(),
            after: to_json(&records),
        };
        let message = self
            .record_audit(
                AuditAction::Create,
                self.options.audit.create,
                &params.user_id,
                entry,
                "Record(s) created successfully".to_string(),
            )
            .await;

        Ok((
            message,
            CrudOutcome {
                record_ids: ids,
                record_count: records.len(),
                ..Default::default()
            },
        ))
    }

    async fn update<C: GenericClient, S: AccessStore>(
        &self,
        client: &C,
        store: &S,
        params: &CrudParams,
    ) -> CrudResult<(String, CrudOutcome)> {
        let records = params.action_params.as_slice();
        let record_ids: Option<Vec<String>> = records.iter().map(record_id).collect();
        let by_records = record_ids.is_some();
        let ids = record_ids.unwrap_or_else(|| params.record_ids.clone());

        self.authorize(store, params, TaskType::Update, &ids).await?;

        if let Some(model) = &self.model {
            model.validate_records(records, true)?;
        }

        let table = params.table_name.as_str();
        let fields = params.table_fields.as_slice();
        let select = SelectBuilder::new(table)?;
        let (statements, before_sql) = if by_records {
            (update_by_records(table, records, fields)?, select.by_ids(&ids)?)
        } else if !ids.is_empty() {
            (
                vec![update_by_ids(table, records, fields, &ids)?],
                select.by_ids(&ids)?,
            )
        } else if !params.query_params.is_empty() {
            (
                vec![update_by_param(table, records, fields, &params.query_params)?],
                select.by_param(&params.query_params)?,
            )
        } else {
            return Err(CrudError::execution(
                TaskKind::Save,
                "an update requires record ids or query params",
            ));
        };

        let capture = self.wants_before(self.options.audit.update);
        let (before, affected) = crate::transaction!(client, {
            let before = if capture {
                self.query_records(client, &before_sql, &[], TaskKind::Update)
                    .await?
            } else {
                Vec::new()
            };
            let mut affected = 0u64;
            for sql in &statements {
                affected += self.execute(client, sql, &[], TaskKind::Update).await?;
            }
            Ok((before, affected))
        })?;

        self.invalidate(table);

        let entry = AuditEntry {
            table_name: table.to_string(),
            before,
            after: to_json(&records),
        };
        let message = self
            .record_audit(
                AuditAction::Update,
                self.options.audit.update,
                &params.user_id,
                entry,
                "Record(s) updated successfully".to_string(),
            )
            .await;

        Ok((
            message,
            CrudOutcome {
                query_param: params.query_params.clone(),
                record_ids: ids,
                record_count: affected as usize,
                table_records: Vec::new(),
            },
        ))
    }
}
