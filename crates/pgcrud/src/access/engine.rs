use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::grant::{Actor, RoleGrant, ServiceInfo};
use super::store::AccessStore;
use super::task::TaskType;
use crate::error::{CrudError, CrudResult};

/// One authorization request: who, what task, which table and records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub user_id: String,
    pub token: String,
    pub task: TaskType,
    pub table_name: String,
    #[serde(default)]
    pub record_ids: Vec<String>,
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub permitted: bool,
    pub reason: String,
}

impl AccessDecision {
    pub fn permit(reason: impl Into<String>) -> Self {
        Self {
            permitted: true,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            permitted: false,
            reason: reason.into(),
        }
    }
}

/// Result of a single strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Permit(&'static str),
    Deny(&'static str),
    Continue,
}

/// Everything the strategies look at. `grants` and `owner` are loaded on
/// demand, right before the first strategy that needs them.
#[derive(Debug, Clone)]
pub struct AccessContext<'a> {
    pub actor: &'a Actor,
    pub task: TaskType,
    pub table_id: Option<&'a str>,
    pub record_ids: &'a [String],
    pub grants: Option<Vec<RoleGrant>>,
    pub owner: Option<bool>,
}

impl<'a> AccessContext<'a> {
    pub fn new(
        actor: &'a Actor,
        task: TaskType,
        table_id: Option<&'a str>,
        record_ids: &'a [String],
    ) -> Self {
        Self {
            actor,
            task,
            table_id,
            record_ids,
            grants: None,
            owner: None,
        }
    }

    pub fn with_grants(mut self, grants: Vec<RoleGrant>) -> Self {
        self.grants = Some(grants);
        self
    }

    pub fn with_owner(mut self, owner: bool) -> Self {
        self.owner = Some(owner);
        self
    }

    fn grants(&self) -> &[RoleGrant] {
        self.grants.as_deref().unwrap_or_default()
    }

    /// Service ids whose grants are relevant: every record id, then the table id.
    pub fn service_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.record_ids.to_vec();
        if let Some(table_id) = self.table_id {
            ids.push(table_id.to_string());
        }
        ids
    }
}

/// Authorization strategies, evaluated in [`Strategy::CHAIN`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ActiveAccount,
    AdminOverride,
    RolePresence,
    Ownership,
    TableRole,
    RecordRole,
}

impl Strategy {
    pub const CHAIN: [Strategy; 6] = [
        Strategy::ActiveAccount,
        Strategy::AdminOverride,
        Strategy::RolePresence,
        Strategy::Ownership,
        Strategy::TableRole,
        Strategy::RecordRole,
    ];

    pub fn evaluate(&self, ctx: &AccessContext<'_>) -> Decision {
        match self {
            Strategy::ActiveAccount if !ctx.actor.is_active => {
                Decision::Deny("user account is not active")
            }
            Strategy::AdminOverride if ctx.actor.is_admin => Decision::Permit("admin"),
            Strategy::RolePresence if ctx.grants().is_empty() => {
                Decision::Deny("no role assignment found for the user's groups")
            }
            Strategy::Ownership if ctx.owner == Some(true) => Decision::Permit("owner"),
            Strategy::TableRole if table_permitted(ctx.task, ctx.table_id, ctx.grants()) => {
                Decision::Permit("table role")
            }
            Strategy::RecordRole if record_permitted(ctx.task, ctx.record_ids, ctx.grants()) => {
                Decision::Permit("record role")
            }
            _ => Decision::Continue,
        }
    }
}

/// Table-level permission: at least one grant on the table, and every one of
/// them carries the task's capability.
pub fn table_permitted(task: TaskType, table_id: Option<&str>, grants: &[RoleGrant]) -> bool {
    let Some(table_id) = table_id else {
        return false;
    };
    let mut table_grants = grants.iter().filter(|g| g.service_id == table_id).peekable();
    table_grants.peek().is_some() && table_grants.all(|g| g.permits(task))
}

/// Record-level permission: every record id has at least one grant carrying
/// the task's capability. All or nothing over the batch.
pub fn record_permitted(task: TaskType, record_ids: &[String], grants: &[RoleGrant]) -> bool {
    if !task.is_record_scoped() || record_ids.is_empty() {
        return false;
    }
    record_ids
        .iter()
        .all(|id| grants.iter().any(|g| g.service_id == *id && g.permits(task)))
}

async fn owns_all<S: AccessStore>(
    store: &S,
    table: &str,
    record_ids: &[String],
    user_id: &str,
) -> CrudResult<bool> {
    let distinct: Vec<String> = record_ids
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if distinct.is_empty() || user_id.is_empty() {
        return Ok(false);
    }
    let owned = store.count_owned(table, &distinct, user_id).await?;
    Ok(owned == distinct.len() as u64)
}

/// Validate the session behind `request`, then decide whether the actor may
/// perform the task.
///
/// Session problems are errors (`Unauthenticated`, `TokenExpired`); a valid
/// session always produces a decision. An empty record id is a `Params`
/// error, raised before any lookup.
pub async fn check_access<S: AccessStore>(
    store: &S,
    request: &AccessRequest,
) -> CrudResult<AccessDecision> {
    if request.record_ids.iter().any(String::is_empty) {
        return Err(CrudError::params("record ids must be non-empty"));
    }

    let session = store
        .find_session(&request.user_id, &request.token)
        .await?
        .ok_or_else(|| CrudError::Unauthenticated("no login session found, please login".into()))?;

    if session.is_expired_at(Utc::now().timestamp_millis()) {
        if let Err(err) = store.delete_session(&session.user_id, &session.token).await {
            tracing::warn!(
                target: "pgcrud.access",
                user_id = %request.user_id,
                error = %err,
                "failed to delete expired session"
            );
        }
        return Err(CrudError::TokenExpired(
            "login session has expired, please login again".into(),
        ));
    }

    let actor = store
        .find_actor(&request.user_id)
        .await?
        .ok_or_else(|| CrudError::unauthorized("user account not found"))?;

    let table_id = store
        .find_service(&request.table_name)
        .await?
        .filter(ServiceInfo::is_table)
        .map(|s| s.id);

    let mut ctx = AccessContext::new(
        &actor,
        request.task,
        table_id.as_deref(),
        &request.record_ids,
    );

    for strategy in Strategy::CHAIN {
        match strategy {
            Strategy::RolePresence if ctx.grants.is_none() => {
                let grants = store.role_grants(&ctx.service_ids(), &actor.groups).await?;
                ctx.grants = Some(grants);
            }
            Strategy::Ownership if ctx.owner.is_none() => {
                let owner = owns_all(
                    store,
                    &request.table_name,
                    &request.record_ids,
                    &actor.user_id,
                )
                .await?;
                ctx.owner = Some(owner);
            }
            _ => {}
        }

        match strategy.evaluate(&ctx) {
            Decision::Permit(reason) => {
                tracing::debug!(
                    target: "pgcrud.access",
                    user_id = %actor.user_id,
                    task = %request.task,
                    table = %request.table_name,
                    reason,
                    "access permitted"
                );
                return Ok(AccessDecision::permit(reason));
            }
            Decision::Deny(reason) => return Ok(deny(request, reason)),
            Decision::Continue => {}
        }
    }

    Ok(deny(request, "no role grants the requested task"))
}

fn deny(request: &AccessRequest, reason: &str) -> AccessDecision {
    tracing::warn!(
        target: "pgcrud.access",
        user_id = %request.user_id,
        task = %request.task,
        table = %request.table_name,
        reason,
        "access denied"
    );
    AccessDecision::deny(reason)
}
