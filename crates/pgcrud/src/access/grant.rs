use serde::{Deserialize, Serialize};

use super::task::TaskType;

/// A login session row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub token: String,
    pub login_name: String,
    /// Expiry in milliseconds since the Unix epoch.
    pub expire: i64,
}

impl Session {
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expire < now_millis
    }
}

/// The user an access request is made for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub groups: Vec<String>,
    pub is_admin: bool,
    pub is_active: bool,
}

/// A catalog entry for a table or a record-scoped service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub category: String,
}

impl ServiceInfo {
    /// Table and collection services authorize at table level.
    pub fn is_table(&self) -> bool {
        self.category.eq_ignore_ascii_case("table") || self.category.eq_ignore_ascii_case("collection")
    }
}

/// Capabilities granted to one group on one service (a table id or a record id).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub service_id: String,
    pub group_id: String,
    pub is_active: bool,
    pub can_read: bool,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl RoleGrant {
    /// Whether this grant carries the capability for `task`.
    pub fn permits(&self, task: TaskType) -> bool {
        match task {
            TaskType::Create => self.can_create,
            TaskType::Read => self.can_read,
            TaskType::Update => self.can_update,
            TaskType::Delete => self.can_delete,
        }
    }
}
