use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CrudError;

/// CRUD task an access check is performed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Create,
    Read,
    Update,
    Delete,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Create => "create",
            TaskType::Read => "read",
            TaskType::Update => "update",
            TaskType::Delete => "delete",
        }
    }

    /// Tasks that can be authorized per record id.
    pub fn is_record_scoped(&self) -> bool {
        matches!(self, TaskType::Read | TaskType::Update | TaskType::Delete)
    }
}

impl FromStr for TaskType {
    type Err = CrudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "insert" => Ok(TaskType::Create),
            "read" => Ok(TaskType::Read),
            "update" => Ok(TaskType::Update),
            "delete" | "remove" => Ok(TaskType::Delete),
            _ => Err(CrudError::UnknownTaskType(s.to_string())),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
