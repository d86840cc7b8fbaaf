//! Uniform response envelope returned by every CRUD entry point.

use serde::{Deserialize, Serialize};

use crate::query::QueryParam;
use crate::value::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseCode {
    Success,
    ParamsError,
    SaveError,
    RemoveError,
    ReadError,
    UnAuthorized,
    TokenExpired,
    InsertError,
    UpdateError,
    DeleteError,
}

impl ResponseCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCode::Success => "success",
            ResponseCode::ParamsError => "paramsError",
            ResponseCode::SaveError => "saveError",
            ResponseCode::RemoveError => "removeError",
            ResponseCode::ReadError => "readError",
            ResponseCode::UnAuthorized => "unAuthorized",
            ResponseCode::TokenExpired => "tokenExpired",
            ResponseCode::InsertError => "insertError",
            ResponseCode::UpdateError => "updateError",
            ResponseCode::DeleteError => "deleteError",
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result payload of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrudOutcome {
    pub query_param: QueryParam,
    pub record_ids: Vec<String>,
    pub record_count: usize,
    pub table_records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub code: ResponseCode,
    pub message: String,
    pub value: CrudOutcome,
}

impl ResponseMessage {
    pub fn success(message: impl Into<String>, value: CrudOutcome) -> Self {
        Self {
            code: ResponseCode::Success,
            message: message.into(),
            value,
        }
    }

    pub fn error(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            value: CrudOutcome::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResponseCode::Success
    }
}
