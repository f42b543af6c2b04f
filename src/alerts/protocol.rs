//! Alert Query Protocol
//!
//! Paths are relative to the `/api/v1` prefix.

use super::types::AlertRecord;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_ALERTS: &str = "/alerts";
pub const ENDPOINT_ALERT_BY_ID: &str = "/alerts/:id";
pub const ENDPOINT_ALERT_TASK_IDS: &str = "/alerts/task_ids";
pub const ENDPOINT_ALERT_BATCH_DELETE: &str = "/alerts/batch_delete";

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskIdsResponse {
    pub task_ids: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteAlertResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchDeleteResponse {
    pub ok: bool,
    pub deleted_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
