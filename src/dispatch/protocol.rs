//! Dispatch Protocol
//!
//! Producer-facing enqueue DTOs, the outbound backend contract and the
//! load-balance analysis view. Paths are relative to `/api/v1/ai_analysis`.

use super::types::FrameJob;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ENDPOINT_FRAMES: &str = "/frames";
pub const ENDPOINT_QUEUE_RESET: &str = "/queue/reset";
pub const ENDPOINT_LOAD_BALANCE_ANALYSIS: &str = "/load_balance/analysis";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueFrameRequest {
    pub task_id: String,
    pub task_type: String,
    pub object_path: String,
    #[serde(default)]
    pub algo_config: serde_json::Value,
    #[serde(default)]
    pub algo_config_url: Option<String>,
}

impl EnqueueFrameRequest {
    pub fn into_job(self) -> FrameJob {
        let mut job = FrameJob::new(self.task_id, self.task_type, self.object_path)
            .with_algo_config(self.algo_config);
        job.algo_config_url = self.algo_config_url;
        job
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueueFrameResponse {
    pub ok: bool,
    /// `accepted`, `duplicate`, `backpressure` or `invalid`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub queue_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueResetResponse {
    pub ok: bool,
    pub cleared_count: usize,
}

/// Body POSTed to a backend's endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub image_url: String,
    pub task_id: String,
    pub task_type: String,
    pub image_path: String,
    pub algo_config: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algo_config_url: Option<String>,
}

/// What a backend answers. Missing fields default so partial answers still parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceResponse {
    pub success: bool,
    pub result: serde_json::Value,
    pub confidence: f64,
    pub inference_time_ms: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLoad {
    pub service_id: String,
    pub endpoint: String,
    pub call_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Call distribution across the services of one task type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTypeAnalysis {
    pub service_count: usize,
    pub total_calls: u64,
    pub avg_calls: f64,
    pub min_calls: u64,
    pub max_calls: u64,
    pub variance: f64,
    pub balance_quality: BalanceQuality,
    pub services: Vec<ServiceLoad>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadBalanceAnalysisResponse {
    pub analysis: BTreeMap<String, TaskTypeAnalysis>,
}
