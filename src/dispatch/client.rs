//! Outbound Inference Client
//!
//! One POST per job, bounded by a hard timeout, never retried. Transport errors,
//! timeouts, non-2xx statuses and unparseable bodies all count as failed calls.

use super::protocol::{InferenceRequest, InferenceResponse};
use super::types::{FrameJob, InferenceResult};
use crate::error::{OrchestratorError, Result};

use serde_json::Value;
use std::time::{Duration, Instant};

pub struct InferenceClient {
    http_client: reqwest::Client,
    timeout: Duration,
    object_base_url: String,
    bucket: String,
}

impl InferenceClient {
    pub fn new(timeout: Duration, object_base_url: &str, bucket: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
            object_base_url: object_base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// URL the backend downloads the frame from.
    pub fn image_url(&self, object_path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.object_base_url,
            self.bucket,
            object_path.trim_start_matches('/')
        )
    }

    pub fn build_request(&self, job: &FrameJob) -> InferenceRequest {
        InferenceRequest {
            image_url: self.image_url(&job.object_path),
            task_id: job.task_id.clone(),
            task_type: job.task_type.clone(),
            image_path: job.object_path.clone(),
            algo_config: job.algo_config.clone(),
            algo_config_url: job.algo_config_url.clone(),
        }
    }

    pub async fn infer(&self, endpoint: &str, job: &FrameJob) -> Result<InferenceResult> {
        let request = self.build_request(job);
        let started = Instant::now();

        let response = self
            .http_client
            .post(endpoint)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_transport(endpoint, e))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::Transport {
                endpoint: endpoint.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport(endpoint, e))?;

        let measured_ms = started.elapsed().as_millis() as u64;
        Ok(interpret_response(body, measured_ms))
    }

    fn map_transport(&self, endpoint: &str, err: reqwest::Error) -> OrchestratorError {
        if err.is_timeout() {
            OrchestratorError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.timeout,
            }
        } else {
            OrchestratorError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Derives the detection count and settles the latency to record.
///
/// A reported `inference_time_ms` of zero or less is replaced by `measured_ms`.
pub fn interpret_response(body: InferenceResponse, measured_ms: u64) -> InferenceResult {
    let inference_time_ms = if body.inference_time_ms > 0.0 {
        body.inference_time_ms as u64
    } else {
        measured_ms
    };

    InferenceResult {
        success: body.success,
        total_count: detection_count(&body.result),
        result: body.result,
        confidence: body.confidence,
        inference_time_ms,
        error: body.error,
    }
}

fn as_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    // Floats and negatives: truncate, clamp at zero.
    value.as_f64().map(|f| if f > 0.0 { f as u64 } else { 0 })
}

/// Detection count of a backend `result` object.
///
/// Order: `total_count`, the sum of `line_crossing.<region>.count`, `count`,
/// `num`, then the length of `detections` or `objects`. Anything else is zero.
pub fn detection_count(result: &Value) -> u64 {
    let Some(map) = result.as_object() else {
        return 0;
    };

    if let Some(count) = map.get("total_count").and_then(as_count) {
        return count;
    }

    if let Some(regions) = map.get("line_crossing").and_then(Value::as_object) {
        let crossings: u64 = regions
            .values()
            .filter_map(|region| region.get("count").and_then(as_count))
            .sum();
        if crossings > 0 {
            return crossings;
        }
    }

    for key in ["count", "num"] {
        if let Some(count) = map.get(key).and_then(as_count) {
            return count;
        }
    }

    for key in ["detections", "objects"] {
        if let Some(items) = map.get(key).and_then(Value::as_array) {
            return items.len() as u64;
        }
    }

    0
}
