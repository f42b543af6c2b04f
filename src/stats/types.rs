use serde::{Deserialize, Serialize};

/// Drop rate above which the node reports itself unhealthy.
pub const UNHEALTHY_DROP_RATE: f64 = 0.3;

/// Average inference latency (ms) above which the node reports itself unhealthy.
pub const UNHEALTHY_AVG_INFERENCE_MS: f64 = 3000.0;

/// Point-in-time view of the rolling statistics.
///
/// `queue_size`, `queue_max_size` and `alerts_buffered` are live readings taken
/// from the queue and the batch writer. Everything else is a counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceStats {
    pub processed_total: u64,
    pub total_inferences: u64,
    pub failed_inferences: u64,
    pub unsuccessful_responses: u64,
    pub dropped_total: u64,
    pub queue_size: usize,
    pub queue_max_size: usize,
    pub avg_inference_ms: f64,
    pub objects_deleted: u64,
    pub delete_failures: u64,
    pub consistency_warnings: u64,
    pub alerts_buffered: usize,
    pub alerts_persisted: u64,
    pub dropped_alerts: u64,
    pub dropped_batches: u64,
    /// Jobs skipped because their frame was no longer in the object store.
    pub missing_frames: u64,
    pub slow_inferences: u64,
    /// Backlog warnings emitted (rate limited).
    pub backlog_alerts: u64,
    pub drop_rate: f64,
    pub healthy: bool,
    /// Milliseconds since the Unix epoch.
    pub updated_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetStatsResponse {
    pub ok: bool,
}
