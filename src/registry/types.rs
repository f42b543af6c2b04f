use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};

/// Client-supplied identity of an algorithm service. The only stable key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub String);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Live,
    Stale,
}

/// Performance numbers a backend may attach to its heartbeat.
///
/// Merged into the descriptor for observability only; routing ignores them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeartbeatStats {
    pub total_requests: u64,
    pub avg_inference_time_ms: f64,
    pub last_inference_time_ms: f64,
    pub last_total_time_ms: f64,
}

/// One registered algorithm backend.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub service_id: ServiceId,
    pub name: String,
    pub version: String,
    pub task_types: BTreeSet<String>,
    /// Full URL the dispatcher POSTs inference requests to.
    pub endpoint: String,
    /// Dispatches routed to this service. Monotonic unless reset on re-registration.
    pub call_count: u64,
    /// Registry-wide registration order. Tie-break for least-calls selection.
    pub registration_seq: u64,
    /// Unix seconds of first registration.
    pub register_at: u64,
    pub last_heartbeat: Instant,
    /// Unix seconds of the last heartbeat, for display.
    pub last_heartbeat_unix: u64,
    pub reported: Option<HeartbeatStats>,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_response_ms: u64,
    pub total_response_ms: u64,
}

impl ServiceDescriptor {
    /// `Live` iff the heartbeat age at `now` is strictly below `stale_threshold`.
    pub fn status(&self, now: Instant, stale_threshold: Duration) -> ServiceStatus {
        if now.saturating_duration_since(self.last_heartbeat) < stale_threshold {
            ServiceStatus::Live
        } else {
            ServiceStatus::Stale
        }
    }

    pub fn serves(&self, task_type: &str) -> bool {
        self.task_types.contains(task_type)
    }

    pub fn avg_response_ms(&self) -> f64 {
        if self.success_count == 0 {
            return 0.0;
        }
        self.total_response_ms as f64 / self.success_count as f64
    }
}
