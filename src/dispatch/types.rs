use crate::now_ms;
use serde::{Deserialize, Serialize};

/// One unit of dispatchable work. Consumed exactly once, never re-enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameJob {
    pub job_id: String,
    pub task_id: String,
    pub task_type: String,
    /// Location of the frame in the object store bucket.
    pub object_path: String,
    /// Opaque per-task parameters, passed through to the backend.
    pub algo_config: serde_json::Value,
    pub algo_config_url: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub enqueued_at: u64,
}

impl FrameJob {
    pub fn new(
        task_id: impl Into<String>,
        task_type: impl Into<String>,
        object_path: impl Into<String>,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            task_type: task_type.into(),
            object_path: object_path.into(),
            algo_config: serde_json::Value::Null,
            algo_config_url: None,
            enqueued_at: now_ms(),
        }
    }

    pub fn with_algo_config(mut self, algo_config: serde_json::Value) -> Self {
        self.algo_config = algo_config;
        self
    }
}

/// Per-job lifecycle. The last three states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Selecting,
    Calling,
    Completed,
    Failed,
    Dropped,
}

/// How a job ended. Returned by the worker step so callers and tests can see it.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        service_id: String,
        success: bool,
        detection_count: u64,
    },
    Failed {
        service_id: String,
        reason: String,
    },
    Dropped {
        reason: String,
    },
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Completed { .. } => JobState::Completed,
            JobOutcome::Failed { .. } => JobState::Failed,
            JobOutcome::Dropped { .. } => JobState::Dropped,
        }
    }
}

/// A well-formed backend response with its measured and derived numbers.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub success: bool,
    /// Authoritative detection count.
    pub total_count: u64,
    pub result: serde_json::Value,
    pub confidence: f64,
    /// Backend-reported inference time, or the measured round trip when the
    /// backend reported nothing useful.
    pub inference_time_ms: u64,
    pub error: Option<String>,
}

/// What a full queue does with a new frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStrategy {
    /// Reject the new frame with `Backpressure`.
    #[default]
    DropNewest,
    /// Evict the oldest queued frame to make room.
    DropOldest,
    /// Evict everything queued and keep only the new frame.
    LatestOnly,
}
