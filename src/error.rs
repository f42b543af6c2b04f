//! Error Taxonomy
//!
//! Failures raised at component boundaries. Plumbing code below these boundaries
//! (store I/O, HTTP transport) works with `anyhow::Result` and is mapped into one
//! of these variants where the caller needs to branch on the kind of failure.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Bad registration payload. No state change happened.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Heartbeat or unregister for an unknown service.
    #[error("service not found: {0}")]
    NotFound(String),

    /// No live backend serves the task type. The job is dropped.
    #[error("no available service for task type '{task_type}'")]
    NoAvailableService { task_type: String },

    /// The backend call failed before a well-formed response was read.
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The backend did not answer within the configured timeout.
    #[error("inference call to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    /// The job queue or the alert buffer is at capacity.
    #[error("buffer is full (capacity {capacity})")]
    Backpressure { capacity: usize },

    /// The alert store rejected a batch twice.
    #[error("alert batch of {count} records dropped: {message}")]
    BatchFlush { count: usize, message: String },

    /// The object path does not follow `<category>/<taskType>/<taskID>/<file>`.
    #[error("object path '{0}' does not follow the frame path convention")]
    InvalidObjectPath(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
