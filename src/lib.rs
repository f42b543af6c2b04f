//! Inference Orchestrator
//!
//! Server-side core that routes captured frames to pluggable inference backends
//! and decides, from each result, whether the frame is deleted or kept as an alert.
//!
//! ## Modules
//! - **`registry`**: Live set of algorithm services, heartbeats and eviction.
//! - **`stats`**: Process-wide counters and the windowed latency average.
//! - **`dispatch`**: Bounded job queue, least-calls balancer and the worker pool.
//! - **`retention`**: Delete-or-keep decision and the object-store contract.
//! - **`alerts`**: Batched, transactional alert persistence and the query API.
//! - **`app`**: Component wiring, HTTP routes and lifecycle.

pub mod alerts;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod retention;
pub mod stats;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
