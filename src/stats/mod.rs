//! Inference Statistics Module
//!
//! Process-wide counters describing dispatcher throughput, queue pressure and the
//! health of the retention and persistence stages.
//!
//! Counters are lock-free atomics so the data path never waits on a reader. The
//! only lock guards the latency ring that backs the windowed `avg_inference_ms`.
//!
//! ## Submodules
//! - **`rolling`**: The `RollingStats` aggregator.
//! - **`types`**: The `InferenceStats` snapshot served over HTTP.
//! - **`throttle`**: Rate limiting for backlog and slow-inference warnings.
//! - **`handlers`**: `GET /inference_stats` and `POST /inference_stats/reset`.

pub mod handlers;
pub mod rolling;
pub mod throttle;
pub mod types;

#[cfg(test)]
mod tests;
