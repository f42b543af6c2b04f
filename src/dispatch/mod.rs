//! Inference Dispatch Module
//!
//! Moves captured frames from producers to inference backends and hands the
//! outcome to the retention pipeline.
//!
//! ## Architecture Overview
//! 1. **Enqueue**: Producers push `FrameJob`s into a bounded `JobQueue`. It never
//!    blocks: a full queue either rejects the new frame (backpressure) or evicts
//!    queued ones, depending on the `QueueStrategy`. Either way the drop is counted.
//! 2. **Select**: A worker pops a job, checks its frame is still in the bucket and asks the `LoadBalancer` for the live
//!    backend with the fewest calls. Selection and the call-count increment are
//!    one atomic step.
//! 3. **Call**: The `InferenceClient` POSTs the request with a hard timeout. A
//!    failed or timed out call is never retried.
//! 4. **Resolve**: A well-formed response is forwarded to the `RetentionPipeline`.
//!
//! Each job ends in exactly one of `Completed`, `Failed` or `Dropped`.
//!
//! ## Submodules
//! - **`queue`**: Bounded FIFO with path de-duplication, overflow strategies and the
//!   backlog warning.
//! - **`balancer`**: Least-calls selection and the load-balance analysis.
//! - **`client`**: Outbound HTTP call and detection-count extraction.
//! - **`dispatcher`**: The worker pool and the per-job state machine.
//! - **`protocol`**: Wire types for producers, backends and the analysis endpoint.

pub mod balancer;
pub mod client;
pub mod dispatcher;
pub mod handlers;
pub mod protocol;
pub mod queue;
pub mod types;
