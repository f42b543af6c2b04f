//! Alert Persistence Module
//!
//! Positive detections become `AlertRecord`s. They are buffered by the
//! `BatchWriter` and written to the `AlertStore` in transactional batches, either
//! when the buffer reaches `batch_size` or when `batch_interval` has passed since
//! the last flush.
//!
//! ## Core Mechanisms
//! - **Buffer Swap**: A flush takes the whole buffer under the lock and releases
//!   it before any I/O, so appends never wait on the store.
//! - **Single Flusher**: One background task performs every flush. Batches reach
//!   the store in the order they were cut.
//! - **Retry Once**: A rejected batch is retried once after a short pause, then
//!   logged in full and counted as dropped.
//! - **Path Identity**: Before a batch is written, each record's `task_id` is
//!   checked against the task id segment of its `image_path`.
//!
//! ## Submodules
//! - **`store`**: The `AlertStore` contract and the in-memory store.
//! - **`sqlite`**: The SQLite-backed store.
//! - **`writer`**: The `BatchWriter`.
//! - **`handlers`** / **`protocol`**: The alert query API.

pub mod handlers;
pub mod protocol;
pub mod sqlite;
pub mod store;
pub mod types;
pub mod writer;
