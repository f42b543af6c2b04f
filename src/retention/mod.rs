//! Conditional Retention Module
//!
//! Decides what happens to a frame once its inference came back: frames with no
//! detections are deleted from the object store, frames with detections are kept
//! and turned into an alert record for the batch writer. Tasks that opt out of
//! `save_alert_image` get the alert without the frame.
//!
//! ## Path Convention
//! Frames live at `<category>/<taskType>/<taskID>/<file>`, retained frames at
//! `<alert_base_path>/<taskType>/<taskID>/<file>`. The task id is the
//! second-to-last segment and this is the only place it is read from when an
//! alert is persisted.
//!
//! ## Submodules
//! - **`path`**: Parsing and building object paths.
//! - **`object_store`**: The object-store contract plus S3, filesystem and in-memory stores.
//! - **`pipeline`**: `RetentionPipeline::resolve`.

pub mod object_store;
pub mod path;
pub mod pipeline;
