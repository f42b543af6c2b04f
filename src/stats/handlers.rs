use super::rolling::RollingStats;
use super::types::*;
use crate::alerts::writer::BatchWriter;
use crate::dispatch::queue::JobQueue;

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

pub const ENDPOINT_INFERENCE_STATS: &str = "/inference_stats";
pub const ENDPOINT_INFERENCE_STATS_RESET: &str = "/inference_stats/reset";

pub async fn handle_inference_stats(
    Extension(stats): Extension<Arc<RollingStats>>,
    Extension(queue): Extension<Arc<JobQueue>>,
    Extension(writer): Extension<Arc<BatchWriter>>,
) -> (StatusCode, Json<InferenceStats>) {
    let snapshot = stats.snapshot(queue.len(), queue.capacity(), writer.buffered());
    if !snapshot.healthy {
        tracing::warn!(
            "Inference pipeline unhealthy: drop_rate={:.2} avg_inference_ms={:.1}",
            snapshot.drop_rate,
            snapshot.avg_inference_ms
        );
    }

    (StatusCode::OK, Json(snapshot))
}

pub async fn handle_reset_inference_stats(
    Extension(stats): Extension<Arc<RollingStats>>,
) -> (StatusCode, Json<ResetStatsResponse>) {
    stats.reset();
    (StatusCode::OK, Json(ResetStatsResponse { ok: true }))
}
