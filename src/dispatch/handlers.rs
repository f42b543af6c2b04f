use super::balancer::LoadBalancer;
use super::dispatcher::Dispatcher;
use super::protocol::*;
use super::queue::EnqueueOutcome;
use crate::error::OrchestratorError;

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

pub async fn handle_enqueue_frame(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    Json(req): Json<EnqueueFrameRequest>,
) -> (StatusCode, Json<EnqueueFrameResponse>) {
    let queue = dispatcher.queue();

    if req.task_id.trim().is_empty()
        || req.task_type.trim().is_empty()
        || req.object_path.trim().is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(EnqueueFrameResponse {
                ok: false,
                status: "invalid".to_string(),
                job_id: None,
                queue_size: queue.len(),
            }),
        );
    }

    let job = req.into_job();
    let job_id = job.job_id.clone();

    let (code, status, job_id) = match dispatcher.enqueue(job) {
        Ok(EnqueueOutcome::Accepted | EnqueueOutcome::Displaced(_)) => {
            (StatusCode::ACCEPTED, "accepted", Some(job_id))
        }
        Ok(EnqueueOutcome::Duplicate) => (StatusCode::CONFLICT, "duplicate", None),
        Err(OrchestratorError::Backpressure { .. }) => {
            (StatusCode::TOO_MANY_REQUESTS, "backpressure", None)
        }
        Err(e) => {
            tracing::error!("Unexpected enqueue failure: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "error", None)
        }
    };

    (
        code,
        Json(EnqueueFrameResponse {
            ok: code == StatusCode::ACCEPTED,
            status: status.to_string(),
            job_id,
            queue_size: queue.len(),
        }),
    )
}

pub async fn handle_queue_reset(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
) -> (StatusCode, Json<QueueResetResponse>) {
    let cleared_count = dispatcher.queue().clear();
    tracing::warn!("Job queue reset, {} pending job(s) discarded", cleared_count);

    (
        StatusCode::OK,
        Json(QueueResetResponse {
            ok: true,
            cleared_count,
        }),
    )
}

pub async fn handle_load_balance_analysis(
    Extension(balancer): Extension<Arc<LoadBalancer>>,
) -> (StatusCode, Json<LoadBalanceAnalysisResponse>) {
    (
        StatusCode::OK,
        Json(LoadBalanceAnalysisResponse {
            analysis: balancer.analysis(),
        }),
    )
}
