use super::protocol::*;
use super::service::ServiceRegistry;
use super::types::HeartbeatStats;
use crate::error::OrchestratorError;

use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;

fn status_for(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn handle_register(
    Extension(registry): Extension<Arc<ServiceRegistry>>,
    Json(req): Json<RegisterRequest>,
) -> (StatusCode, Json<RegisterResponse>) {
    match registry.register(req) {
        Ok(descriptor) => (
            StatusCode::OK,
            Json(RegisterResponse {
                ok: true,
                service_id: Some(descriptor.service_id.0),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!("Rejected registration: {}", e);
            (
                status_for(&e),
                Json(RegisterResponse {
                    ok: false,
                    service_id: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_heartbeat(
    Extension(registry): Extension<Arc<ServiceRegistry>>,
    Path(service_id): Path<String>,
    body: Option<Json<HeartbeatStats>>,
) -> (StatusCode, Json<OkResponse>) {
    let stats = body.map(|Json(stats)| stats);

    match registry.heartbeat(&service_id, stats) {
        Ok(()) => (StatusCode::OK, Json(OkResponse::ok())),
        Err(e) => (status_for(&e), Json(OkResponse::failed(e))),
    }
}

pub async fn handle_unregister(
    Extension(registry): Extension<Arc<ServiceRegistry>>,
    Path(service_id): Path<String>,
) -> (StatusCode, Json<OkResponse>) {
    match registry.unregister(&service_id) {
        Ok(()) => (StatusCode::OK, Json(OkResponse::ok())),
        Err(e) => (status_for(&e), Json(OkResponse::failed(e))),
    }
}

pub async fn handle_clear_all(
    Extension(registry): Extension<Arc<ServiceRegistry>>,
) -> (StatusCode, Json<ClearAllResponse>) {
    let cleared_count = registry.clear_all();

    (
        StatusCode::OK,
        Json(ClearAllResponse {
            ok: true,
            cleared_count,
        }),
    )
}

pub async fn handle_list_services(
    Extension(registry): Extension<Arc<ServiceRegistry>>,
) -> (StatusCode, Json<ServicesResponse>) {
    let services = registry.views(&registry.list_all());

    (
        StatusCode::OK,
        Json(ServicesResponse {
            total: services.len(),
            services,
        }),
    )
}

pub async fn handle_service_stats(
    Extension(registry): Extension<Arc<ServiceRegistry>>,
    Path(task_type): Path<String>,
) -> (StatusCode, Json<ServiceStatsResponse>) {
    let services = registry.views(&registry.list_by_task_type(&task_type));
    tracing::debug!("Service stats for {}: {} service(s)", task_type, services.len());

    (
        StatusCode::OK,
        Json(ServiceStatsResponse {
            task_type,
            total: services.len(),
            services,
        }),
    )
}
