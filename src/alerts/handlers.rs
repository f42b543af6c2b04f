use super::protocol::*;
use super::store::AlertStore;
use super::types::{AlertPage, AlertQuery};

use axum::extract::{Path, Query};
use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

pub async fn handle_list_alerts(
    Extension(store): Extension<Arc<dyn AlertStore>>,
    Query(query): Query<AlertQuery>,
) -> (StatusCode, Json<AlertPage>) {
    match store.list(&query).await {
        Ok(page) => (StatusCode::OK, Json(page)),
        Err(e) => {
            tracing::error!("Failed to list alerts: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AlertPage {
                    items: Vec::new(),
                    total: 0,
                    page: query.page(),
                    page_size: query.page_size(),
                }),
            )
        }
    }
}

pub async fn handle_get_alert(
    Extension(store): Extension<Arc<dyn AlertStore>>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<AlertResponse>) {
    match store.get(id).await {
        Ok(Some(alert)) => (
            StatusCode::OK,
            Json(AlertResponse {
                alert: Some(alert),
                error: None,
            }),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(AlertResponse {
                alert: None,
                error: Some(format!("alert {} not found", id)),
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to load alert {}: {:#}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AlertResponse {
                    alert: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_alert_task_ids(
    Extension(store): Extension<Arc<dyn AlertStore>>,
) -> (StatusCode, Json<TaskIdsResponse>) {
    match store.task_ids().await {
        Ok(task_ids) => (
            StatusCode::OK,
            Json(TaskIdsResponse {
                total: task_ids.len(),
                task_ids,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to list alert task ids: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TaskIdsResponse {
                    task_ids: Vec::new(),
                    total: 0,
                }),
            )
        }
    }
}

pub async fn handle_delete_alert(
    Extension(store): Extension<Arc<dyn AlertStore>>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<DeleteAlertResponse>) {
    match store.delete(id).await {
        Ok(true) => {
            tracing::info!("Deleted alert {}", id);
            (
                StatusCode::OK,
                Json(DeleteAlertResponse {
                    ok: true,
                    error: None,
                }),
            )
        }
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(DeleteAlertResponse {
                ok: false,
                error: Some(format!("alert {} not found", id)),
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to delete alert {}: {:#}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DeleteAlertResponse {
                    ok: false,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_batch_delete_alerts(
    Extension(store): Extension<Arc<dyn AlertStore>>,
    Json(req): Json<BatchDeleteRequest>,
) -> (StatusCode, Json<BatchDeleteResponse>) {
    if req.ids.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BatchDeleteResponse {
                ok: false,
                deleted_count: 0,
                error: Some("ids must not be empty".to_string()),
            }),
        );
    }

    match store.delete_many(&req.ids).await {
        Ok(deleted_count) => {
            tracing::info!(
                "Batch delete removed {} of {} alert(s)",
                deleted_count,
                req.ids.len()
            );
            (
                StatusCode::OK,
                Json(BatchDeleteResponse {
                    ok: true,
                    deleted_count,
                    error: None,
                }),
            )
        }
        Err(e) => {
            tracing::error!("Batch delete of {} alert(s) failed: {:#}", req.ids.len(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BatchDeleteResponse {
                    ok: false,
                    deleted_count: 0,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
