//! Control-Plane Protocol
//!
//! Request/response bodies for registration, heartbeat and service listing.
//! Paths are relative to the `/api/v1/ai_analysis` prefix.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const ENDPOINT_REGISTER: &str = "/register";
pub const ENDPOINT_HEARTBEAT: &str = "/heartbeat/:service_id";
pub const ENDPOINT_UNREGISTER: &str = "/unregister/:service_id";
pub const ENDPOINT_CLEAR_ALL: &str = "/clear_all";
pub const ENDPOINT_SERVICES: &str = "/services";
pub const ENDPOINT_SERVICE_STATS: &str = "/services/stats/:task_type";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub service_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub task_types: Vec<String>,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub version: String,
    /// Zero the call counter on re-registration.
    #[serde(default)]
    pub reset_call_count: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            ok: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearAllResponse {
    pub ok: bool,
    pub cleared_count: usize,
}

/// Wire view of a `ServiceDescriptor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceView {
    pub service_id: ServiceId,
    pub name: String,
    pub version: String,
    pub task_types: Vec<String>,
    pub endpoint: String,
    pub call_count: u64,
    pub register_at: u64,
    pub last_heartbeat: u64,
    pub status: ServiceStatus,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_response_ms: u64,
    pub avg_response_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_stats: Option<HeartbeatStats>,
}

impl ServiceView {
    pub fn from_descriptor(
        descriptor: &ServiceDescriptor,
        now: Instant,
        stale_threshold: Duration,
    ) -> Self {
        Self {
            service_id: descriptor.service_id.clone(),
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            task_types: descriptor.task_types.iter().cloned().collect(),
            endpoint: descriptor.endpoint.clone(),
            call_count: descriptor.call_count,
            register_at: descriptor.register_at,
            last_heartbeat: descriptor.last_heartbeat_unix,
            status: descriptor.status(now, stale_threshold),
            success_count: descriptor.success_count,
            failure_count: descriptor.failure_count,
            last_response_ms: descriptor.last_response_ms,
            avg_response_ms: descriptor.avg_response_ms(),
            reported_stats: descriptor.reported.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServicesResponse {
    pub total: usize,
    pub services: Vec<ServiceView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatsResponse {
    pub task_type: String,
    pub total: usize,
    pub services: Vec<ServiceView>,
}
