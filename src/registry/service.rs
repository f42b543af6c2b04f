use super::protocol::{RegisterRequest, ServiceView};
use super::types::*;
use crate::error::{OrchestratorError, Result};
use crate::now_secs;

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ServiceRegistry {
    services: DashMap<ServiceId, ServiceDescriptor>,
    next_seq: AtomicU64,
    stale_threshold: Duration,
    eviction_threshold: Duration,
}

impl ServiceRegistry {
    pub fn new(stale_threshold: Duration, eviction_threshold: Duration) -> Arc<Self> {
        Arc::new(Self {
            services: DashMap::new(),
            next_seq: AtomicU64::new(0),
            stale_threshold,
            eviction_threshold,
        })
    }

    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    /// Upserts a service by `service_id` and stamps its heartbeat.
    ///
    /// Rejects an empty id, endpoint or task type set without touching state.
    pub fn register(&self, req: RegisterRequest) -> Result<ServiceDescriptor> {
        let service_id = req.service_id.trim();
        let endpoint = req.endpoint.trim();
        let task_types: BTreeSet<String> = req
            .task_types
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if service_id.is_empty() {
            return Err(OrchestratorError::Validation("service_id required".into()));
        }
        if endpoint.is_empty() {
            return Err(OrchestratorError::Validation("endpoint required".into()));
        }
        if task_types.is_empty() {
            return Err(OrchestratorError::Validation("task_types required".into()));
        }

        let id = ServiceId(service_id.to_string());
        let now = Instant::now();
        let now_unix = now_secs();

        let descriptor = match self.services.get_mut(&id) {
            Some(mut existing) => {
                existing.name = req.name;
                existing.version = req.version;
                existing.task_types = task_types;
                existing.endpoint = endpoint.to_string();
                existing.last_heartbeat = now;
                existing.last_heartbeat_unix = now_unix;
                if req.reset_call_count {
                    existing.call_count = 0;
                }

                tracing::info!(
                    "Re-registered service {} at {} (call_count={})",
                    id,
                    existing.endpoint,
                    existing.call_count
                );
                existing.clone()
            }
            None => {
                let descriptor = ServiceDescriptor {
                    service_id: id.clone(),
                    name: req.name,
                    version: req.version,
                    task_types,
                    endpoint: endpoint.to_string(),
                    call_count: 0,
                    registration_seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                    register_at: now_unix,
                    last_heartbeat: now,
                    last_heartbeat_unix: now_unix,
                    reported: None,
                    success_count: 0,
                    failure_count: 0,
                    last_response_ms: 0,
                    total_response_ms: 0,
                };

                tracing::info!(
                    "Registered service {} ({}) at {} for {:?}",
                    id,
                    descriptor.name,
                    descriptor.endpoint,
                    descriptor.task_types
                );
                // `entry` closes the window between the miss above and the insert.
                self.services
                    .entry(id)
                    .or_insert(descriptor)
                    .value()
                    .clone()
            }
        };

        Ok(descriptor)
    }

    /// Refreshes liveness and merges any reported stats. Does not touch `call_count`.
    ///
    /// Matches on `service_id` first, then falls back to the endpoint URL so a
    /// backend that only knows its own endpoint can still heartbeat; every entry
    /// registered at that endpoint is refreshed. Instances registering under one
    /// id share a single entry and the last registration wins.
    pub fn heartbeat(&self, id: &str, stats: Option<HeartbeatStats>) -> Result<()> {
        let now = Instant::now();
        let now_unix = now_secs();

        if let Some(mut entry) = self.services.get_mut(&ServiceId(id.to_string())) {
            entry.last_heartbeat = now;
            entry.last_heartbeat_unix = now_unix;
            if stats.is_some() {
                entry.reported = stats;
            }
            tracing::debug!("Heartbeat from {}", id);
            return Ok(());
        }

        let mut matched = 0;
        for mut entry in self.services.iter_mut() {
            if entry.endpoint == id {
                entry.last_heartbeat = now;
                entry.last_heartbeat_unix = now_unix;
                if stats.is_some() {
                    entry.reported = stats.clone();
                }
                matched += 1;
            }
        }

        if matched == 0 {
            tracing::warn!("Heartbeat from unknown service {}", id);
            return Err(OrchestratorError::NotFound(id.to_string()));
        }

        tracing::debug!("Heartbeat matched {} service(s) by endpoint {}", matched, id);
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> Result<()> {
        match self.services.remove(&ServiceId(id.to_string())) {
            Some((id, descriptor)) => {
                tracing::info!("Unregistered service {} at {}", id, descriptor.endpoint);
                Ok(())
            }
            None => {
                tracing::warn!("Unregister for unknown service {}", id);
                Err(OrchestratorError::NotFound(id.to_string()))
            }
        }
    }

    /// Removes every service and returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let count = self.services.len();
        self.services.clear();
        tracing::warn!("Cleared {} registered service(s)", count);
        count
    }

    pub fn get(&self, id: &ServiceId) -> Option<ServiceDescriptor> {
        self.services.get(id).map(|entry| entry.value().clone())
    }

    /// All services declaring `task_type`, live or stale, in registration order.
    pub fn list_by_task_type(&self, task_type: &str) -> Vec<ServiceDescriptor> {
        let mut services: Vec<ServiceDescriptor> = self
            .services
            .iter()
            .filter(|entry| entry.value().serves(task_type))
            .map(|entry| entry.value().clone())
            .collect();
        services.sort_by_key(|s| s.registration_seq);
        services
    }

    pub fn list_all(&self) -> Vec<ServiceDescriptor> {
        let mut services: Vec<ServiceDescriptor> = self
            .services
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        services.sort_by_key(|s| s.registration_seq);
        services
    }

    pub fn task_types(&self) -> BTreeSet<String> {
        self.services
            .iter()
            .flat_map(|entry| entry.value().task_types.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn status_of(&self, descriptor: &ServiceDescriptor, now: Instant) -> ServiceStatus {
        descriptor.status(now, self.stale_threshold)
    }

    pub fn views(&self, services: &[ServiceDescriptor]) -> Vec<ServiceView> {
        let now = Instant::now();
        services
            .iter()
            .map(|s| ServiceView::from_descriptor(s, now, self.stale_threshold))
            .collect()
    }

    /// Bumps the call counter. Returns the new value, or `None` if the service
    /// disappeared in the meantime.
    pub fn increment_call_count(&self, id: &ServiceId) -> Option<u64> {
        self.services.get_mut(id).map(|mut entry| {
            entry.call_count += 1;
            entry.call_count
        })
    }

    /// Per-service bookkeeping after a dispatch finished.
    pub fn record_outcome(&self, id: &ServiceId, success: bool, response_ms: u64) {
        if let Some(mut entry) = self.services.get_mut(id) {
            if success {
                entry.success_count += 1;
                entry.last_response_ms = response_ms;
                entry.total_response_ms += response_ms;
            } else {
                entry.failure_count += 1;
            }
        }
    }

    /// Removes services whose heartbeat age at `now` exceeds the eviction threshold.
    pub fn evict_expired(&self, now: Instant) -> Vec<ServiceId> {
        let mut evicted = Vec::new();

        self.services.retain(|id, descriptor| {
            let age = now.saturating_duration_since(descriptor.last_heartbeat);
            if age > self.eviction_threshold {
                tracing::warn!(
                    "Service {} at {} evicted (no heartbeat for {:?})",
                    id,
                    descriptor.endpoint,
                    age
                );
                evicted.push(id.clone());
                false
            } else {
                true
            }
        });

        evicted
    }

    /// Spawns the periodic eviction sweep. Stops when `cancel` fires.
    pub fn start_sweep(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Registry sweep stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = self.evict_expired(Instant::now());
                        if !evicted.is_empty() {
                            tracing::info!(
                                "Registry sweep evicted {} service(s), {} remaining",
                                evicted.len(),
                                self.len()
                            );
                        }
                    }
                }
            }
        })
    }
}
