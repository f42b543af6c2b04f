//! Least-Calls Load Balancer
//!
//! Routes each job to the live backend with the fewest dispatched calls, breaking
//! ties by registration order. The policy is stateless; all state lives in the
//! registry.

use super::protocol::{BalanceQuality, ServiceLoad, TaskTypeAnalysis};
use crate::error::{OrchestratorError, Result};
use crate::registry::service::ServiceRegistry;
use crate::registry::types::{ServiceDescriptor, ServiceStatus};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub struct LoadBalancer {
    registry: Arc<ServiceRegistry>,
    /// Serialises select+increment so concurrent workers never read the same minimum.
    select_lock: Mutex<()>,
}

impl LoadBalancer {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            select_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Pure selection over the current registry contents. Does not count the call.
    pub fn select_service(&self, task_type: &str) -> Result<ServiceDescriptor> {
        self.select_at(task_type, Instant::now())
    }

    pub fn select_at(&self, task_type: &str, now: Instant) -> Result<ServiceDescriptor> {
        self.registry
            .list_by_task_type(task_type)
            .into_iter()
            .filter(|s| self.registry.status_of(s, now) == ServiceStatus::Live)
            .min_by_key(|s| (s.call_count, s.registration_seq))
            .ok_or_else(|| OrchestratorError::NoAvailableService {
                task_type: task_type.to_string(),
            })
    }

    /// Selects a backend and counts the call against it, as one step.
    ///
    /// The returned descriptor carries the post-increment `call_count`.
    pub fn acquire(&self, task_type: &str) -> Result<ServiceDescriptor> {
        let _guard = self.select_lock.lock().unwrap_or_else(|e| e.into_inner());

        loop {
            let mut chosen = self.select_service(task_type)?;

            // The service may have been unregistered between select and increment.
            if let Some(call_count) = self.registry.increment_call_count(&chosen.service_id) {
                chosen.call_count = call_count;
                tracing::debug!(
                    "Selected {} for {} (call_count={})",
                    chosen.service_id,
                    task_type,
                    call_count
                );
                return Ok(chosen);
            }
        }
    }

    /// Call distribution for every registered task type.
    pub fn analysis(&self) -> BTreeMap<String, TaskTypeAnalysis> {
        self.registry
            .task_types()
            .into_iter()
            .filter_map(|task_type| {
                let services = self.registry.list_by_task_type(&task_type);
                analyse(&services).map(|analysis| (task_type, analysis))
            })
            .collect()
    }
}

fn analyse(services: &[ServiceDescriptor]) -> Option<TaskTypeAnalysis> {
    if services.is_empty() {
        return None;
    }

    let service_count = services.len();
    let total_calls: u64 = services.iter().map(|s| s.call_count).sum();
    let min_calls = services.iter().map(|s| s.call_count).min().unwrap_or(0);
    let max_calls = services.iter().map(|s| s.call_count).max().unwrap_or(0);
    let avg_calls = total_calls as f64 / service_count as f64;
    let variance = services
        .iter()
        .map(|s| {
            let diff = s.call_count as f64 - avg_calls;
            diff * diff
        })
        .sum::<f64>()
        / service_count as f64;

    Some(TaskTypeAnalysis {
        service_count,
        total_calls,
        avg_calls,
        min_calls,
        max_calls,
        variance,
        balance_quality: balance_quality(service_count, min_calls, max_calls, avg_calls),
        services: services
            .iter()
            .map(|s| ServiceLoad {
                service_id: s.service_id.0.clone(),
                endpoint: s.endpoint.clone(),
                call_count: s.call_count,
            })
            .collect(),
    })
}

/// Thresholds are truncated to whole calls before comparing.
pub fn balance_quality(
    service_count: usize,
    min_calls: u64,
    max_calls: u64,
    avg_calls: f64,
) -> BalanceQuality {
    if service_count <= 1 {
        return BalanceQuality::Excellent;
    }

    let spread = max_calls - min_calls;
    if spread > (avg_calls * 0.5) as u64 {
        BalanceQuality::Poor
    } else if spread > (avg_calls * 0.2) as u64 {
        BalanceQuality::Fair
    } else {
        BalanceQuality::Good
    }
}
