//! Registry Module Tests
//!
//! ## Test Scopes
//! - **Registration**: Validation, upsert semantics and counter preservation.
//! - **Heartbeat**: Liveness refresh, stats merge and the endpoint fallback.
//! - **Liveness**: Status derivation at explicit instants (no sleeping).
//! - **Eviction**: The sweep removes only services past the eviction threshold.

#[cfg(test)]
mod tests {
    use crate::error::OrchestratorError;
    use crate::registry::protocol::{RegisterRequest, ServiceView};
    use crate::registry::service::ServiceRegistry;
    use crate::registry::types::{HeartbeatStats, ServiceId, ServiceStatus};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    const STALE: Duration = Duration::from_secs(90);
    const EVICT: Duration = Duration::from_secs(300);

    fn registry() -> Arc<ServiceRegistry> {
        ServiceRegistry::new(STALE, EVICT)
    }

    fn request(id: &str, endpoint: &str, task_types: &[&str]) -> RegisterRequest {
        RegisterRequest {
            service_id: id.to_string(),
            name: format!("{}-name", id),
            task_types: task_types.iter().map(|t| t.to_string()).collect(),
            endpoint: endpoint.to_string(),
            version: "1.0".to_string(),
            reset_call_count: false,
        }
    }

    // ============================================================
    // REGISTRATION
    // ============================================================

    #[test]
    fn test_register_rejects_empty_endpoint() {
        let registry = registry();

        let result = registry.register(request("svc-a", "  ", &["person_count"]));

        assert!(matches!(result, Err(OrchestratorError::Validation(_))));
        assert!(registry.is_empty(), "Rejected registration must not change state");
    }

    #[test]
    fn test_register_rejects_empty_task_types() {
        let registry = registry();

        let result = registry.register(request("svc-a", "http://h1/infer", &[]));
        assert!(matches!(result, Err(OrchestratorError::Validation(_))));

        let result = registry.register(request("svc-a", "http://h1/infer", &["", " "]));
        assert!(matches!(result, Err(OrchestratorError::Validation(_))));

        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregister_preserves_call_count_and_order() {
        // ARRANGE
        let registry = registry();
        registry
            .register(request("svc-a", "http://h1/infer", &["person_count"]))
            .unwrap();
        registry
            .register(request("svc-b", "http://h2/infer", &["person_count"]))
            .unwrap();
        let id = ServiceId("svc-a".to_string());
        registry.increment_call_count(&id);
        registry.increment_call_count(&id);
        let before = registry.get(&id).unwrap();

        // ACT: same id, new endpoint and task types
        let after = registry
            .register(request("svc-a", "http://h9/infer", &["helmet"]))
            .unwrap();

        // ASSERT
        assert_eq!(after.endpoint, "http://h9/infer");
        assert!(after.serves("helmet"));
        assert!(!after.serves("person_count"));
        assert_eq!(after.call_count, 2);
        assert_eq!(after.registration_seq, before.registration_seq);
        assert_eq!(after.register_at, before.register_at);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reregister_can_reset_call_count() {
        let registry = registry();
        registry
            .register(request("svc-a", "http://h1/infer", &["person_count"]))
            .unwrap();
        registry.increment_call_count(&ServiceId("svc-a".to_string()));

        let mut req = request("svc-a", "http://h1/infer", &["person_count"]);
        req.reset_call_count = true;
        let after = registry.register(req).unwrap();

        assert_eq!(after.call_count, 0);
    }

    // ============================================================
    // HEARTBEAT
    // ============================================================

    #[test]
    fn test_heartbeat_unknown_service_is_not_found() {
        let registry = registry();

        let result = registry.heartbeat("ghost", None);

        assert!(matches!(result, Err(OrchestratorError::NotFound(_))));
    }

    #[test]
    fn test_heartbeat_merges_stats_without_touching_call_count() {
        // ARRANGE
        let registry = registry();
        registry
            .register(request("svc-a", "http://h1/infer", &["person_count"]))
            .unwrap();
        let id = ServiceId("svc-a".to_string());
        registry.increment_call_count(&id);

        let stats = HeartbeatStats {
            total_requests: 42,
            avg_inference_time_ms: 18.5,
            last_inference_time_ms: 20.0,
            last_total_time_ms: 25.0,
        };

        // ACT
        registry.heartbeat("svc-a", Some(stats.clone())).unwrap();

        // ASSERT
        let descriptor = registry.get(&id).unwrap();
        assert_eq!(descriptor.reported, Some(stats));
        assert_eq!(descriptor.call_count, 1);
    }

    #[test]
    fn test_heartbeat_without_body_keeps_previous_stats() {
        let registry = registry();
        registry
            .register(request("svc-a", "http://h1/infer", &["person_count"]))
            .unwrap();
        let stats = HeartbeatStats {
            total_requests: 7,
            ..Default::default()
        };
        registry.heartbeat("svc-a", Some(stats.clone())).unwrap();

        registry.heartbeat("svc-a", None).unwrap();

        let descriptor = registry.get(&ServiceId("svc-a".to_string())).unwrap();
        assert_eq!(descriptor.reported, Some(stats));
    }

    #[test]
    fn test_heartbeat_falls_back_to_endpoint() {
        let registry = registry();
        registry
            .register(request("svc-a", "http://h1/infer", &["person_count"]))
            .unwrap();

        let result = registry.heartbeat("http://h1/infer", None);

        assert!(result.is_ok(), "Endpoint should match when the id does not");
    }

    #[test]
    fn test_endpoint_heartbeat_refreshes_every_entry_at_that_endpoint() {
        // ARRANGE: two ids served from one endpoint, plus a second instance
        // registering under an id that already exists
        let registry = registry();
        registry
            .register(request("svc-a", "http://shared/infer", &["fire"]))
            .unwrap();
        registry
            .register(request("svc-b", "http://shared/infer", &["fire"]))
            .unwrap();
        registry
            .register(request("svc-c", "http://h1/infer", &["fire"]))
            .unwrap();
        registry
            .register(request("svc-c", "http://h2/infer", &["fire"]))
            .unwrap();
        let stats = HeartbeatStats {
            total_requests: 3,
            avg_inference_time_ms: 10.0,
            last_inference_time_ms: 9.0,
            last_total_time_ms: 12.0,
        };

        // ACT
        registry
            .heartbeat("http://shared/infer", Some(stats.clone()))
            .unwrap();

        // ASSERT
        for id in ["svc-a", "svc-b"] {
            let descriptor = registry.get(&ServiceId(id.to_string())).unwrap();
            assert_eq!(descriptor.reported, Some(stats.clone()), "{} not refreshed", id);
        }
        let entries = registry.list_by_task_type("fire");
        assert_eq!(entries.len(), 3, "one entry per id");
        let c = registry.get(&ServiceId("svc-c".to_string())).unwrap();
        assert_eq!(c.endpoint, "http://h2/infer", "last registration wins");
        assert!(registry.heartbeat("http://h1/infer", None).is_err());
    }

    // ============================================================
    // LIVENESS
    // ============================================================

    #[test]
    fn test_status_is_live_iff_age_below_stale_threshold() {
        let registry = registry();
        let descriptor = registry
            .register(request("svc-a", "http://h1/infer", &["person_count"]))
            .unwrap();
        let t0 = descriptor.last_heartbeat;

        assert_eq!(registry.status_of(&descriptor, t0), ServiceStatus::Live);
        assert_eq!(
            registry.status_of(&descriptor, t0 + STALE - Duration::from_millis(1)),
            ServiceStatus::Live
        );
        assert_eq!(
            registry.status_of(&descriptor, t0 + STALE),
            ServiceStatus::Stale
        );
        assert_eq!(
            registry.status_of(&descriptor, t0 + STALE * 2),
            ServiceStatus::Stale
        );
    }

    #[test]
    fn test_list_by_task_type_includes_stale_services() {
        let registry = ServiceRegistry::new(Duration::from_millis(0), EVICT);
        registry
            .register(request("svc-a", "http://h1/infer", &["person_count"]))
            .unwrap();
        registry
            .register(request("svc-b", "http://h2/infer", &["helmet"]))
            .unwrap();

        let listed = registry.list_by_task_type("person_count");

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].service_id.0, "svc-a");
        assert_eq!(
            registry.status_of(&listed[0], Instant::now()),
            ServiceStatus::Stale
        );
    }

    #[test]
    fn test_service_view_reports_status_and_average() {
        let registry = registry();
        let id = ServiceId("svc-a".to_string());
        let descriptor = registry
            .register(request("svc-a", "http://h1/infer", &["person_count"]))
            .unwrap();
        registry.record_outcome(&id, true, 100);
        registry.record_outcome(&id, true, 300);
        registry.record_outcome(&id, false, 0);

        let view = ServiceView::from_descriptor(
            &registry.get(&id).unwrap(),
            descriptor.last_heartbeat + STALE,
            STALE,
        );

        assert_eq!(view.status, ServiceStatus::Stale);
        assert_eq!(view.success_count, 2);
        assert_eq!(view.failure_count, 1);
        assert_eq!(view.last_response_ms, 300);
        assert!((view.avg_response_ms - 200.0).abs() < f64::EPSILON);
    }

    // ============================================================
    // UNREGISTER / CLEAR / EVICTION
    // ============================================================

    #[test]
    fn test_unregister_and_clear_all() {
        let registry = registry();
        for (id, host) in [("a", "h1"), ("b", "h2"), ("c", "h3")] {
            registry
                .register(request(id, &format!("http://{}/infer", host), &["t"]))
                .unwrap();
        }

        assert!(registry.unregister("a").is_ok());
        assert!(matches!(
            registry.unregister("a"),
            Err(OrchestratorError::NotFound(_))
        ));
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.clear_all(), 2);
        assert_eq!(registry.clear_all(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_evict_expired_removes_only_silent_services() {
        // ARRANGE
        let registry = registry();
        let a = registry
            .register(request("svc-a", "http://h1/infer", &["t"]))
            .unwrap();
        registry
            .register(request("svc-b", "http://h2/infer", &["t"]))
            .unwrap();

        // ACT: a point in time where both are stale but not yet evictable
        let evicted = registry.evict_expired(a.last_heartbeat + STALE * 2);
        assert!(evicted.is_empty());

        // ACT: both beyond the eviction threshold
        let evicted = registry.evict_expired(Instant::now() + EVICT + Duration::from_secs(1));

        // ASSERT
        assert_eq!(evicted.len(), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_loop_evicts_and_stops_on_cancel() {
        // ARRANGE
        let registry = ServiceRegistry::new(Duration::from_millis(5), Duration::from_millis(10));
        registry
            .register(request("svc-a", "http://h1/infer", &["t"]))
            .unwrap();
        let cancel = CancellationToken::new();

        // ACT
        let handle = registry
            .clone()
            .start_sweep(Duration::from_millis(20), cancel.clone());
        tokio::time::sleep(Duration::from_millis(150)).await;

        // ASSERT
        assert!(registry.is_empty(), "Sweep should have evicted the silent service");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep did not stop")
            .unwrap();
    }

    #[test]
    fn test_task_types_union() {
        let registry = registry();
        registry
            .register(request("a", "http://h1/infer", &["person_count", "helmet"]))
            .unwrap();
        registry
            .register(request("b", "http://h2/infer", &["helmet", "fire"]))
            .unwrap();

        let types: Vec<String> = registry.task_types().into_iter().collect();

        assert_eq!(types, vec!["fire", "helmet", "person_count"]);
    }
}
