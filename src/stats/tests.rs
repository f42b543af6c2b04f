//! Stats Module Tests
//!
//! Counter bookkeeping, the latency window, the derived health flags and the
//! operational warning throttle.

#[cfg(test)]
mod tests {
    use crate::stats::rolling::RollingStats;
    use crate::stats::throttle::AlertThrottle;

    use std::time::{Duration, Instant};

    // ============================================================
    // LATENCY WINDOW
    // ============================================================

    #[test]
    fn test_average_covers_only_last_k_samples() {
        let stats = RollingStats::new(3);

        for latency in [1000, 10, 20, 30] {
            stats.record_inference(latency, true);
        }

        // 1000 fell out of the window
        assert!((stats.avg_inference_ms() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_window_averages_to_zero() {
        let stats = RollingStats::new(10);
        assert_eq!(stats.avg_inference_ms(), 0.0);
    }

    // ============================================================
    // SNAPSHOT
    // ============================================================

    #[test]
    fn test_snapshot_counts_and_live_gauges() {
        // ARRANGE
        let stats = RollingStats::new(10);
        stats.record_inference(40, true);
        stats.record_inference(60, false);
        stats.record_processed();
        stats.record_processed();
        stats.record_failed_inference();
        stats.record_processed();
        stats.record_object_deleted();
        stats.record_consistency_warning();

        // ACT
        let snapshot = stats.snapshot(5, 100, 2);

        // ASSERT
        assert_eq!(snapshot.processed_total, 3);
        assert_eq!(snapshot.total_inferences, 2);
        assert_eq!(snapshot.unsuccessful_responses, 1);
        assert_eq!(snapshot.failed_inferences, 1);
        assert_eq!(snapshot.objects_deleted, 1);
        assert_eq!(snapshot.consistency_warnings, 1);
        assert_eq!(snapshot.queue_size, 5);
        assert_eq!(snapshot.queue_max_size, 100);
        assert_eq!(snapshot.alerts_buffered, 2);
        assert!((snapshot.avg_inference_ms - 50.0).abs() < f64::EPSILON);
        assert!(snapshot.healthy);
        assert!(snapshot.updated_at > 0);
    }

    #[test]
    fn test_high_drop_rate_is_unhealthy() {
        let stats = RollingStats::new(10);
        stats.record_processed();
        stats.record_dropped(1);

        let snapshot = stats.snapshot(0, 10, 0);

        assert!((snapshot.drop_rate - 0.5).abs() < f64::EPSILON);
        assert!(!snapshot.healthy);
    }

    #[test]
    fn test_slow_inference_is_unhealthy() {
        let stats = RollingStats::new(10);
        stats.record_inference(5000, true);

        assert!(!stats.snapshot(0, 10, 0).healthy);
    }

    #[test]
    fn test_reset_zeroes_counters() {
        let stats = RollingStats::new(10);
        stats.record_inference(100, true);
        stats.record_processed();
        stats.record_dropped(4);
        stats.record_alerts_persisted(3);
        stats.record_missing_frame();
        stats.record_slow_inference();
        stats.record_backlog_alert();

        stats.reset();
        let snapshot = stats.snapshot(1, 10, 0);

        assert_eq!(snapshot.processed_total, 0);
        assert_eq!(snapshot.dropped_total, 0);
        assert_eq!(snapshot.total_inferences, 0);
        assert_eq!(snapshot.alerts_persisted, 0);
        assert_eq!(snapshot.missing_frames, 0);
        assert_eq!(snapshot.slow_inferences, 0);
        assert_eq!(snapshot.backlog_alerts, 0);
        assert_eq!(snapshot.avg_inference_ms, 0.0);
        assert_eq!(snapshot.queue_size, 1, "Live gauges are not counters");
    }

    #[test]
    fn test_snapshot_serializes_with_snake_case_fields() {
        let stats = RollingStats::new(10);
        let json = serde_json::to_value(stats.snapshot(0, 100, 0)).unwrap();

        for key in [
            "processed_total",
            "total_inferences",
            "failed_inferences",
            "dropped_total",
            "queue_size",
            "queue_max_size",
            "avg_inference_ms",
            "missing_frames",
            "slow_inferences",
            "backlog_alerts",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    // ============================================================
    // THROTTLE
    // ============================================================

    #[test]
    fn test_operational_counters_are_separate_from_drops() {
        let stats = RollingStats::new(10);
        stats.record_missing_frame();
        stats.record_missing_frame();
        stats.record_slow_inference();

        let snapshot = stats.snapshot(0, 10, 0);
        assert_eq!(snapshot.missing_frames, 2);
        assert_eq!(snapshot.slow_inferences, 1);
        assert_eq!(snapshot.dropped_total, 0);
    }

    #[test]
    fn test_throttle_lets_one_warning_through_per_interval() {
        let throttle = AlertThrottle::new(Duration::from_secs(60));
        let start = Instant::now();

        assert!(throttle.ready_at(start));
        assert!(!throttle.ready_at(start + Duration::from_secs(30)));
        assert!(!throttle.ready_at(start + Duration::from_secs(59)));
        assert!(throttle.ready_at(start + Duration::from_secs(60)));
        // The window restarts from the last claim.
        assert!(!throttle.ready_at(start + Duration::from_secs(100)));
    }
}
