use super::types::*;
use crate::now_ms;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-size ring of the last K latencies.
struct LatencyWindow {
    samples: VecDeque<u64>,
    capacity: usize,
    sum: u64,
}

impl LatencyWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            sum: 0,
        }
    }

    fn push(&mut self, latency_ms: u64) {
        if self.samples.len() == self.capacity
            && let Some(evicted) = self.samples.pop_front()
        {
            self.sum -= evicted;
        }
        self.samples.push_back(latency_ms);
        self.sum += latency_ms;
    }

    fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum as f64 / self.samples.len() as f64
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0;
    }
}

/// Process-wide counters. Shared as `Arc<RollingStats>` by every component.
pub struct RollingStats {
    processed_total: AtomicU64,
    total_inferences: AtomicU64,
    failed_inferences: AtomicU64,
    unsuccessful_responses: AtomicU64,
    dropped_total: AtomicU64,
    objects_deleted: AtomicU64,
    delete_failures: AtomicU64,
    consistency_warnings: AtomicU64,
    alerts_persisted: AtomicU64,
    dropped_alerts: AtomicU64,
    dropped_batches: AtomicU64,
    missing_frames: AtomicU64,
    slow_inferences: AtomicU64,
    backlog_alerts: AtomicU64,
    latencies: Mutex<LatencyWindow>,
}

impl RollingStats {
    pub fn new(latency_window: usize) -> Self {
        Self {
            processed_total: AtomicU64::new(0),
            total_inferences: AtomicU64::new(0),
            failed_inferences: AtomicU64::new(0),
            unsuccessful_responses: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            objects_deleted: AtomicU64::new(0),
            delete_failures: AtomicU64::new(0),
            consistency_warnings: AtomicU64::new(0),
            alerts_persisted: AtomicU64::new(0),
            dropped_alerts: AtomicU64::new(0),
            dropped_batches: AtomicU64::new(0),
            missing_frames: AtomicU64::new(0),
            slow_inferences: AtomicU64::new(0),
            backlog_alerts: AtomicU64::new(0),
            latencies: Mutex::new(LatencyWindow::new(latency_window)),
        }
    }

    fn window(&self) -> MutexGuard<'_, LatencyWindow> {
        self.latencies.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every terminal job transition calls this exactly once.
    pub fn record_processed(&self) {
        self.processed_total.fetch_add(1, Ordering::Relaxed);
    }

    /// A well-formed backend response. Feeds the latency window.
    pub fn record_inference(&self, latency_ms: u64, success: bool) {
        self.total_inferences.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.unsuccessful_responses.fetch_add(1, Ordering::Relaxed);
        }
        self.window().push(latency_ms);
    }

    /// Transport failure or timeout.
    pub fn record_failed_inference(&self) {
        self.failed_inferences.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_object_deleted(&self) {
        self.objects_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete_failure(&self) {
        self.delete_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_consistency_warning(&self) {
        self.consistency_warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alerts_persisted(&self, count: u64) {
        self.alerts_persisted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_dropped_alerts(&self, count: u64) {
        self.dropped_alerts.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_dropped_batch(&self) {
        self.dropped_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// A queued frame was gone from the object store before inference.
    pub fn record_missing_frame(&self) {
        self.missing_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_slow_inference(&self) {
        self.slow_inferences.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backlog_alert(&self) {
        self.backlog_alerts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed_total(&self) -> u64 {
        self.processed_total.load(Ordering::Relaxed)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    pub fn consistency_warnings(&self) -> u64 {
        self.consistency_warnings.load(Ordering::Relaxed)
    }

    pub fn avg_inference_ms(&self) -> f64 {
        self.window().average()
    }

    /// Builds the served view. Live gauges are supplied by the caller.
    pub fn snapshot(
        &self,
        queue_size: usize,
        queue_max_size: usize,
        alerts_buffered: usize,
    ) -> InferenceStats {
        let processed_total = self.processed_total.load(Ordering::Relaxed);
        let dropped_total = self.dropped_total.load(Ordering::Relaxed);
        let avg_inference_ms = self.avg_inference_ms();

        let drop_rate = if processed_total + dropped_total == 0 {
            0.0
        } else {
            dropped_total as f64 / (processed_total + dropped_total) as f64
        };

        InferenceStats {
            processed_total,
            total_inferences: self.total_inferences.load(Ordering::Relaxed),
            failed_inferences: self.failed_inferences.load(Ordering::Relaxed),
            unsuccessful_responses: self.unsuccessful_responses.load(Ordering::Relaxed),
            dropped_total,
            queue_size,
            queue_max_size,
            avg_inference_ms,
            objects_deleted: self.objects_deleted.load(Ordering::Relaxed),
            delete_failures: self.delete_failures.load(Ordering::Relaxed),
            consistency_warnings: self.consistency_warnings.load(Ordering::Relaxed),
            alerts_buffered,
            alerts_persisted: self.alerts_persisted.load(Ordering::Relaxed),
            dropped_alerts: self.dropped_alerts.load(Ordering::Relaxed),
            dropped_batches: self.dropped_batches.load(Ordering::Relaxed),
            missing_frames: self.missing_frames.load(Ordering::Relaxed),
            slow_inferences: self.slow_inferences.load(Ordering::Relaxed),
            backlog_alerts: self.backlog_alerts.load(Ordering::Relaxed),
            drop_rate,
            healthy: drop_rate <= UNHEALTHY_DROP_RATE
                && avg_inference_ms <= UNHEALTHY_AVG_INFERENCE_MS,
            updated_at: now_ms(),
        }
    }

    /// Zeroes every counter and the latency window.
    pub fn reset(&self) {
        for counter in [
            &self.processed_total,
            &self.total_inferences,
            &self.failed_inferences,
            &self.unsuccessful_responses,
            &self.dropped_total,
            &self.objects_deleted,
            &self.delete_failures,
            &self.consistency_warnings,
            &self.alerts_persisted,
            &self.dropped_alerts,
            &self.dropped_batches,
            &self.missing_frames,
            &self.slow_inferences,
            &self.backlog_alerts,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.window().clear();

        tracing::info!("Inference statistics reset");
    }
}
