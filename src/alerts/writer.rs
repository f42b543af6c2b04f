use super::store::AlertStore;
use super::types::AlertRecord;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::retention::path::{ConsistencyWarning, task_id_from_path};
use crate::stats::rolling::RollingStats;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Flush triggers and limits.
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub interval: Duration,
    pub retry_delay: Duration,
    pub max_buffered: usize,
}

impl BatchPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            interval: config.batch_interval(),
            retry_delay: config.batch_retry_delay(),
            max_buffered: config.max_buffered_alerts,
        }
    }
}

pub struct BatchWriter {
    buffer: Mutex<Vec<AlertRecord>>,
    store: Arc<dyn AlertStore>,
    stats: Arc<RollingStats>,
    policy: BatchPolicy,
    wake: Notify,
    /// Held for the whole of a flush so batches reach the store in cut order.
    flush_lock: tokio::sync::Mutex<()>,
}

impl BatchWriter {
    pub fn new(
        store: Arc<dyn AlertStore>,
        stats: Arc<RollingStats>,
        policy: BatchPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            buffer: Mutex::new(Vec::with_capacity(policy.batch_size)),
            store,
            stats,
            policy,
            wake: Notify::new(),
            flush_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<AlertRecord>> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn store(&self) -> &Arc<dyn AlertStore> {
        &self.store
    }

    pub fn buffered(&self) -> usize {
        self.buffer().len()
    }

    /// Buffers one record. Never waits on the store.
    ///
    /// Past `max_buffered` the record is dropped and counted, which is how a store
    /// outage eventually surfaces in the stats.
    pub fn append(&self, record: AlertRecord) -> Result<()> {
        let len = {
            let mut buffer = self.buffer();
            if buffer.len() >= self.policy.max_buffered {
                drop(buffer);
                self.stats.record_dropped_alerts(1);
                tracing::warn!(
                    "Alert buffer full ({}), dropping alert for {}",
                    self.policy.max_buffered,
                    record.image_path
                );
                return Err(OrchestratorError::Backpressure {
                    capacity: self.policy.max_buffered,
                });
            }
            buffer.push(record);
            buffer.len()
        };

        if len >= self.policy.batch_size {
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Swaps out the buffer and writes it in batches of at most `batch_size`.
    /// Returns the number of records persisted.
    pub async fn flush(&self) -> usize {
        let _flushing = self.flush_lock.lock().await;

        let drained = std::mem::take(&mut *self.buffer());
        if drained.is_empty() {
            return 0;
        }

        let mut persisted = 0;
        for chunk in drained.chunks(self.policy.batch_size.max(1)) {
            persisted += self.write_batch(chunk.to_vec()).await;
        }
        persisted
    }

    async fn write_batch(&self, batch: Vec<AlertRecord>) -> usize {
        let batch = self.enforce_path_identity(batch);
        if batch.is_empty() {
            return 0;
        }
        let count = batch.len();

        let first_err = match self.store.insert_batch(&batch).await {
            Ok(_) => return self.persisted(count),
            Err(e) => e,
        };

        tracing::warn!(
            "Alert batch of {} rejected, retrying once: {:#}",
            count,
            first_err
        );
        let jitter = rand::random::<u64>() % 50;
        tokio::time::sleep(self.policy.retry_delay + Duration::from_millis(jitter)).await;

        match self.store.insert_batch(&batch).await {
            Ok(_) => self.persisted(count),
            Err(e) => {
                let err = OrchestratorError::BatchFlush {
                    count,
                    message: format!("{:#}", e),
                };
                let contents = serde_json::to_string(&batch).unwrap_or_default();
                tracing::error!("{}; batch contents: {}", err, contents);

                self.stats.record_dropped_batch();
                self.stats.record_dropped_alerts(count as u64);
                0
            }
        }
    }

    fn persisted(&self, count: usize) -> usize {
        self.stats.record_alerts_persisted(count as u64);
        tracing::debug!("Persisted alert batch of {}", count);
        count
    }

    /// Re-derives each `task_id` from `image_path`. Mismatches are corrected and
    /// counted; records with an undecodable path are dropped.
    fn enforce_path_identity(&self, batch: Vec<AlertRecord>) -> Vec<AlertRecord> {
        batch
            .into_iter()
            .filter_map(|mut record| {
                // Alerts without a kept image carry no path to check against.
                if record.image_path.is_empty() {
                    return Some(record);
                }
                match task_id_from_path(&record.image_path) {
                    Ok(path_task_id) => {
                        if let Some(warning) =
                            ConsistencyWarning::check(&record.image_path, &record.task_id, &path_task_id)
                        {
                            tracing::warn!("{} (corrected before flush)", warning);
                            self.stats.record_consistency_warning();
                            record.task_id = path_task_id;
                        }
                        Some(record)
                    }
                    Err(e) => {
                        tracing::error!("Dropping alert for task {}: {}", record.task_id, e);
                        self.stats.record_dropped_alerts(1);
                        None
                    }
                }
            })
            .collect()
    }

    /// Spawns the flusher. On cancellation it drains the buffer once more and exits.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut last_flush = Instant::now();

            loop {
                let deadline = last_flush + self.policy.interval;

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.wake.notified() => {
                        // A stale wake-up from an earlier append.
                        if self.buffered() < self.policy.batch_size {
                            continue;
                        }
                    }
                    _ = tokio::time::sleep_until(deadline) => {}
                }

                self.flush().await;
                last_flush = Instant::now();
            }

            let drained = self.flush().await;
            tracing::info!("Alert writer stopped, final flush persisted {}", drained);
        })
    }
}
