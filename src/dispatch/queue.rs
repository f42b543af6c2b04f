//! Bounded Job Queue
//!
//! A FIFO of `FrameJob`s with a hard capacity. Producers never wait. What happens
//! to a frame offered to a full queue depends on the `QueueStrategy`: the default
//! rejects it on the spot, the others evict queued frames to make room. Every
//! frame that does not reach a worker is counted in `dropped_total`.
//!
//! Paths currently queued are tracked in a set so the same frame cannot be queued
//! twice (a scanner re-offering a frame before it has been processed).
//!
//! Workers wait on a semaphore holding one permit per pushed job, so a burst of
//! enqueues wakes as many idle workers as there are new jobs.

use super::types::{FrameJob, QueueStrategy};
use crate::error::{OrchestratorError, Result};
use crate::stats::rolling::RollingStats;
use crate::stats::throttle::{AlertThrottle, OPS_ALERT_INTERVAL};

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    Accepted,
    /// Accepted after evicting these queued jobs. Each eviction is a drop.
    Displaced(Vec<FrameJob>),
    /// The same object path is already waiting. Not counted as a drop.
    Duplicate,
}

/// Capacity, overflow behavior and backlog warning level.
#[derive(Debug, Clone, Copy)]
pub struct QueuePolicy {
    pub capacity: usize,
    pub strategy: QueueStrategy,
    /// A backlog warning is logged when the length goes above this. Zero means
    /// half the capacity.
    pub alert_threshold: usize,
}

impl QueuePolicy {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            strategy: QueueStrategy::DropNewest,
            alert_threshold: 0,
        }
    }

    fn backlog_threshold(&self) -> usize {
        if self.alert_threshold == 0 {
            self.capacity / 2
        } else {
            self.alert_threshold
        }
    }
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<FrameJob>,
    paths: HashSet<String>,
}

pub struct JobQueue {
    state: Mutex<QueueState>,
    /// One permit per pushed job. Permits can outnumber jobs after evictions or
    /// `try_pop`; `pop` tolerates that.
    available: Semaphore,
    policy: QueuePolicy,
    backlog: AlertThrottle,
    stats: Arc<RollingStats>,
}

impl JobQueue {
    pub fn new(capacity: usize, stats: Arc<RollingStats>) -> Self {
        Self::with_policy(QueuePolicy::new(capacity), stats)
    }

    pub fn with_policy(policy: QueuePolicy, stats: Arc<RollingStats>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Semaphore::new(0),
            policy,
            backlog: AlertThrottle::new(OPS_ALERT_INTERVAL),
            stats,
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Non-blocking push.
    ///
    /// Under `DropNewest` a full queue returns `Backpressure` and the job is
    /// dropped. Under `DropOldest` and `LatestOnly` the job is accepted and the
    /// evicted jobs are handed back to the caller.
    pub fn enqueue(&self, job: FrameJob) -> Result<EnqueueOutcome> {
        let capacity = self.policy.capacity;

        let (evicted, len) = {
            let mut state = self.state();

            if state.paths.contains(&job.object_path) {
                tracing::debug!("Frame {} already queued, skipping", job.object_path);
                return Ok(EnqueueOutcome::Duplicate);
            }

            let mut evicted = Vec::new();
            if state.jobs.len() >= capacity {
                match self.policy.strategy {
                    QueueStrategy::DropNewest => {
                        drop(state);
                        self.stats.record_dropped(1);
                        tracing::warn!(
                            "Job queue full ({}), dropping frame {} (task {})",
                            capacity,
                            job.object_path,
                            job.task_id
                        );
                        return Err(OrchestratorError::Backpressure { capacity });
                    }
                    QueueStrategy::DropOldest => {
                        if let Some(oldest) = state.jobs.pop_front() {
                            state.paths.remove(&oldest.object_path);
                            evicted.push(oldest);
                        }
                    }
                    QueueStrategy::LatestOnly => {
                        evicted.extend(state.jobs.drain(..));
                        state.paths.clear();
                    }
                }
            }

            state.paths.insert(job.object_path.clone());
            tracing::debug!(
                "Queued job {} for task {} ({})",
                job.job_id,
                job.task_id,
                job.task_type
            );
            state.jobs.push_back(job);
            (evicted, state.jobs.len())
        };

        self.available.add_permits(1);
        self.check_backlog(len);

        if evicted.is_empty() {
            return Ok(EnqueueOutcome::Accepted);
        }

        self.stats.record_dropped(evicted.len() as u64);
        tracing::warn!(
            "Job queue full ({}), evicted {} queued frame(s) ({:?})",
            capacity,
            evicted.len(),
            self.policy.strategy
        );
        Ok(EnqueueOutcome::Displaced(evicted))
    }

    fn check_backlog(&self, len: usize) {
        let threshold = self.policy.backlog_threshold();
        if len <= threshold || !self.backlog.ready() {
            return;
        }

        self.stats.record_backlog_alert();
        tracing::error!(
            "Inference backlog: {} queued (threshold {}, {} dropped so far); add workers or lower the frame rate",
            len,
            threshold,
            self.stats.dropped_total()
        );
    }

    pub fn try_pop(&self) -> Option<FrameJob> {
        let mut state = self.state();
        let job = state.jobs.pop_front()?;
        state.paths.remove(&job.object_path);
        Some(job)
    }

    /// Waits until a job is available.
    pub async fn pop(&self) -> FrameJob {
        loop {
            if let Some(job) = self.try_pop() {
                return job;
            }
            // The semaphore is never closed.
            if let Ok(permit) = self.available.acquire().await {
                permit.forget();
            }
        }
    }

    /// Discards every queued job. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut state = self.state();
        let cleared = state.jobs.len();
        state.jobs.clear();
        state.paths.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.state().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.policy.capacity
    }

    pub fn strategy(&self) -> QueueStrategy {
        self.policy.strategy
    }
}
