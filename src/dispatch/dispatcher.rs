//! Worker Pool
//!
//! N workers share one `JobQueue`. Each worker drives a job through
//! `Queued -> Selecting -> Calling -> {Completed | Failed | Dropped}` and then goes
//! back to the queue. A job's failure never escapes its worker.
//!
//! A job whose frame is no longer in the bucket is dropped before a backend is
//! chosen, so it costs no call and leaves every `call_count` untouched.

use super::balancer::LoadBalancer;
use super::client::InferenceClient;
use super::queue::{EnqueueOutcome, JobQueue};
use super::types::*;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::retention::pipeline::RetentionPipeline;
use crate::stats::rolling::RollingStats;
use crate::stats::throttle::{AlertThrottle, OPS_ALERT_INTERVAL};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub workers: usize,
    /// Inferences slower than this are counted and, throttled, logged.
    pub slow_inference: Duration,
    /// Delete the frames of jobs the queue rejects or evicts.
    pub delete_dropped: bool,
}

impl DispatchPolicy {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            slow_inference: Duration::from_millis(5000),
            delete_dropped: false,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            workers: config.workers,
            slow_inference: config.slow_inference(),
            delete_dropped: config.delete_dropped,
        }
    }
}

pub struct Dispatcher {
    queue: Arc<JobQueue>,
    balancer: Arc<LoadBalancer>,
    client: Arc<InferenceClient>,
    retention: Arc<RetentionPipeline>,
    stats: Arc<RollingStats>,
    policy: DispatchPolicy,
    slow_warning: AlertThrottle,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<JobQueue>,
        balancer: Arc<LoadBalancer>,
        client: Arc<InferenceClient>,
        retention: Arc<RetentionPipeline>,
        stats: Arc<RollingStats>,
        policy: DispatchPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            balancer,
            client,
            retention,
            stats,
            policy,
            slow_warning: AlertThrottle::new(OPS_ALERT_INTERVAL),
        })
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Producer entry point. Never blocks. With `delete_dropped` set, the frames of
    /// rejected or evicted jobs are deleted in the background.
    pub fn enqueue(&self, job: FrameJob) -> Result<EnqueueOutcome> {
        let object_path = job.object_path.clone();
        let outcome = self.queue.enqueue(job);

        if self.policy.delete_dropped {
            match &outcome {
                Ok(EnqueueOutcome::Displaced(evicted)) => {
                    self.discard_frames(evicted.iter().map(|j| j.object_path.clone()).collect())
                }
                Err(OrchestratorError::Backpressure { .. }) => {
                    self.discard_frames(vec![object_path])
                }
                _ => {}
            }
        }

        outcome
    }

    fn discard_frames(&self, paths: Vec<String>) {
        let retention = self.retention.clone();
        tokio::spawn(async move {
            for path in paths {
                retention.discard(&path).await;
            }
        });
    }

    /// Spawns the workers. Each stops taking new jobs once `cancel` fires; a job
    /// already in flight runs to its terminal state.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        tracing::info!("Starting {} dispatch workers", self.policy.workers);

        (0..self.policy.workers)
            .map(|worker_id| {
                let dispatcher = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    dispatcher.worker_loop(worker_id, cancel).await;
                })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize, cancel: CancellationToken) {
        tracing::debug!("Dispatch worker {} started", worker_id);

        loop {
            let job = tokio::select! {
                _ = cancel.cancelled() => break,
                job = self.queue.pop() => job,
            };

            let outcome = self.process_job(job).await;
            tracing::trace!("Worker {} finished job: {:?}", worker_id, outcome.state());
        }

        tracing::debug!("Dispatch worker {} stopped", worker_id);
    }

    /// Runs one job to its terminal state. Every path counts `processed_total` once.
    pub async fn process_job(&self, job: FrameJob) -> JobOutcome {
        let outcome = self.run(&job).await;
        self.stats.record_processed();

        match &outcome {
            JobOutcome::Completed {
                service_id,
                success,
                detection_count,
            } => tracing::info!(
                "Job {} completed on {} (task {}, {}): success={} detections={}",
                job.job_id,
                service_id,
                job.task_id,
                job.task_type,
                success,
                detection_count
            ),
            JobOutcome::Failed { service_id, reason } => tracing::warn!(
                "Job {} failed on {} (task {}, {}): {}",
                job.job_id,
                service_id,
                job.task_id,
                job.task_type,
                reason
            ),
            JobOutcome::Dropped { reason } => tracing::warn!(
                "Job {} dropped (task {}, {}): {}",
                job.job_id,
                job.task_id,
                job.task_type,
                reason
            ),
        }

        outcome
    }

    async fn run(&self, job: &FrameJob) -> JobOutcome {
        match self.retention.frame_present(&job.object_path).await {
            Ok(true) => {}
            Ok(false) => {
                self.stats.record_missing_frame();
                return JobOutcome::Dropped {
                    reason: format!("frame {} is not in the object store", job.object_path),
                };
            }
            Err(e) => {
                self.stats.record_missing_frame();
                return JobOutcome::Dropped {
                    reason: format!("could not check frame {}: {:#}", job.object_path, e),
                };
            }
        }

        tracing::debug!("Job {} -> {:?}", job.job_id, JobState::Selecting);

        let service = match self.balancer.acquire(&job.task_type) {
            Ok(service) => service,
            Err(e) => {
                self.stats.record_dropped(1);
                return JobOutcome::Dropped {
                    reason: e.to_string(),
                };
            }
        };

        tracing::debug!(
            "Job {} -> {:?} {} at {}",
            job.job_id,
            JobState::Calling,
            service.service_id,
            service.endpoint
        );

        let registry = self.balancer.registry();
        let result = match self.client.infer(&service.endpoint, job).await {
            Ok(result) => result,
            Err(e) => {
                self.stats.record_failed_inference();
                registry.record_outcome(&service.service_id, false, 0);
                return JobOutcome::Failed {
                    service_id: service.service_id.0,
                    reason: e.to_string(),
                };
            }
        };

        self.stats
            .record_inference(result.inference_time_ms, result.success);
        self.check_slow_inference(job, &service.service_id.0, result.inference_time_ms);
        registry.record_outcome(
            &service.service_id,
            result.success,
            result.inference_time_ms,
        );

        if !result.success {
            tracing::warn!(
                "Backend {} answered unsuccessfully for {}: {}",
                service.service_id,
                job.object_path,
                result.error.as_deref().unwrap_or("no error given")
            );
        }

        self.retention.resolve(job, &result, &service).await;

        JobOutcome::Completed {
            service_id: service.service_id.0,
            success: result.success,
            detection_count: result.total_count,
        }
    }

    fn check_slow_inference(&self, job: &FrameJob, service_id: &str, inference_time_ms: u64) {
        let threshold = self.policy.slow_inference.as_millis() as u64;
        if inference_time_ms <= threshold {
            return;
        }

        self.stats.record_slow_inference();
        if self.slow_warning.ready() {
            tracing::warn!(
                "Slow inference on {}: {}ms for task {} ({}), threshold {}ms",
                service_id,
                inference_time_ms,
                job.task_id,
                job.task_type,
                threshold
            );
        }
    }
}
