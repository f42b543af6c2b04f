use super::object_store::{ObjectStat, ObjectStore};
use super::path::{ConsistencyWarning, FramePath};
use crate::alerts::types::AlertRecord;
use crate::alerts::writer::BatchWriter;
use crate::config::OrchestratorConfig;
use crate::dispatch::types::{FrameJob, InferenceResult};
use crate::now_ms;
use crate::registry::types::ServiceDescriptor;
use crate::stats::rolling::RollingStats;

use anyhow::Result;
use std::sync::Arc;

/// Whether the task wants the frame kept next to its alert. Read from
/// `save_alert_image` at the top level of the task config or under
/// `algorithm_params`; absent or unreadable means yes.
pub fn wants_alert_image(algo_config: &serde_json::Value) -> bool {
    let flag = algo_config.get("save_alert_image").or_else(|| {
        algo_config
            .get("algorithm_params")
            .and_then(|params| params.get("save_alert_image"))
    });

    match flag {
        Some(serde_json::Value::Bool(keep)) => *keep,
        Some(serde_json::Value::String(s)) => {
            !matches!(s.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off")
        }
        Some(serde_json::Value::Number(n)) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

/// What `resolve` did with the frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Retention {
    Deleted,
    /// Best effort: the frame stays behind and ages out.
    DeleteFailed,
    /// Nothing detected but `keep_all` is set.
    KeptWithoutAlert,
    Alerted {
        image_path: String,
        warning: Option<ConsistencyWarning>,
    },
    /// A detection that could not become an alert.
    Rejected { reason: String },
}

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub keep_all: bool,
    pub bucket: String,
    pub alert_base_path: Option<String>,
}

impl RetentionPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            keep_all: config.keep_all,
            bucket: config.bucket.clone(),
            alert_base_path: config
                .alert_base_path
                .as_deref()
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
        }
    }
}

pub struct RetentionPipeline {
    store: Arc<dyn ObjectStore>,
    writer: Arc<BatchWriter>,
    stats: Arc<RollingStats>,
    policy: RetentionPolicy,
}

impl RetentionPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        writer: Arc<BatchWriter>,
        stats: Arc<RollingStats>,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            store,
            writer,
            stats,
            policy,
        }
    }

    /// Whether the frame is still in the bucket. Checked before a backend is
    /// chosen so a vanished frame costs no inference call.
    pub async fn frame_present(&self, object_path: &str) -> Result<bool> {
        let stat = self.store.stat(&self.policy.bucket, object_path).await?;
        Ok(matches!(stat, ObjectStat::Exists { .. }))
    }

    /// Removes a frame that will never be processed (evicted or rejected at
    /// enqueue time).
    pub async fn discard(&self, object_path: &str) -> Retention {
        self.delete_frame(object_path).await
    }

    pub async fn resolve(
        &self,
        job: &FrameJob,
        result: &InferenceResult,
        service: &ServiceDescriptor,
    ) -> Retention {
        if !result.success || result.total_count == 0 {
            if self.policy.keep_all {
                tracing::debug!("keep_all set, keeping {}", job.object_path);
                return Retention::KeptWithoutAlert;
            }
            return self.delete_frame(&job.object_path).await;
        }

        let frame = match FramePath::parse(&job.object_path) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    "Detection for task {} not persisted: {}",
                    job.task_id,
                    e
                );
                return Retention::Rejected {
                    reason: e.to_string(),
                };
            }
        };

        let warning = ConsistencyWarning::check(&job.object_path, &job.task_id, &frame.task_id);
        if let Some(warning) = &warning {
            tracing::warn!("{}", warning);
            self.stats.record_consistency_warning();
        }

        let image_path = if !wants_alert_image(&job.algo_config) {
            tracing::debug!(
                "Task {} does not keep alert images, dropping {}",
                job.task_id,
                job.object_path
            );
            self.delete_frame(&job.object_path).await;
            String::new()
        } else {
            match &self.policy.alert_base_path {
                Some(base) => self.move_frame(&frame, base).await,
                None => job.object_path.clone(),
            }
        };

        let record = AlertRecord {
            id: None,
            task_id: frame.task_id.clone(),
            task_type: job.task_type.clone(),
            image_path: image_path.clone(),
            detection_count: result.total_count,
            created_at: now_ms(),
            algorithm_id: service.service_id.0.clone(),
            algorithm_name: service.name.clone(),
            confidence: result.confidence,
            inference_time_ms: result.inference_time_ms,
            result: result.result.clone(),
        };

        match self.writer.append(record) {
            Ok(()) => Retention::Alerted {
                image_path,
                warning,
            },
            Err(e) => Retention::Rejected {
                reason: e.to_string(),
            },
        }
    }

    async fn delete_frame(&self, object_path: &str) -> Retention {
        match self.store.delete(&self.policy.bucket, object_path).await {
            Ok(()) => {
                self.stats.record_object_deleted();
                tracing::debug!("Deleted frame {}", object_path);
                Retention::Deleted
            }
            Err(e) => {
                self.stats.record_delete_failure();
                tracing::warn!("Failed to delete frame {}: {:#}", object_path, e);
                Retention::DeleteFailed
            }
        }
    }

    /// Copies the frame under `base` and removes the original. Falls back to the
    /// original path if the copy fails.
    async fn move_frame(&self, frame: &FramePath, base: &str) -> String {
        let source = frame.to_string();
        let target = frame.rebase(base).to_string();
        if source == target {
            return source;
        }

        let bucket = &self.policy.bucket;
        if let Err(e) = self.store.copy(bucket, &source, &target).await {
            tracing::warn!("Could not move {} to {}: {:#}", source, target, e);
            return source;
        }

        if let Err(e) = self.store.delete(bucket, &source).await {
            tracing::warn!("Moved {} but could not remove the original: {:#}", source, e);
        }
        tracing::debug!("Moved {} to {}", source, target);
        target
    }
}
