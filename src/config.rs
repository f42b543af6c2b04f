//! Orchestrator Configuration
//!
//! All tunables live in `OrchestratorConfig`. Values come from compiled defaults,
//! optionally overlaid by a JSON file, then by command line flags in `main.rs`.
//! `validate` must pass before the orchestrator is started.

use crate::dispatch::types::QueueStrategy;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {key} = '{value}' - {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Where frames live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// Process-local map. Useful for demos and tests.
    Memory,
    /// Objects are files under `<root>/<bucket>/<path>`.
    Fs { root: PathBuf },
    /// An S3-compatible endpoint (MinIO), path-style addressing.
    S3 {
        endpoint: String,
        #[serde(default = "default_region")]
        region: String,
        /// Read from `AWS_ACCESS_KEY_ID` when unset.
        #[serde(default)]
        access_key_id: Option<String>,
        #[serde(default)]
        secret_access_key: Option<String>,
        #[serde(default = "default_allow_http")]
        allow_http: bool,
    },
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_allow_http() -> bool {
    true
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        ObjectStoreConfig::S3 {
            endpoint: "http://127.0.0.1:9000".to_string(),
            region: default_region(),
            access_key_id: None,
            secret_access_key: None,
            allow_http: default_allow_http(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub bind: SocketAddr,
    pub workers: usize,
    pub queue_max_size: usize,
    pub queue_strategy: QueueStrategy,
    /// Backlog warning level. Zero means half of `queue_max_size`.
    pub queue_alert_threshold: usize,
    /// Delete the frames of jobs the queue rejects or evicts.
    pub delete_dropped: bool,
    pub inference_timeout_ms: u64,
    pub slow_inference_ms: u64,
    pub stale_threshold_secs: u64,
    pub eviction_threshold_secs: u64,
    pub sweep_interval_secs: u64,
    pub latency_window: usize,
    pub batch_size: usize,
    pub batch_interval_secs: u64,
    pub batch_retry_delay_ms: u64,
    pub max_buffered_alerts: usize,
    /// Never delete zero-detection frames.
    pub keep_all: bool,
    pub bucket: String,
    pub object_base_url: String,
    /// When set, retained frames are moved under this prefix.
    pub alert_base_path: Option<String>,
    pub object_store: ObjectStoreConfig,
    pub alert_db_path: PathBuf,
    pub log_level: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5066)),
            workers: 4,
            queue_max_size: 100,
            queue_strategy: QueueStrategy::DropNewest,
            queue_alert_threshold: 0,
            delete_dropped: false,
            inference_timeout_ms: 30_000,
            slow_inference_ms: 5_000,
            stale_threshold_secs: 90,
            eviction_threshold_secs: 300,
            sweep_interval_secs: 30,
            latency_window: 100,
            batch_size: 100,
            batch_interval_secs: 2,
            batch_retry_delay_ms: 200,
            max_buffered_alerts: 10_000,
            keep_all: false,
            bucket: "images".to_string(),
            object_base_url: "http://127.0.0.1:9000".to_string(),
            alert_base_path: None,
            object_store: ObjectStoreConfig::default(),
            alert_db_path: PathBuf::from("alerts.db"),
            log_level: "info".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Loads configuration from a JSON file. Missing fields keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive: [(&'static str, u64); 9] = [
            ("workers", self.workers as u64),
            ("queue_max_size", self.queue_max_size as u64),
            ("inference_timeout_ms", self.inference_timeout_ms),
            ("stale_threshold_secs", self.stale_threshold_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("latency_window", self.latency_window as u64),
            ("batch_size", self.batch_size as u64),
            ("batch_interval_secs", self.batch_interval_secs),
            ("max_buffered_alerts", self.max_buffered_alerts as u64),
        ];

        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: value.to_string(),
                    reason: "must be greater than zero",
                });
            }
        }

        if self.eviction_threshold_secs <= self.stale_threshold_secs {
            return Err(ConfigError::InvalidValue {
                key: "eviction_threshold_secs",
                value: self.eviction_threshold_secs.to_string(),
                reason: "must be larger than stale_threshold_secs",
            });
        }

        if self.batch_size > self.max_buffered_alerts {
            return Err(ConfigError::InvalidValue {
                key: "batch_size",
                value: self.batch_size.to_string(),
                reason: "must not exceed max_buffered_alerts",
            });
        }

        if self.queue_alert_threshold > self.queue_max_size {
            return Err(ConfigError::InvalidValue {
                key: "queue_alert_threshold",
                value: self.queue_alert_threshold.to_string(),
                reason: "must not exceed queue_max_size",
            });
        }

        if self.bucket.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "bucket",
                value: String::new(),
                reason: "must not be empty",
            });
        }

        Ok(())
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn slow_inference(&self) -> Duration {
        Duration::from_millis(self.slow_inference_ms)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    pub fn eviction_threshold(&self) -> Duration {
        Duration::from_secs(self.eviction_threshold_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_secs)
    }

    pub fn batch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.batch_retry_delay_ms)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.batch_interval(), Duration::from_secs(2));
        assert_eq!(config.queue_strategy, QueueStrategy::DropNewest);
        assert!(matches!(config.object_store, ObjectStoreConfig::S3 { .. }));
    }

    #[test]
    fn test_s3_store_and_queue_strategy_from_json() {
        let config: OrchestratorConfig = serde_json::from_str(
            r#"{
                "queue_strategy": "latest_only",
                "delete_dropped": true,
                "object_store": {"kind": "s3", "endpoint": "http://minio:9000", "access_key_id": "minio"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.queue_strategy, QueueStrategy::LatestOnly);
        assert!(config.delete_dropped);
        assert_eq!(
            config.object_store,
            ObjectStoreConfig::S3 {
                endpoint: "http://minio:9000".to_string(),
                region: "us-east-1".to_string(),
                access_key_id: Some("minio".to_string()),
                secret_access_key: None,
                allow_http: true,
            }
        );
    }

    #[test]
    fn test_batch_larger_than_buffer_rejected() {
        let config = OrchestratorConfig {
            batch_size: 500,
            max_buffered_alerts: 200,
            ..OrchestratorConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key: "batch_size", .. })
        ));

        let equal = OrchestratorConfig {
            batch_size: 200,
            max_buffered_alerts: 200,
            ..OrchestratorConfig::default()
        };
        assert!(equal.validate().is_ok());
    }

    #[test]
    fn test_backlog_threshold_above_capacity_rejected() {
        let config = OrchestratorConfig {
            queue_max_size: 10,
            queue_alert_threshold: 11,
            ..OrchestratorConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue_alert_threshold"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orchestrator.json");
        std::fs::write(
            &path,
            r#"{"workers": 8, "object_store": {"kind": "fs", "root": "/data/minio"}}"#,
        )
        .unwrap();

        let config = OrchestratorConfig::load_from(&path).unwrap();

        assert_eq!(config.workers, 8);
        assert_eq!(config.queue_max_size, 100);
        assert_eq!(
            config.object_store,
            ObjectStoreConfig::Fs {
                root: PathBuf::from("/data/minio")
            }
        );
    }

    #[test]
    fn test_eviction_must_exceed_stale_threshold() {
        let config = OrchestratorConfig {
            stale_threshold_secs: 90,
            eviction_threshold_secs: 60,
            ..OrchestratorConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("eviction_threshold_secs"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = OrchestratorConfig {
            workers: 0,
            ..OrchestratorConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key: "workers", .. })
        ));
    }

    #[test]
    fn test_unparseable_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = OrchestratorConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
