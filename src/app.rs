//! Orchestrator Lifecycle
//!
//! Owns every component, wires them together and exposes the HTTP surface.
//! `start` spawns the dispatch workers, the registry sweep and the alert flusher;
//! `shutdown` stops intake, lets in-flight jobs finish and drains the alert buffer.

use crate::alerts::handlers::*;
use crate::alerts::protocol::*;
use crate::alerts::store::AlertStore;
use crate::alerts::writer::{BatchPolicy, BatchWriter};
use crate::config::OrchestratorConfig;
use crate::dispatch::balancer::LoadBalancer;
use crate::dispatch::client::InferenceClient;
use crate::dispatch::dispatcher::{DispatchPolicy, Dispatcher};
use crate::dispatch::handlers::*;
use crate::dispatch::protocol::*;
use crate::dispatch::queue::{JobQueue, QueuePolicy};
use crate::registry::handlers::*;
use crate::registry::protocol::*;
use crate::registry::service::ServiceRegistry;
use crate::retention::object_store::ObjectStore;
use crate::retention::pipeline::{RetentionPipeline, RetentionPolicy};
use crate::stats::handlers::*;
use crate::stats::rolling::RollingStats;

use axum::{
    Extension, Router,
    routing::{delete, get, post},
};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const API_PREFIX_AI_ANALYSIS: &str = "/api/v1/ai_analysis";
pub const API_PREFIX_ALERTS: &str = "/api/v1";

pub struct Orchestrator {
    pub config: OrchestratorConfig,
    pub registry: Arc<ServiceRegistry>,
    pub stats: Arc<RollingStats>,
    pub queue: Arc<JobQueue>,
    pub balancer: Arc<LoadBalancer>,
    pub dispatcher: Arc<Dispatcher>,
    pub writer: Arc<BatchWriter>,
    pub alert_store: Arc<dyn AlertStore>,
    pub object_store: Arc<dyn ObjectStore>,
    /// Stops the workers and the sweep.
    intake: CancellationToken,
    /// Stops the flusher, after the workers are gone.
    flusher: CancellationToken,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    flusher_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Builds every component and spawns the background tasks.
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: OrchestratorConfig,
        object_store: Arc<dyn ObjectStore>,
        alert_store: Arc<dyn AlertStore>,
    ) -> Arc<Self> {
        let stats = Arc::new(RollingStats::new(config.latency_window));
        let registry = ServiceRegistry::new(config.stale_threshold(), config.eviction_threshold());
        let queue = Arc::new(JobQueue::with_policy(
            QueuePolicy {
                capacity: config.queue_max_size,
                strategy: config.queue_strategy,
                alert_threshold: config.queue_alert_threshold,
            },
            stats.clone(),
        ));
        let balancer = Arc::new(LoadBalancer::new(registry.clone()));
        let client = Arc::new(InferenceClient::new(
            config.inference_timeout(),
            &config.object_base_url,
            &config.bucket,
        ));

        let writer = BatchWriter::new(
            alert_store.clone(),
            stats.clone(),
            BatchPolicy::from_config(&config),
        );
        let retention = Arc::new(RetentionPipeline::new(
            object_store.clone(),
            writer.clone(),
            stats.clone(),
            RetentionPolicy::from_config(&config),
        ));

        let dispatcher = Dispatcher::new(
            queue.clone(),
            balancer.clone(),
            client,
            retention,
            stats.clone(),
            DispatchPolicy::from_config(&config),
        );

        let intake = CancellationToken::new();
        let flusher = CancellationToken::new();

        let mut worker_handles = dispatcher.clone().start(intake.clone());
        worker_handles.push(
            registry
                .clone()
                .start_sweep(config.sweep_interval(), intake.clone()),
        );
        let flusher_handle = writer.clone().start(flusher.clone());

        tracing::info!(
            "Orchestrator started: {} workers, queue {} ({:?}), batch {} / {:?}",
            config.workers,
            config.queue_max_size,
            queue.strategy(),
            config.batch_size,
            config.batch_interval()
        );

        Arc::new(Self {
            config,
            registry,
            stats,
            queue,
            balancer,
            dispatcher,
            writer,
            alert_store,
            object_store,
            intake,
            flusher,
            worker_handles: Mutex::new(worker_handles),
            flusher_handle: Mutex::new(Some(flusher_handle)),
        })
    }

    pub fn router(&self) -> Router {
        let ai_analysis = Router::new()
            .route(ENDPOINT_REGISTER, post(handle_register))
            .route(ENDPOINT_HEARTBEAT, post(handle_heartbeat))
            .route(ENDPOINT_UNREGISTER, delete(handle_unregister))
            .route(ENDPOINT_CLEAR_ALL, post(handle_clear_all))
            .route(ENDPOINT_SERVICES, get(handle_list_services))
            .route(ENDPOINT_SERVICE_STATS, get(handle_service_stats))
            .route(
                ENDPOINT_LOAD_BALANCE_ANALYSIS,
                get(handle_load_balance_analysis),
            )
            .route(ENDPOINT_INFERENCE_STATS, get(handle_inference_stats))
            .route(
                ENDPOINT_INFERENCE_STATS_RESET,
                post(handle_reset_inference_stats),
            )
            .route(ENDPOINT_FRAMES, post(handle_enqueue_frame))
            .route(ENDPOINT_QUEUE_RESET, post(handle_queue_reset));

        let alerts = Router::new()
            .route(ENDPOINT_ALERTS, get(handle_list_alerts))
            .route(ENDPOINT_ALERT_TASK_IDS, get(handle_alert_task_ids))
            .route(ENDPOINT_ALERT_BATCH_DELETE, post(handle_batch_delete_alerts))
            .route(
                ENDPOINT_ALERT_BY_ID,
                get(handle_get_alert).delete(handle_delete_alert),
            );

        Router::new()
            .nest(API_PREFIX_AI_ANALYSIS, ai_analysis)
            .nest(API_PREFIX_ALERTS, alerts)
            .layer(Extension(self.registry.clone()))
            .layer(Extension(self.stats.clone()))
            .layer(Extension(self.queue.clone()))
            .layer(Extension(self.balancer.clone()))
            .layer(Extension(self.dispatcher.clone()))
            .layer(Extension(self.writer.clone()))
            .layer(Extension(self.alert_store.clone()))
    }

    /// Stops intake, waits for in-flight jobs, then drains the alert buffer.
    pub async fn shutdown(&self) {
        tracing::info!("Orchestrator shutting down");
        self.intake.cancel();

        let workers: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self
                .worker_handles
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!("Background task ended abnormally: {}", e);
            }
        }

        self.flusher.cancel();
        let flusher = self
            .flusher_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = flusher
            && let Err(e) = handle.await
        {
            tracing::error!("Alert flusher ended abnormally: {}", e);
        }

        tracing::info!(
            "Orchestrator stopped: processed={} dropped={} queued={}",
            self.stats.processed_total(),
            self.stats.dropped_total(),
            self.queue.len()
        );
    }
}
