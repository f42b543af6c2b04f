use inference_orchestrator::alerts::sqlite::SqliteAlertStore;
use inference_orchestrator::alerts::store::AlertStore;
use inference_orchestrator::app::Orchestrator;
use inference_orchestrator::config::{ObjectStoreConfig, OrchestratorConfig};
use inference_orchestrator::retention::object_store::{
    FsObjectStore, MemoryObjectStore, ObjectStore, S3ObjectStore, S3Settings,
};

use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} [--config <file.json>] [--bind <addr:port>] [--workers <n>] [--db <alerts.db>]",
        program
    );
    eprintln!("Example: {} --bind 0.0.0.0:5066 --workers 8", program);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut bind: Option<SocketAddr> = None;
    let mut workers: Option<usize> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config", Some(v)) => config_path = Some(PathBuf::from(v)),
            ("--bind", Some(v)) => bind = Some(v.parse().context("invalid --bind")?),
            ("--workers", Some(v)) => workers = Some(v.parse().context("invalid --workers")?),
            ("--db", Some(v)) => db_path = Some(PathBuf::from(v)),
            ("--help" | "-h", _) => usage(&args[0]),
            (flag, None) if flag.starts_with("--") => usage(&args[0]),
            _ => {
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    let mut config = match &config_path {
        Some(path) => OrchestratorConfig::load_from(path)?,
        None => OrchestratorConfig::default(),
    };
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(workers) = workers {
        config.workers = workers;
    }
    if let Some(db_path) = db_path {
        config.alert_db_path = db_path;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();

    if let Some(path) = &config_path {
        tracing::info!("Loaded configuration from {}", path.display());
    }

    let object_store: Arc<dyn ObjectStore> = match &config.object_store {
        ObjectStoreConfig::Memory => {
            tracing::warn!("Using in-memory object store; frames do not survive a restart");
            Arc::new(MemoryObjectStore::new())
        }
        ObjectStoreConfig::Fs { root } => {
            tracing::info!("Object store rooted at {}", root.display());
            Arc::new(FsObjectStore::new(root.clone()))
        }
        ObjectStoreConfig::S3 {
            endpoint,
            region,
            access_key_id,
            secret_access_key,
            allow_http,
        } => {
            tracing::info!("Object store at {} (region {})", endpoint, region);
            Arc::new(S3ObjectStore::new(S3Settings {
                endpoint: endpoint.clone(),
                region: region.clone(),
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                allow_http: *allow_http,
            }))
        }
    };

    let alert_store: Arc<dyn AlertStore> = Arc::new(SqliteAlertStore::open(&config.alert_db_path)?);
    tracing::info!("Alert store at {}", config.alert_db_path.display());

    let bind_addr = config.bind;
    let orchestrator = Orchestrator::start(config, object_store, alert_store);
    let app = orchestrator.router();

    tracing::info!("HTTP server listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await?;

    orchestrator.shutdown().await;

    Ok(())
}
