//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use mtk_media::{check_ffmpeg, FfmpegRunner};
use mtk_queue::{build_status_store, store_sink, QueueConfig, StatusStoreConfig, TaskQueue};
use mtk_storage::{DriveClient, S3Client, StorageAdapters};
use mtk_worker::{AssemblyPipeline, JobExecutor, JobRunner, ToolkitDispatcher, WorkerConfig};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mtk_api::state::StorageStatus;
use mtk_api::{create_router, metrics, ApiConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    init_tracing()?;
    info!("Starting mtk-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);
    if config.api_key.is_none() {
        if config.is_production() {
            anyhow::bail!("API_KEY must be set when ENVIRONMENT=production");
        }
        warn!("API_KEY is not set; authenticated routes will answer 500");
    }

    let worker_config = WorkerConfig::from_env();
    match check_ffmpeg(&worker_config.ffmpeg_path) {
        Ok(path) => info!("Using FFmpeg at {}", path.display()),
        Err(e) => warn!("{}; compose jobs will fail until it is installed", e),
    }

    let storage = build_storage().await;
    let storage_status = StorageStatus {
        object: storage.has_object(),
        drive: storage.has_drive(),
    };

    let store = build_status_store(&StatusStoreConfig::from_env())
        .context("Failed to create job status store")?;
    let queue = Arc::new(TaskQueue::new(QueueConfig::from_env()));
    info!(queue_id = %queue.id(), limit = ?queue.limit(), "Task queue ready");

    let pipeline = AssemblyPipeline::new(
        storage,
        Arc::new(FfmpegRunner::new(worker_config.ffmpeg_path.clone())),
        worker_config.work_dir.clone(),
    );
    let dispatcher = Arc::new(ToolkitDispatcher::new(pipeline, worker_config.default_bucket.clone()));

    let sink = store_sink(store.clone());

    let executor = Arc::new(JobExecutor::new(queue.clone(), sink.clone(), dispatcher.clone()));
    let worker_alive = executor.liveness();
    let worker = Arc::clone(&executor).spawn();

    let runner = JobRunner::new(queue, sink, dispatcher);
    let state = AppState::new(config.clone(), runner, store, worker_alive, storage_status);

    // Initialize metrics
    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    executor.shutdown();
    if let Err(e) = worker.await {
        warn!("Worker task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("mtk=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Build the storage adapters that have credentials configured.
async fn build_storage() -> StorageAdapters {
    let mut adapters = StorageAdapters::default();

    match S3Client::from_env().await {
        Ok(Some(client)) => {
            info!("S3 client configured");
            adapters = adapters.with_object(Arc::new(client));
        }
        Ok(None) => warn!("S3 credentials not set; S3 transfers are disabled"),
        Err(e) => warn!("Failed to configure S3 client: {}", e),
    }

    match DriveClient::from_env() {
        Ok(Some(client)) => {
            info!("Google Drive client configured");
            adapters = adapters.with_drive(Arc::new(client));
        }
        Ok(None) => warn!("GCP_SA_CREDENTIALS not set; Google Drive transfers are disabled"),
        Err(e) => warn!("Failed to configure Google Drive client: {}", e),
    }

    adapters
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
