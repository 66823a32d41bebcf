//! Frame extraction worker binary.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use framex_firestore::{FirestoreClient, VideoJobRepository};
use framex_moderation::ModerationClient;
use framex_queue::JobQueue;
use framex_storage::S3Client;
use framex_worker::{
    CallbackNotifier, FfmpegExtractor, FrameProcessor, JobExecutor, PackagerClient, WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("framex=info".parse().unwrap());

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

    info!("Starting framex-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Prometheus metrics (scrape endpoint on the worker)
    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    if metrics_enabled {
        let port: u16 = std::env::var("WORKER_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9090);
        if let Err(e) = PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
        {
            error!("Failed to install metrics exporter: {}", e);
        } else {
            info!("Prometheus metrics on :{}/metrics", port);
        }
    }

    // Wire gateways explicitly; no global registry
    let storage = match S3Client::from_env().await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    let firestore = match FirestoreClient::from_env().await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create job store client: {}", e);
            std::process::exit(1);
        }
    };

    let moderation = match ModerationClient::from_env().await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create moderation client: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create task queue: {}", e);
            std::process::exit(1);
        }
    };

    let packager = match PackagerClient::from_env() {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create packager client: {}", e);
            std::process::exit(1);
        }
    };

    let processor = FrameProcessor::new(
        Arc::new(VideoJobRepository::new(firestore)),
        Arc::new(storage),
        Arc::new(moderation),
        Arc::new(FfmpegExtractor::new(Some(config.extract_timeout.as_secs()))),
        Arc::new(CallbackNotifier::new()),
        config.work_dir.clone(),
    );

    let executor = Arc::new(JobExecutor::new(config, queue, processor, packager));

    // Stop consuming on ctrl-c; in-flight jobs drain within the timeout
    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
