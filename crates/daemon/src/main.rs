//! codesift daemon - Main Entry Point
//!
//! One process hosts the HTTP front-end, the worker fleet, the DLQ handler
//! and the maintenance scheduler; all of them share the SQLite-backed
//! stores, so running several daemon instances against one database file
//! scales the workers horizontally.

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use codesift_analyzer::CodeAnalyzer;
use codesift_api_http::{ApiContext, HttpServer, HttpServerConfig};
use codesift_core::application::worker::{Shutdown, Worker};
use codesift_core::application::{DlqHandler, DlqService, MaintenanceScheduler, SubmissionService};
use codesift_core::port::analyzer::Analyzer;
use codesift_core::port::{
    Clock, DlqStore, IdGen, JobQueue, JobStore, ResultCache, SystemClock, UuidGen,
};
use codesift_infra_sqlite::{
    create_pool, run_migrations, SqliteDlqStore, SqliteJobQueue, SqliteJobStore, SqliteMaintenance,
    SqliteResultCache,
};

use config::Config;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (JSON format for production)
    let log_format = std::env::var("CODESIFT_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("codesift=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("codesift v{} starting...", VERSION);

    // 1.1. Optional OpenTelemetry
    if let Err(e) = telemetry::init_telemetry() {
        tracing::warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    }

    // 2. Load configuration
    let config = Config::from_env();
    info!(db_path = %config.db_path, workers = %config.workers, "Initializing database...");

    // 3. Initialize database
    let pool = create_pool(&config.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ids: Arc<dyn IdGen> = Arc::new(UuidGen);

    let job_store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool.clone(), clock.clone()));
    let cache: Arc<dyn ResultCache> = Arc::new(SqliteResultCache::new(
        pool.clone(),
        clock.clone(),
        config.cache.clone(),
    ));
    let queue: Arc<dyn JobQueue> = Arc::new(SqliteJobQueue::new(
        pool.clone(),
        clock.clone(),
        ids.clone(),
        config.queue.clone(),
    ));
    let dlq_store: Arc<dyn DlqStore> = Arc::new(SqliteDlqStore::new(pool.clone(), clock.clone()));
    let analyzer: Arc<dyn Analyzer> = Arc::new(CodeAnalyzer::new(config.analyzer.clone()));

    let shutdown = Shutdown::new();

    // 5. Start HTTP server
    let submission = SubmissionService::new(
        job_store.clone(),
        cache.clone(),
        queue.clone(),
        ids.clone(),
        clock.clone(),
        config.submission.clone(),
    );
    let dlq_service = DlqService::new(queue.clone(), job_store.clone(), dlq_store.clone());
    let api_context = Arc::new(ApiContext {
        submission,
        dlq: dlq_service,
        job_store: job_store.clone(),
        clock: clock.clone(),
    });

    info!(host = %config.http_host, port = %config.http_port, "Starting HTTP server...");
    let http_server = HttpServer::new(
        HttpServerConfig {
            host: config.http_host.clone(),
            port: config.http_port,
        },
        api_context,
    );
    let http_token = shutdown.token();
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_token).await {
            error!(error = %e, "HTTP server failed");
        }
    });

    // 6. Start the worker fleet
    info!(workers = %config.workers, "Starting workers...");
    let mut worker_handles = Vec::new();
    for n in 0..config.workers {
        let worker = Worker::new(
            queue.clone(),
            job_store.clone(),
            cache.clone(),
            dlq_store.clone(),
            analyzer.clone(),
            ids.clone(),
            clock.clone(),
            config.queue.clone(),
        );
        let token = shutdown.token();
        worker_handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(token).await {
                error!(worker = %n, error = %e, "Worker failed");
            }
        }));
    }

    // 7. Start the DLQ handler
    info!("Starting DLQ handler...");
    let dlq_handler = DlqHandler::new(
        queue.clone(),
        job_store.clone(),
        dlq_store.clone(),
        ids.clone(),
        clock.clone(),
        config.queue.clone(),
    );
    let dlq_token = shutdown.token();
    let dlq_handle = tokio::spawn(async move {
        if let Err(e) = dlq_handler.run(dlq_token).await {
            error!(error = %e, "DLQ handler failed");
        }
    });

    // 8. Start the maintenance scheduler
    info!("Starting maintenance scheduler...");
    let maintenance = Arc::new(SqliteMaintenance::new(
        pool.clone(),
        clock.clone(),
        config.queue.clone(),
    ));
    let scheduler = MaintenanceScheduler::new(maintenance, config.maintenance_interval);
    let maintenance_token = shutdown.token();
    tokio::spawn(async move {
        scheduler.run(maintenance_token).await;
    });

    info!("System ready. Press Ctrl+C to shutdown");

    // 9. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 10. Graceful shutdown: workers finish their in-flight job; anything
    // not deleted redelivers after its visibility lease.
    shutdown.trigger();
    let drain = std::time::Duration::from_secs(10);
    for handle in worker_handles {
        let _ = tokio::time::timeout(drain, handle).await;
    }
    let _ = tokio::time::timeout(drain, dlq_handle).await;
    let _ = tokio::time::timeout(drain, http_handle).await;

    info!("Shutdown complete.");
    Ok(())
}
