use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scribe_core::{
    load_config, validate_config, JobManager, JobStore, MemoryJobStore, OpenAiTranslator, Reaper,
    SqliteJobStore, StageExecutor, StoreBackend, TranslationPolicy, WhisperCliTranscriber,
    YtDlpAcquirer,
};
use scribe_server::{create_router, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SCRIBE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!(
        max_concurrent_jobs = config.manager.max_concurrent_jobs,
        store = config.store.backend.as_str(),
        "Job manager settings"
    );

    // Create job store
    let store: Arc<dyn JobStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryJobStore::new()),
        StoreBackend::Sqlite => {
            info!("Database path: {:?}", config.store.path);
            Arc::new(
                SqliteJobStore::new(&config.store.path)
                    .context("Failed to create job store")?,
            )
        }
    };
    info!("Job store initialized");

    // Create reaper
    let reaper = Reaper::with_store(config.reaper.clone(), Arc::clone(&store));

    // Create collaborators
    let acquirer = Arc::new(YtDlpAcquirer::new(config.acquirer.clone()));
    let transcriber = Arc::new(WhisperCliTranscriber::new(config.transcriber.clone()));
    let translator =
        Arc::new(OpenAiTranslator::new(&config.translator).context("Failed to create translator")?);
    if !config.translator.has_api_key() {
        warn!("No translator API key configured; translations will be skipped");
    }
    let translation = Arc::new(TranslationPolicy::new(translator, &config.translator));

    // Create stage executor and job manager
    let executor = StageExecutor::new(
        config.processor.clone(),
        Arc::clone(&store),
        acquirer,
        transcriber,
        translation,
        reaper.clone(),
    );
    let manager = Arc::new(JobManager::new(config.manager.clone(), executor));

    // Fail jobs a previous process left behind, then clear their artifacts
    manager
        .recover_interrupted()
        .context("Failed to recover interrupted jobs")?;
    if config.reaper.sweep_on_startup {
        let report = reaper.sweep();
        info!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "Startup sweep finished"
        );
    }

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&manager)));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    manager.shutdown().await;

    let flushed = reaper.flush();
    if flushed > 0 {
        info!(count = flushed, "Flushed pending artifact removals");
    }
    if config.reaper.sweep_on_shutdown {
        let report = reaper.sweep();
        info!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "Shutdown sweep finished"
        );
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
