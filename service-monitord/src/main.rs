mod config;
mod cache;
mod monitor_manager;
mod api;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use service_registry::{ServiceCatalog, ServiceRegistry, SocketProber, StatusMonitor};
use crate::cache::db::CacheDb;
use crate::monitor_manager::MonitorHandle;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("service_monitord=info"))
        )
        .init();

    tracing::info!("Starting service-monitord");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/service-monitor/monitord.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    // Open SQLite database
    let db = CacheDb::open(&config.cache.db_path)?;
    tracing::info!("Opened database at {:?}", config.cache.db_path);

    // Database settings first, so inline entries from the config file win
    let mut settings = db.settings()?;
    settings.extend(config.services.iter().cloned());

    let catalog = ServiceCatalog::from_settings(&settings)
        .context("Failed to load service definitions")?;
    tracing::info!("Monitoring {} services", catalog.len());

    let status_monitor = StatusMonitor::with_ttl(
        db,
        SocketProber::new(config.monitor.probe_timeout()),
        config.monitor.status_ttl(),
    );
    let registry = ServiceRegistry::with_monitor(catalog, status_monitor);

    // Start registry thread
    let (hash_tx, hash_rx) = watch::channel(String::new());
    let monitor = MonitorHandle::spawn(registry, hash_tx);

    // Compute initial status hash
    let initial = monitor
        .list(false)
        .await
        .context("Failed to compute initial service status")?;
    tracing::info!(
        "Initial status hash for {} visible services: {}",
        initial.len(),
        *hash_rx.borrow()
    );

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn cache maintenance task
    let mgr_cancel = cancel.clone();
    let mgr_config = config.cache.clone();
    let mgr_monitor = monitor.clone();
    let mgr_handle = tokio::spawn(async move {
        if let Err(e) = monitor_manager::run(mgr_monitor, mgr_config, mgr_cancel).await {
            tracing::error!("Monitor manager error: {}", e);
        }
    });

    // Build API router
    let app_state = api::routes::AppState {
        monitor: monitor.clone(),
        hash_rx,
        probe_timeout_ms: config.monitor.probe_timeout().as_millis() as u64,
        status_ttl_secs: config.monitor.status_ttl_secs,
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(mgr_handle, server_handle);

    // Shutdown registry thread
    if let Err(e) = monitor.shutdown().await {
        tracing::error!("Failed to shutdown registry thread: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
