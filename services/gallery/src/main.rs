use anyhow::{Context, Result};
use gallery_service::{
    start_api_server, AppState, Config, MemoryPhotoStore, PgPhotoStore, PhotoStore, StoreBackend,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting gallery service"
    );

    if config.service.metrics_enabled {
        init_metrics(config.service.metrics_port)?;
    }

    let photo_store = init_store(&config).await?;

    start_api_server(AppState::new(photo_store), &config.api, shutdown_signal()).await?;

    info!("Gallery service stopped");

    Ok(())
}

/// Build the configured photo store.
///
/// An unreachable database is logged and the service keeps starting; requests
/// fail individually until it comes back, and the first one to reach it
/// applies the migrations.
async fn init_store(config: &Config) -> Result<Arc<dyn PhotoStore>> {
    match config.database.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory photo store; photos are lost on restart");
            Ok(Arc::new(MemoryPhotoStore::new()))
        }
        StoreBackend::Postgres => {
            let store = PgPhotoStore::connect_lazy(&config.database)
                .context("Invalid database configuration")?;

            // ping also applies pending migrations
            match store.ping().await {
                Ok(()) => info!("Connected to PostgreSQL database"),
                Err(e) => error!(error = %e, "Database connection error"),
            }

            Ok(Arc::new(store))
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
