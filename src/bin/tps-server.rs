//! # TPS Server
//!
//! Runs the crash watcher and the instance status API in one process.
//!
//! ## Usage
//!
//! ```bash
//! # Run with config/tps.toml (if present) and defaults
//! cargo run --bin tps-server
//!
//! # Point at a config file and override a setting from the environment
//! TPS_CONFIG_PATH=/etc/tps.toml TPS__WATCHER__WORK_POOL_SIZE=50 cargo run --bin tps-server
//! ```

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use tps_core::config::TpsConfig;
use tps_core::directory::{DirectoryClient, HttpDirectoryClient};
use tps_core::logging;
use tps_core::notifier::{CrashNotifier, HttpCrashNotifier};
use tps_core::status::StatusAggregator;
use tps_core::telemetry::{HttpTelemetryClient, TelemetryClient};
use tps_core::watcher::Watcher;
use tps_core::web::{self, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %logging::get_environment(),
        "Starting TPS server"
    );

    let config = TpsConfig::load().context("failed to load configuration")?;

    let directory: Arc<dyn DirectoryClient> = Arc::new(
        HttpDirectoryClient::new(&config.directory).context("failed to build directory client")?,
    );
    let telemetry: Arc<dyn TelemetryClient> = Arc::new(
        HttpTelemetryClient::new(&config.telemetry).context("failed to build telemetry client")?,
    );
    let notifier: Arc<dyn CrashNotifier> = Arc::new(
        HttpCrashNotifier::new(&config.notifier).context("failed to build crash notifier")?,
    );

    let watcher = if config.watcher.enabled {
        let mut handle = Watcher::new(directory.clone(), notifier, &config.watcher)
            .context("failed to create watcher")?
            .spawn();
        if !handle.ready().await {
            anyhow::bail!("watcher exited before becoming ready");
        }
        Some(handle)
    } else {
        info!("Crash watcher disabled by configuration");
        None
    };

    let aggregator = StatusAggregator::new(
        directory,
        telemetry,
        config.telemetry.drain_window(),
        config.status.bulk_workers,
    );
    let app = web::create_app(AppState::new(config.web.clone(), aggregator));

    let listener = tokio::net::TcpListener::bind(&config.web.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.web.bind_address))?;
    info!(address = %config.web.bind_address, "Serving instance status API");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");

    if let Some(handle) = watcher {
        if let Err(e) = handle.stop().await {
            error!(error = %e, "Crash watcher did not stop cleanly");
        }
    }

    info!("TPS server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
