//! # Tracing Module
//!
//! Environment-aware console logging using the tracing ecosystem.
//! Logs go to stdout so the service behaves well under a process supervisor.
//!
//! - `TPS_ENV` selects the default level (`production` → `info`, anything else → `debug`)
//! - `LOG_LEVEL` or `RUST_LOG` override the level entirely
//! - `TPS_LOG_FORMAT=json` switches the console layer to JSON lines

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging once per process.
///
/// Safe to call repeatedly, and safe to call when an embedder (or a test harness) has already
/// installed a global subscriber.
pub fn init_structured_logging() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(
            &environment,
            std::env::var("LOG_LEVEL").ok(),
            std::env::var("RUST_LOG").ok(),
        );
        let json = use_json_format(std::env::var("TPS_LOG_FORMAT").ok().as_deref());
        let use_ansi = !json && std::io::stdout().is_terminal();

        let console_layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                log_level = %log_level,
                json,
                "Console logging initialized"
            );
        }
    });
}

pub fn get_environment() -> String {
    std::env::var("TPS_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// `LOG_LEVEL` wins over `RUST_LOG`, which wins over the environment default
fn get_log_level(
    environment: &str,
    log_level: Option<String>,
    rust_log: Option<String>,
) -> String {
    if let Some(level) = log_level {
        return level.to_lowercase();
    }
    if let Some(level) = rust_log {
        return level.to_lowercase();
    }

    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn use_json_format(format: Option<&str>) -> bool {
    matches!(format, Some(f) if f.eq_ignore_ascii_case("json"))
}
