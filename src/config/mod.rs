//! # Service Configuration
//!
//! Layered configuration for the listener: compiled-in defaults, an optional TOML file, then
//! `TPS__`-prefixed environment variables (see [`loader`]).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tps_core::config::TpsConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TpsConfig::load()?;
//! println!("listening on {}", config.web.bind_address);
//! println!("watching domain {}", config.watcher.app_domain);
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{TpsError, TpsResult};

/// Domain under which the platform registers application instances
pub const DEFAULT_APP_DOMAIN: &str = "cf-apps";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpsConfig {
    pub web: WebConfig,
    pub directory: DirectoryConfig,
    pub telemetry: TelemetryConfig,
    pub notifier: NotifierConfig,
    pub watcher: WatcherConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    pub request_timeout_ms: u64,
    /// Require an `Authorization` header on the stats and bulk endpoints
    pub auth_required: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:1518".to_string(),
            request_timeout_ms: 30_000,
            auth_required: true,
        }
    }
}

impl WebConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8889".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl DirectoryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub base_url: String,
    /// Upper bound on how long a stats request waits for metric envelopes
    pub drain_window_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            drain_window_ms: 2_000,
        }
    }
}

impl TelemetryConfig {
    pub fn drain_window(&self) -> Duration {
        Duration::from_millis(self.drain_window_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub request_timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            username: String::new(),
            password: String::new(),
            request_timeout_ms: 5_000,
        }
    }
}

impl NotifierConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub enabled: bool,
    pub work_pool_size: usize,
    pub app_domain: String,
    /// Next-event failures tolerated on one subscription before resubscribing
    pub max_consecutive_errors: u32,
    pub retry_delay_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            work_pool_size: 500,
            app_domain: DEFAULT_APP_DOMAIN.to_string(),
            max_consecutive_errors: 2,
            retry_delay_ms: 1_000,
        }
    }
}

impl WatcherConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Concurrent directory lookups per bulk request
    pub bulk_workers: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { bulk_workers: 15 }
    }
}

impl TpsConfig {
    /// Reject values that would leave a component unable to run
    pub fn validate(&self) -> TpsResult<()> {
        if self.watcher.work_pool_size == 0 {
            return Err(TpsError::Configuration(
                "watcher.work_pool_size must be greater than zero".to_string(),
            ));
        }
        if self.watcher.app_domain.trim().is_empty() {
            return Err(TpsError::Configuration(
                "watcher.app_domain must not be empty".to_string(),
            ));
        }
        if self.status.bulk_workers == 0 {
            return Err(TpsError::Configuration(
                "status.bulk_workers must be greater than zero".to_string(),
            ));
        }
        if self.telemetry.drain_window_ms == 0 {
            return Err(TpsError::Configuration(
                "telemetry.drain_window_ms must be greater than zero".to_string(),
            ));
        }

        for (name, url) in [
            ("directory.base_url", &self.directory.base_url),
            ("telemetry.base_url", &self.telemetry.base_url),
            ("notifier.base_url", &self.notifier.base_url),
        ] {
            if url.trim().is_empty() {
                return Err(TpsError::Configuration(format!("{name} must not be empty")));
            }
        }

        Ok(())
    }
}
