//! Configuration Loader
//!
//! Merges sources in increasing priority: struct defaults, an optional TOML file
//! (`TPS_CONFIG_PATH`, else `config/tps.toml`), and environment variables such as
//! `TPS__WATCHER__WORK_POOL_SIZE=10`.

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::TpsConfig;
use crate::error::TpsResult;

pub const DEFAULT_CONFIG_PATH: &str = "config/tps.toml";
pub const ENV_PREFIX: &str = "TPS";
pub const ENV_SEPARATOR: &str = "__";

impl TpsConfig {
    /// Load configuration from the default file location and the process environment
    pub fn load() -> TpsResult<Self> {
        let path = env::var("TPS_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::load_with(Some(&path), environment_source())
    }

    /// Load configuration from an explicit file plus the process environment
    pub fn load_from_path(path: &Path) -> TpsResult<Self> {
        Self::load_with(Some(path), environment_source())
    }

    /// Load from an optional file and an explicit environment source
    pub fn load_with(path: Option<&Path>, environment: config::Environment) -> TpsResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), exists = path.exists(), "Adding configuration file source");
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder.add_source(environment).build()?;
        let config: TpsConfig = settings.try_deserialize()?;
        config.validate()?;

        info!(
            bind_address = %config.web.bind_address,
            directory = %config.directory.base_url,
            telemetry = %config.telemetry.base_url,
            watcher_enabled = config.watcher.enabled,
            work_pool_size = config.watcher.work_pool_size,
            "Configuration loaded successfully"
        );

        Ok(config)
    }
}

/// Environment source for `TPS__SECTION__KEY` variables
pub fn environment_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
