//! Error types for the status and crash-reporting service.
//!

use thiserror::Error;

use crate::directory::DirectoryError;
use crate::notifier::NotificationError;
use crate::telemetry::TelemetryError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TpsError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Telemetry unavailable: {0}")]
    TelemetryUnavailable(String),
    #[error("Notification failure: {0}")]
    NotificationFailure(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Work pool closed")]
    PoolClosed,
}

impl TpsError {
    /// True for failures caused by the caller rather than by this service or its upstreams
    pub fn is_client_error(&self) -> bool {
        matches!(self, TpsError::NotFound(_) | TpsError::InvalidInput(_))
    }
}

impl From<DirectoryError> for TpsError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(guid) => TpsError::NotFound(guid),
            other => TpsError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<TelemetryError> for TpsError {
    fn from(err: TelemetryError) -> Self {
        TpsError::TelemetryUnavailable(err.to_string())
    }
}

impl From<NotificationError> for TpsError {
    fn from(err: NotificationError) -> Self {
        TpsError::NotificationFailure(err.to_string())
    }
}

impl From<config::ConfigError> for TpsError {
    fn from(err: config::ConfigError) -> Self {
        TpsError::Configuration(err.to_string())
    }
}

pub type TpsResult<T> = std::result::Result<T, TpsError>;
