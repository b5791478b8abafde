//! # Telemetry Broker Client
//!
//! Opens metric sessions scoped to a process's log stream and decodes the envelopes the
//! broker delivers. Only container usage envelopes carry anything this service uses; every
//! other envelope type is skipped by [`Envelope::usage_sample`].

pub mod http;
pub mod memory;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::UsageSample;

pub use http::HttpTelemetryClient;
pub use memory::StaticTelemetryClient;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error("telemetry broker unavailable: {0}")]
    Unavailable(String),
    #[error("telemetry broker rejected credentials")]
    Unauthorized,
    #[error("failed to decode envelope: {0}")]
    Decode(String),
}

/// Lazily produced envelopes for one session; finite, but may be slow to end
pub type MetricStream = BoxStream<'static, Result<Envelope, TelemetryError>>;

#[async_trait]
pub trait TelemetryClient: Send + Sync + 'static {
    async fn open_session(
        &self,
        log_guid: &str,
        auth_token: &str,
    ) -> Result<MetricStream, TelemetryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeType {
    ContainerMetric,
    LogMessage,
    ValueMetric,
    CounterEvent,
    HttpStartStop,
    Error,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerMetric {
    #[serde(default)]
    pub application_id: String,
    pub instance_index: i32,
    /// Percent of one core, as reported by the cell (`3.0` means three percent)
    pub cpu_percentage: f64,
    pub memory_bytes: u64,
    pub disk_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub origin: String,
    pub event_type: EnvelopeType,
    /// Unix nanoseconds
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_metric: Option<ContainerMetric>,
}

impl Envelope {
    pub fn container_metric(origin: &str, timestamp: i64, metric: ContainerMetric) -> Self {
        Self {
            origin: origin.to_string(),
            event_type: EnvelopeType::ContainerMetric,
            timestamp,
            container_metric: Some(metric),
        }
    }

    /// Instance index and usage carried by a container metric envelope.
    ///
    /// CPU is converted from a percentage to a fraction.
    pub fn usage_sample(&self) -> Option<(u32, UsageSample)> {
        if self.event_type != EnvelopeType::ContainerMetric {
            return None;
        }
        let metric = self.container_metric.as_ref()?;
        let index = u32::try_from(metric.instance_index).ok()?;

        Some((
            index,
            UsageSample {
                time: Utc.timestamp_nanos(self.timestamp),
                cpu: metric.cpu_percentage / 100.0,
                memory_bytes: metric.memory_bytes,
                disk_bytes: metric.disk_bytes,
            },
        ))
    }
}
