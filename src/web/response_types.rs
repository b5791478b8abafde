//! # Web API Response Types
//!
//! Wire shapes for the instance status endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{InstanceState, InstanceStatusView, UsageSample};

/// Resource usage for one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceStats {
    pub time: DateTime<Utc>,
    /// Fraction of one core
    pub cpu: f64,
    pub mem: u64,
    pub disk: u64,
}

impl From<&UsageSample> for InstanceStats {
    fn from(sample: &UsageSample) -> Self {
        Self {
            time: sample.time,
            cpu: sample.cpu,
            mem: sample.memory_bytes,
            disk: sample.disk_bytes,
        }
    }
}

/// One instance slot as served by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceStatusResponse {
    pub process_guid: String,
    pub instance_guid: String,
    pub index: u32,
    pub state: InstanceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Unix seconds of the last state transition
    pub since: i64,
    /// Seconds since `since`, as of the response
    pub uptime: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<InstanceStats>,
}

impl InstanceStatusResponse {
    pub fn from_view(view: &InstanceStatusView, now: DateTime<Utc>) -> Self {
        Self {
            process_guid: view.process_guid.clone(),
            instance_guid: view.instance_guid.clone(),
            index: view.index,
            state: view.state,
            host: view.placement.as_ref().map(|p| p.host.clone()),
            port: view.placement.as_ref().map(|p| p.port),
            since: view.since.timestamp(),
            uptime: view.uptime_at(now),
            stats: view.usage.as_ref().map(InstanceStats::from),
        }
    }

    pub fn from_views(views: &[InstanceStatusView], now: DateTime<Utc>) -> Vec<Self> {
        views.iter().map(|view| Self::from_view(view, now)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
