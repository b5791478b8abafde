use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::actual::{ActualInstanceRecord, InstanceState, Placement};

/// Resource usage observed for one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    pub time: DateTime<Utc>,
    /// CPU usage as a fraction (`0.03` is three percent of one core)
    pub cpu: f64,
    pub memory_bytes: u64,
    pub disk_bytes: u64,
}

/// Reconciled view of one instance slot, synthesized per request
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceStatusView {
    pub process_guid: String,
    pub instance_guid: String,
    pub index: u32,
    pub state: InstanceState,
    pub placement: Option<Placement>,
    pub since: DateTime<Utc>,
    pub usage: Option<UsageSample>,
}

impl InstanceStatusView {
    /// Project an observed record directly
    pub fn from_actual(record: &ActualInstanceRecord) -> Self {
        Self {
            process_guid: record.process_guid.clone(),
            instance_guid: record.instance_guid.clone(),
            index: record.index,
            state: record.state,
            placement: record.placement.clone(),
            since: record.since,
            usage: None,
        }
    }

    /// Stand-in for a declared slot the directory has no record for yet
    pub fn placeholder(process_guid: &str, index: u32, now: DateTime<Utc>) -> Self {
        Self {
            process_guid: process_guid.to_string(),
            instance_guid: String::new(),
            index,
            state: InstanceState::Starting,
            placement: None,
            since: now,
            usage: None,
        }
    }

    /// Whole seconds since the last transition, never negative
    pub fn uptime_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.since).num_seconds().max(0)
    }
}
