//! Observed state of a single instance slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an instance slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Starting,
    Running,
    Crashed,
    Unknown,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Starting => write!(f, "STARTING"),
            InstanceState::Running => write!(f, "RUNNING"),
            InstanceState::Crashed => write!(f, "CRASHED"),
            InstanceState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Where a running instance can be reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub host: String,
    pub port: u16,
}

impl Placement {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualInstanceRecord {
    pub process_guid: String,
    pub index: u32,
    pub domain: String,
    /// Empty until the instance has been placed
    #[serde(default)]
    pub instance_guid: String,
    pub state: InstanceState,
    #[serde(default)]
    pub placement: Option<Placement>,
    #[serde(default)]
    pub crash_count: u32,
    #[serde(default)]
    pub crash_reason: String,
    /// Time of the last state transition
    pub since: DateTime<Utc>,
}

impl ActualInstanceRecord {
    /// An unplaced slot as the directory first creates it
    pub fn unclaimed(process_guid: impl Into<String>, index: u32, domain: impl Into<String>) -> Self {
        Self {
            process_guid: process_guid.into(),
            index,
            domain: domain.into(),
            instance_guid: String::new(),
            state: InstanceState::Starting,
            placement: None,
            crash_count: 0,
            crash_reason: String::new(),
            since: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }
}
