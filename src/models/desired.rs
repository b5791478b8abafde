use serde::{Deserialize, Serialize};

/// Declared specification for a long-running process.
///
/// Owned by the directory; this service only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRecord {
    pub process_guid: String,
    pub domain: String,
    /// Number of instance slots the process should have
    pub instances: u32,
    #[serde(default)]
    pub memory_mb: u32,
    #[serde(default)]
    pub disk_mb: u32,
    /// Log stream identifier used to correlate telemetry with this process
    pub log_guid: String,
}

impl DesiredRecord {
    pub fn new(
        process_guid: impl Into<String>,
        domain: impl Into<String>,
        instances: u32,
        log_guid: impl Into<String>,
    ) -> Self {
        Self {
            process_guid: process_guid.into(),
            domain: domain.into(),
            instances,
            memory_mb: 0,
            disk_mb: 0,
            log_guid: log_guid.into(),
        }
    }

    pub fn with_limits(mut self, memory_mb: u32, disk_mb: u32) -> Self {
        self.memory_mb = memory_mb;
        self.disk_mb = disk_mb;
        self
    }
}
