//! Crash transition detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::ChangeEvent;

/// Reason reported for every crash this service forwards
pub const CRASH_REASON: &str = "CRASHED";

/// Crash notification handed to the platform sink.
///
/// Serializes to the sink's request body; the process guid travels in the URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashReport {
    #[serde(skip)]
    pub process_guid: String,
    /// Instance that was running before the crash
    #[serde(rename = "instance")]
    pub instance_guid: String,
    pub index: u32,
    pub reason: String,
    pub exit_description: String,
    pub crash_count: u32,
    #[serde(with = "chrono::serde::ts_nanoseconds")]
    pub crash_timestamp: DateTime<Utc>,
}

impl CrashReport {
    /// Build a report when `event` is a crash transition within `app_domain`.
    ///
    /// A transition is a crash iff the new snapshot belongs to `app_domain` and its crash
    /// counter went up. The instance guid comes from the *before* snapshot, since the
    /// directory may already have cleared it on the *after* side.
    pub fn detect(event: &ChangeEvent, app_domain: &str) -> Option<Self> {
        let before = &event.before;
        let after = &event.after;

        if after.domain != app_domain || after.crash_count <= before.crash_count {
            return None;
        }

        Some(Self {
            process_guid: after.process_guid.clone(),
            instance_guid: before.instance_guid.clone(),
            index: after.index,
            reason: CRASH_REASON.to_string(),
            exit_description: after.crash_reason.clone(),
            crash_count: after.crash_count,
            crash_timestamp: after.since,
        })
    }
}
