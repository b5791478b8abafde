//! # Crash Notification Sink
//!
//! Delivers [`CrashReport`]s to the platform. Delivery is at-most-once: the watcher logs a
//! failed report and moves on.

pub mod http;
pub mod recording;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::CrashReport;

pub use http::HttpCrashNotifier;
pub use recording::RecordingNotifier;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotificationError {
    #[error("failed to reach notification sink: {0}")]
    Transport(String),
    #[error("notification sink rejected crash report with status {status}")]
    Rejected { status: u16 },
}

#[async_trait]
pub trait CrashNotifier: Send + Sync + 'static {
    async fn report_crash(
        &self,
        process_guid: &str,
        report: &CrashReport,
    ) -> Result<(), NotificationError>;
}
