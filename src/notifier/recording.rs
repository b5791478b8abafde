//! Notifier that keeps every report in memory.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::{CrashNotifier, NotificationError};
use crate::models::CrashReport;

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    reports: Arc<Mutex<Vec<(String, CrashReport)>>>,
    attempts: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    delay: Option<Duration>,
    recorded: Arc<Notify>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each delivery for `delay` before recording it
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reject every report while set; rejected reports are counted but not recorded
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn reports(&self) -> Vec<(String, CrashReport)> {
        self.reports.lock().clone()
    }

    /// Deliveries attempted, accepted or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` attempts have been made, up to `timeout`
    pub async fn wait_for_attempts(&self, count: usize, timeout: Duration) -> bool {
        let waiting = async {
            loop {
                let notified = self.recorded.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.attempts() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, waiting).await.is_ok()
    }
}

#[async_trait]
impl CrashNotifier for RecordingNotifier {
    async fn report_crash(
        &self,
        process_guid: &str,
        report: &CrashReport,
    ) -> Result<(), NotificationError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.failing.load(Ordering::SeqCst) {
            Err(NotificationError::Rejected { status: 500 })
        } else {
            self.reports
                .lock()
                .push((process_guid.to_string(), report.clone()));
            Ok(())
        };

        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.recorded.notify_waiters();
        result
    }
}
