//! Runs a watcher against the in-memory directory and a recording notifier.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tps_core::config::WatcherConfig;
use tps_core::directory::InMemoryDirectory;
use tps_core::notifier::RecordingNotifier;
use tps_core::watcher::{Watcher, WatcherHandle, WatcherStats};

use super::eventually;

pub const WAIT: Duration = Duration::from_secs(2);

pub struct WatcherHarness {
    pub directory: InMemoryDirectory,
    pub notifier: RecordingNotifier,
    pub handle: WatcherHandle,
    pub stats: Arc<WatcherStats>,
}

impl WatcherHarness {
    /// Start a watcher and wait for its first subscription
    pub async fn start(
        directory: InMemoryDirectory,
        notifier: RecordingNotifier,
        config: WatcherConfig,
    ) -> Self {
        let harness = Self::spawn(directory, notifier, config).await;
        assert!(
            harness.wait_for_subscriptions(1, 1).await,
            "watcher never subscribed"
        );
        harness
    }

    /// Start a watcher without waiting for a subscription
    pub async fn spawn(
        directory: InMemoryDirectory,
        notifier: RecordingNotifier,
        config: WatcherConfig,
    ) -> Self {
        let watcher = Watcher::new(
            Arc::new(directory.clone()),
            Arc::new(notifier.clone()),
            &config,
        )
        .expect("valid watcher config");

        let mut handle = watcher.spawn();
        assert!(handle.ready().await);
        let stats = handle.stats();

        Self {
            directory,
            notifier,
            handle,
            stats,
        }
    }

    /// Wait until `attempts` subscribes have happened and exactly `open` remain open
    pub async fn wait_for_subscriptions(&self, attempts: u64, open: usize) -> bool {
        let directory = self.directory.clone();
        eventually(WAIT, move || {
            directory.subscribe_attempts() == attempts && directory.open_subscriptions() == open
        })
        .await
    }

    pub async fn wait_for_events(&self, count: u64) -> bool {
        let stats = self.stats.clone();
        eventually(WAIT, move || {
            stats.events_received.load(Ordering::SeqCst) >= count
        })
        .await
    }

    pub async fn wait_for_next_errors(&self, count: u64) -> bool {
        let stats = self.stats.clone();
        eventually(WAIT, move || stats.next_errors.load(Ordering::SeqCst) >= count).await
    }

    pub fn crashes_detected(&self) -> u64 {
        self.stats.crashes_detected.load(Ordering::SeqCst)
    }

    pub async fn stop(self) -> InMemoryDirectory {
        tokio::time::timeout(WAIT, self.handle.stop())
            .await
            .expect("watcher stopped in time")
            .expect("watcher task did not panic");
        self.directory
    }
}
