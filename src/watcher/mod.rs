//! # Crash Watcher
//!
//! Long-lived dispatcher that keeps a subscription to the directory's change stream and turns
//! crash transitions into crash reports.
//!
//! ## Dispatcher
//!
//! A single task selects over three inputs: the shutdown signal, subscribe results and
//! next-event results. Subscribe attempts and next-event fetches each run as their own task so
//! a hung fetch never delays shutdown. At most one next-event fetch is outstanding, so events
//! from one subscription are handled in delivery order.
//!
//! ```text
//! Unsubscribed ──start──▶ Subscribing ──ok──▶ Subscribed ──event──▶ Subscribed
//!                             ▲   │err (retry)       │
//!                             │   ▼                  │ error (> max consecutive)
//!                             └── Subscribing ◀──────┘
//! ```
//!
//! Crash reports are handed to a [`WorkPool`]. Submission waits for a free worker, which holds
//! back event consumption while the notification sink is saturated.

pub mod state;

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::config::WatcherConfig;
use crate::directory::{DirectoryClient, DirectoryError, EventSource, EventSourceError};
use crate::error::{TpsError, TpsResult};
use crate::models::{CrashReport, DirectoryEvent};
use crate::notifier::CrashNotifier;
use crate::work_pool::WorkPool;

pub use state::{NextAction, NextErrorTracker, WatcherState};

type SubscribeResult = Result<Arc<dyn EventSource>, DirectoryError>;
type NextResult = Result<DirectoryEvent, EventSourceError>;

/// Runtime counters for the watcher
#[derive(Debug, Default)]
pub struct WatcherStats {
    /// Events delivered by any subscription
    pub events_received: AtomicU64,
    /// Events that matched the crash rule
    pub crashes_detected: AtomicU64,
    /// Subscribe calls made against the directory
    pub subscribe_attempts: AtomicU64,
    /// Failed next-event fetches, excluding close
    pub next_errors: AtomicU64,
}

struct DispatchChannels {
    subscriptions: mpsc::Sender<SubscribeResult>,
    events: mpsc::Sender<NextResult>,
}

pub struct Watcher {
    directory: Arc<dyn DirectoryClient>,
    notifier: Arc<dyn CrashNotifier>,
    pool: WorkPool,
    app_domain: String,
    max_consecutive_errors: u32,
    retry_delay: Duration,
    stats: Arc<WatcherStats>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("app_domain", &self.app_domain)
            .field("pool_size", &self.pool.size())
            .field("max_consecutive_errors", &self.max_consecutive_errors)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl Watcher {
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        notifier: Arc<dyn CrashNotifier>,
        config: &WatcherConfig,
    ) -> TpsResult<Self> {
        if config.app_domain.trim().is_empty() {
            return Err(TpsError::Configuration(
                "watcher app_domain must not be empty".to_string(),
            ));
        }

        Ok(Self {
            directory,
            notifier,
            pool: WorkPool::new(config.work_pool_size)?,
            app_domain: config.app_domain.clone(),
            max_consecutive_errors: config.max_consecutive_errors,
            retry_delay: config.retry_delay(),
            stats: Arc::new(WatcherStats::default()),
        })
    }

    pub fn stats(&self) -> Arc<WatcherStats> {
        self.stats.clone()
    }

    /// Run the dispatcher on its own task
    pub fn spawn(self) -> WatcherHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let stats = self.stats.clone();
        let task = tokio::spawn(self.run(shutdown_rx, Some(ready_tx)));

        WatcherHandle {
            shutdown: Some(shutdown_tx),
            ready: Some(ready_rx),
            task,
            stats,
        }
    }

    /// Run the dispatcher until `shutdown` fires or its sender is dropped.
    ///
    /// `ready` is signalled once the dispatcher is running, before the first subscription is
    /// established.
    pub async fn run(self, shutdown: oneshot::Receiver<()>, ready: Option<oneshot::Sender<()>>) {
        let span = info_span!("watcher", app_domain = %self.app_domain);
        self.dispatch(shutdown, ready).instrument(span).await
    }

    async fn dispatch(self, mut shutdown: oneshot::Receiver<()>, ready: Option<oneshot::Sender<()>>) {
        info!(pool_size = self.pool.size(), "starting");

        let (subscriptions, mut subscription_rx) = mpsc::channel::<SubscribeResult>(1);
        let (events, mut event_rx) = mpsc::channel::<NextResult>(1);
        let channels = DispatchChannels {
            subscriptions,
            events,
        };
        let mut errors = NextErrorTracker::new(self.max_consecutive_errors);

        if let Some(ready) = ready {
            let _ = ready.send(());
        }
        info!("started");

        let mut state = self.begin_subscribe(&channels, Duration::ZERO);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                Some(result) = subscription_rx.recv() => {
                    state = self.on_subscription(result, &channels);
                }

                Some(result) = event_rx.recv() => {
                    let Some(source) = state.source().cloned() else {
                        debug!(state = state.name(), "discarding next-event result without a subscription");
                        continue;
                    };

                    match self
                        .on_next(result, source, &mut errors, &mut shutdown, &channels)
                        .await
                    {
                        ControlFlow::Continue(next) => state = next,
                        ControlFlow::Break(()) => break,
                    }
                }
            }
        }

        info!(state = state.name(), "stopping");
        self.pool.close();

        if let Some(source) = state.source() {
            if let Err(e) = source.close().await {
                error!(error = %e, "failed closing event source");
            }
        }

        info!(
            events_received = self.stats.events_received.load(Ordering::Relaxed),
            crashes_detected = self.stats.crashes_detected.load(Ordering::Relaxed),
            "finished"
        );
    }

    fn on_subscription(&self, result: SubscribeResult, channels: &DispatchChannels) -> WatcherState {
        match result {
            Ok(source) => {
                info!("subscribed");
                self.request_next(source.clone(), channels);
                WatcherState::Subscribed { source }
            }
            Err(e) => {
                error!(error = %e, "failed subscribing");
                self.begin_subscribe(channels, self.retry_delay)
            }
        }
    }

    async fn on_next(
        &self,
        result: NextResult,
        source: Arc<dyn EventSource>,
        errors: &mut NextErrorTracker,
        shutdown: &mut oneshot::Receiver<()>,
        channels: &DispatchChannels,
    ) -> ControlFlow<(), WatcherState> {
        match result {
            Ok(event) => {
                errors.reset();
                self.stats.events_received.fetch_add(1, Ordering::Relaxed);

                if self.handle_event(event, shutdown).await.is_break() {
                    return ControlFlow::Break(());
                }

                self.request_next(source.clone(), channels);
                ControlFlow::Continue(WatcherState::Subscribed { source })
            }
            Err(EventSourceError::Closed) => {
                warn!("event source closed, no longer watching");
                ControlFlow::Continue(WatcherState::Unsubscribed)
            }
            Err(e) => {
                self.stats.next_errors.fetch_add(1, Ordering::Relaxed);
                let action = errors.record_failure();
                error!(
                    error = %e,
                    consecutive_errors = errors.consecutive(),
                    action = ?action,
                    "failed getting next event"
                );

                match action {
                    NextAction::Retry => {
                        self.request_next(source.clone(), channels);
                        ControlFlow::Continue(WatcherState::Subscribed { source })
                    }
                    NextAction::Resubscribe => {
                        tokio::spawn(
                            async move {
                                if let Err(e) = source.close().await {
                                    warn!(error = %e, "failed closing abandoned event source");
                                }
                            }
                            .instrument(Span::current()),
                        );
                        ControlFlow::Continue(self.begin_subscribe(channels, Duration::ZERO))
                    }
                }
            }
        }
    }

    /// Hand a crash report to the pool when `event` is a crash transition.
    ///
    /// Breaks if shutdown arrives while waiting for a free worker.
    async fn handle_event(
        &self,
        event: DirectoryEvent,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> ControlFlow<()> {
        let DirectoryEvent::ActualInstanceChanged(change) = &event else {
            debug!(
                event_type = event.event_type(),
                process_guid = %event.process_guid(),
                "ignoring event"
            );
            return ControlFlow::Continue(());
        };

        let Some(report) = CrashReport::detect(change, &self.app_domain) else {
            return ControlFlow::Continue(());
        };

        self.stats.crashes_detected.fetch_add(1, Ordering::Relaxed);
        info!(
            process_guid = %report.process_guid,
            index = report.index,
            instance_guid = %report.instance_guid,
            crash_count = report.crash_count,
            exit_description = %report.exit_description,
            "app crashed"
        );

        let notifier = self.notifier.clone();
        let work = async move {
            info!(
                process_guid = %report.process_guid,
                index = report.index,
                "recording app crashed"
            );
            if let Err(e) = notifier.report_crash(&report.process_guid, &report).await {
                error!(
                    process_guid = %report.process_guid,
                    index = report.index,
                    error = %e,
                    "failed recording app crashed"
                );
            }
        }
        .instrument(Span::current());

        tokio::select! {
            biased;

            _ = &mut *shutdown => ControlFlow::Break(()),

            submitted = self.pool.submit(work) => {
                if let Err(e) = submitted {
                    error!(error = %e, "failed recording app crashed");
                }
                ControlFlow::Continue(())
            }
        }
    }

    fn request_next(&self, source: Arc<dyn EventSource>, channels: &DispatchChannels) {
        let events = channels.events.clone();
        let retry_delay = self.retry_delay;

        tokio::spawn(
            async move {
                let result = source.next().await;
                if matches!(result, Err(EventSourceError::Stream(_))) && !retry_delay.is_zero() {
                    tokio::time::sleep(retry_delay).await;
                }
                // Receiver is gone once the dispatcher has stopped
                let _ = events.send(result).await;
            }
            .instrument(Span::current()),
        );
    }

    fn begin_subscribe(&self, channels: &DispatchChannels, delay: Duration) -> WatcherState {
        let directory = self.directory.clone();
        let stats = self.stats.clone();
        let subscriptions = channels.subscriptions.clone();

        tokio::spawn(
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                stats.subscribe_attempts.fetch_add(1, Ordering::Relaxed);
                info!("subscribing");
                let result = directory.subscribe().await;

                if let Err(mpsc::error::SendError(Ok(orphan))) = subscriptions.send(result).await {
                    debug!("dispatcher stopped before subscription completed");
                    if let Err(e) = orphan.close().await {
                        warn!(error = %e, "failed closing orphaned event source");
                    }
                }
            }
            .instrument(Span::current()),
        );

        WatcherState::Subscribing
    }
}

/// Control handle for a spawned [`Watcher`].
///
/// Dropping the handle stops the watcher without waiting for it.
#[derive(Debug)]
pub struct WatcherHandle {
    shutdown: Option<oneshot::Sender<()>>,
    ready: Option<oneshot::Receiver<()>>,
    task: JoinHandle<()>,
    stats: Arc<WatcherStats>,
}

impl WatcherHandle {
    /// Wait until the dispatcher is running; false if it died first
    pub async fn ready(&mut self) -> bool {
        match self.ready.take() {
            Some(ready) => ready.await.is_ok(),
            None => true,
        }
    }

    pub fn stats(&self) -> Arc<WatcherStats> {
        self.stats.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the dispatcher to close its subscription and exit
    pub async fn stop(mut self) -> Result<(), JoinError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        (&mut self.task).await
    }
}
