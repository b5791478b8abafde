//! In-process directory.
//!
//! Holds desired and actual records behind a lock and fans change events out to every open
//! subscription. Mutators mirror the placement lifecycle (`claim`, `start`, `crash`,
//! `remove_actual`) so callers can drive realistic transitions. Availability and stream
//! faults can be injected to exercise the watcher's recovery paths.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::debug;

use super::{DirectoryClient, DirectoryError, EventSource, EventSourceError};
use crate::models::{
    ActualInstanceRecord, ChangeEvent, DesiredRecord, DirectoryEvent, InstanceState, Placement,
};

#[derive(Debug)]
enum Delivery {
    Event(DirectoryEvent),
    Error(String),
}

struct Subscriber {
    sender: mpsc::UnboundedSender<Delivery>,
    closed: watch::Receiver<bool>,
}

impl Subscriber {
    fn is_open(&self) -> bool {
        !*self.closed.borrow() && !self.sender.is_closed()
    }
}

#[derive(Default)]
struct DirectoryState {
    desired: HashMap<String, DesiredRecord>,
    actual: HashMap<String, BTreeMap<u32, ActualInstanceRecord>>,
    subscribers: Vec<Subscriber>,
    unavailable: bool,
    failing_subscribes: u32,
}

#[derive(Default)]
struct Counters {
    subscribe_attempts: AtomicU64,
    open_subscriptions: AtomicUsize,
}

/// Concurrency-safe in-memory directory; clones share the same store
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for InMemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("InMemoryDirectory")
            .field("desired", &state.desired.len())
            .field("subscribers", &state.subscribers.len())
            .field("unavailable", &state.unavailable)
            .finish()
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desire(&self, desired: DesiredRecord) {
        self.state
            .write()
            .desired
            .insert(desired.process_guid.clone(), desired);
    }

    pub fn remove_desired(&self, process_guid: &str) {
        let mut state = self.state.write();
        state.desired.remove(process_guid);
        state.actual.remove(process_guid);
    }

    /// Assign an instance guid to a slot; the instance is not yet running
    pub fn claim(
        &self,
        process_guid: &str,
        index: u32,
        instance_guid: &str,
    ) -> Result<ActualInstanceRecord, DirectoryError> {
        self.transition(process_guid, index, |record| {
            record.instance_guid = instance_guid.to_string();
            record.state = InstanceState::Starting;
            record.placement = None;
        })
    }

    pub fn start(
        &self,
        process_guid: &str,
        index: u32,
        instance_guid: &str,
        placement: Placement,
    ) -> Result<ActualInstanceRecord, DirectoryError> {
        self.transition(process_guid, index, |record| {
            record.instance_guid = instance_guid.to_string();
            record.state = InstanceState::Running;
            record.placement = Some(placement);
        })
    }

    /// Record a crash: bumps the crash counter and unplaces the instance
    pub fn crash(
        &self,
        process_guid: &str,
        index: u32,
        reason: &str,
    ) -> Result<ActualInstanceRecord, DirectoryError> {
        self.transition(process_guid, index, |record| {
            record.instance_guid = String::new();
            record.state = InstanceState::Crashed;
            record.placement = None;
            record.crash_count += 1;
            record.crash_reason = reason.to_string();
        })
    }

    pub fn remove_actual(&self, process_guid: &str, index: u32) -> Option<ActualInstanceRecord> {
        let mut state = self.state.write();
        let removed = state
            .actual
            .get_mut(process_guid)
            .and_then(|slots| slots.remove(&index));

        if let Some(record) = &removed {
            Self::publish(
                &mut state,
                Delivery::Event(DirectoryEvent::ActualInstanceRemoved(record.clone())),
            );
        }
        removed
    }

    /// Insert or replace a record verbatim, emitting the matching event
    pub fn upsert_actual(&self, record: ActualInstanceRecord) {
        let mut state = self.state.write();
        let previous = state
            .actual
            .entry(record.process_guid.clone())
            .or_default()
            .insert(record.index, record.clone());

        let event = match previous {
            Some(before) => DirectoryEvent::ActualInstanceChanged(ChangeEvent::new(before, record)),
            None => DirectoryEvent::ActualInstanceCreated(record),
        };
        Self::publish(&mut state, Delivery::Event(event));
    }

    /// End every open subscription from the directory side; readers then see `Closed`
    pub fn close_subscriptions(&self) {
        let dropped = std::mem::take(&mut self.state.write().subscribers);
        debug!(subscribers = dropped.len(), "Closing directory subscriptions");
    }

    /// Make every open subscription's next read fail with a stream error
    pub fn inject_stream_error(&self, message: &str) {
        Self::publish(
            &mut self.state.write(),
            Delivery::Error(message.to_string()),
        );
    }

    /// While unavailable, every lookup and subscribe fails with `Unavailable`
    pub fn set_available(&self, available: bool) {
        self.state.write().unavailable = !available;
    }

    pub fn fail_next_subscribes(&self, count: u32) {
        self.state.write().failing_subscribes = count;
    }

    pub fn subscribe_attempts(&self) -> u64 {
        self.counters.subscribe_attempts.load(Ordering::SeqCst)
    }

    /// Subscriptions handed out and not yet closed
    pub fn open_subscriptions(&self) -> usize {
        self.counters.open_subscriptions.load(Ordering::SeqCst)
    }

    fn transition(
        &self,
        process_guid: &str,
        index: u32,
        apply: impl FnOnce(&mut ActualInstanceRecord),
    ) -> Result<ActualInstanceRecord, DirectoryError> {
        let mut state = self.state.write();
        let domain = state
            .desired
            .get(process_guid)
            .map(|desired| desired.domain.clone())
            .ok_or_else(|| DirectoryError::NotFound(process_guid.to_string()))?;

        let slots = state.actual.entry(process_guid.to_string()).or_default();
        let before = slots.get(&index).cloned();

        let mut after = before
            .clone()
            .unwrap_or_else(|| ActualInstanceRecord::unclaimed(process_guid, index, domain));
        apply(&mut after);
        after.since = Utc::now();
        slots.insert(index, after.clone());

        let event = match before {
            Some(before) => {
                DirectoryEvent::ActualInstanceChanged(ChangeEvent::new(before, after.clone()))
            }
            None => DirectoryEvent::ActualInstanceCreated(after.clone()),
        };
        Self::publish(&mut state, Delivery::Event(event));

        Ok(after)
    }

    fn publish(state: &mut DirectoryState, delivery: Delivery) {
        state.subscribers.retain(Subscriber::is_open);

        debug!(
            subscribers = state.subscribers.len(),
            delivery = ?delivery,
            "Publishing directory delivery"
        );

        for subscriber in &state.subscribers {
            let copy = match &delivery {
                Delivery::Event(event) => Delivery::Event(event.clone()),
                Delivery::Error(message) => Delivery::Error(message.clone()),
            };
            let _ = subscriber.sender.send(copy);
        }
    }

    fn check_available(&self) -> Result<(), DirectoryError> {
        if self.state.read().unavailable {
            return Err(DirectoryError::Unavailable(
                "directory is not reachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn desired(&self, process_guid: &str) -> Result<DesiredRecord, DirectoryError> {
        self.check_available()?;
        self.state
            .read()
            .desired
            .get(process_guid)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(process_guid.to_string()))
    }

    async fn actual_instances(
        &self,
        process_guid: &str,
    ) -> Result<Vec<ActualInstanceRecord>, DirectoryError> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .actual
            .get(process_guid)
            .map(|slots| slots.values().cloned().collect())
            .unwrap_or_default())
    }

    /// The attempt is counted only once its outcome is visible: a caller that observes the
    /// new attempt count also observes the new subscription in `open_subscriptions`.
    async fn subscribe(&self) -> Result<Arc<dyn EventSource>, DirectoryError> {
        let mut state = self.state.write();
        let refusal = if state.unavailable {
            Some("directory is not reachable")
        } else if state.failing_subscribes > 0 {
            state.failing_subscribes -= 1;
            Some("subscription refused")
        } else {
            None
        };

        if let Some(reason) = refusal {
            self.counters
                .subscribe_attempts
                .fetch_add(1, Ordering::SeqCst);
            return Err(DirectoryError::Unavailable(reason.to_string()));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        state.subscribers.push(Subscriber {
            sender,
            closed: closed_rx.clone(),
        });
        self.counters
            .open_subscriptions
            .fetch_add(1, Ordering::SeqCst);
        self.counters
            .subscribe_attempts
            .fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(MemoryEventSource {
            receiver: Mutex::new(receiver),
            closed_tx,
            closed_rx,
            counters: self.counters.clone(),
        }))
    }
}

struct MemoryEventSource {
    receiver: Mutex<mpsc::UnboundedReceiver<Delivery>>,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
    counters: Arc<Counters>,
}

#[async_trait]
impl EventSource for MemoryEventSource {
    async fn next(&self) -> Result<DirectoryEvent, EventSourceError> {
        let mut closed = self.closed_rx.clone();
        if *closed.borrow_and_update() {
            return Err(EventSourceError::Closed);
        }

        let mut receiver = self.receiver.lock().await;
        tokio::select! {
            _ = closed.changed() => Err(EventSourceError::Closed),
            delivery = receiver.recv() => match delivery {
                Some(Delivery::Event(event)) => Ok(event),
                Some(Delivery::Error(message)) => Err(EventSourceError::Stream(message)),
                None => Err(EventSourceError::Closed),
            },
        }
    }

    async fn close(&self) -> Result<(), EventSourceError> {
        let was_closed = self.closed_tx.send_replace(true);
        if !was_closed {
            self.counters
                .open_subscriptions
                .fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn directory_with_process() -> InMemoryDirectory {
        let directory = InMemoryDirectory::new();
        directory.desire(DesiredRecord::new("guid", "cf-apps", 3, "log-guid"));
        directory
    }

    #[tokio::test]
    async fn test_lookups() {
        let directory = directory_with_process();
        directory.claim("guid", 0, "instance-0").unwrap();

        let desired = directory.desired("guid").await.unwrap();
        assert_eq!(desired.instances, 3);

        let actual = directory.actual_instances("guid").await.unwrap();
        assert_eq!(actual.len(), 1);
        assert_eq!(actual[0].instance_guid, "instance-0");

        assert_eq!(
            directory.desired("missing").await,
            Err(DirectoryError::NotFound("missing".to_string()))
        );
        assert!(directory.actual_instances("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_directory() {
        let directory = directory_with_process();
        directory.set_available(false);

        assert!(matches!(
            directory.desired("guid").await,
            Err(DirectoryError::Unavailable(_))
        ));
        assert!(directory.subscribe().await.is_err());
        assert_eq!(directory.subscribe_attempts(), 1);
    }

    #[tokio::test]
    async fn test_transitions_are_published() {
        let directory = directory_with_process();
        let source = directory.subscribe().await.unwrap();

        directory
            .start("guid", 1, "instance-1", Placement::new("1.2.3.4", 65100))
            .unwrap();
        directory.crash("guid", 1, "exit status 1").unwrap();

        match source.next().await.unwrap() {
            DirectoryEvent::ActualInstanceCreated(record) => {
                assert_eq!(record.state, InstanceState::Running);
            }
            other => panic!("unexpected event {other:?}"),
        }
        match source.next().await.unwrap() {
            DirectoryEvent::ActualInstanceChanged(change) => {
                assert_eq!(change.before.instance_guid, "instance-1");
                assert_eq!(change.after.crash_count, 1);
                assert_eq!(change.after.state, InstanceState::Crashed);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_wakes_pending_next() {
        let directory = directory_with_process();
        let source = directory.subscribe().await.unwrap();
        assert_eq!(directory.open_subscriptions(), 1);

        let pending = {
            let source = source.clone();
            tokio::spawn(async move { source.next().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        source.close().await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(EventSourceError::Closed));
        assert_eq!(directory.open_subscriptions(), 0);

        source.close().await.unwrap();
        assert_eq!(directory.open_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_injected_stream_error() {
        let directory = directory_with_process();
        let source = directory.subscribe().await.unwrap();
        directory.inject_stream_error("connection reset");

        assert_eq!(
            source.next().await,
            Err(EventSourceError::Stream("connection reset".to_string()))
        );
    }

    #[tokio::test]
    async fn test_directory_side_close_ends_subscription() {
        let directory = directory_with_process();
        let source = directory.subscribe().await.unwrap();

        directory.close_subscriptions();
        assert_eq!(source.next().await, Err(EventSourceError::Closed));

        directory.crash("guid", 0, "exit status 1").ok();
        assert_eq!(source.next().await, Err(EventSourceError::Closed));
    }

    #[tokio::test]
    async fn test_removed_process_is_not_found() {
        let directory = directory_with_process();
        directory.remove_desired("guid");

        assert_eq!(
            directory.desired("guid").await,
            Err(DirectoryError::NotFound("guid".to_string()))
        );
    }

    #[tokio::test]
    async fn test_failing_subscribes_recover() {
        let directory = directory_with_process();
        directory.fail_next_subscribes(2);

        assert!(directory.subscribe().await.is_err());
        assert!(directory.subscribe().await.is_err());
        assert!(directory.subscribe().await.is_ok());
        assert_eq!(directory.subscribe_attempts(), 3);
    }
}
