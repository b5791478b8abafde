//! In-process telemetry broker keyed by log guid.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Envelope, MetricStream, TelemetryClient, TelemetryError};

#[derive(Debug, Default)]
struct BrokerState {
    envelopes: HashMap<String, Vec<Envelope>>,
    item_delay: Option<Duration>,
    last_auth_token: Option<String>,
}

/// Serves a fixed set of envelopes per log guid.
///
/// Sessions can be made slow (`with_item_delay`), left open after the last envelope
/// (`keep_open`), or refused outright (`set_available(false)`).
#[derive(Debug, Clone)]
pub struct StaticTelemetryClient {
    state: Arc<RwLock<BrokerState>>,
    available: Arc<AtomicBool>,
    keep_open: Arc<AtomicBool>,
    sessions_opened: Arc<AtomicU64>,
}

impl Default for StaticTelemetryClient {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            available: Arc::new(AtomicBool::new(true)),
            keep_open: Arc::new(AtomicBool::new(false)),
            sessions_opened: Arc::default(),
        }
    }
}

impl StaticTelemetryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker that refuses every session
    pub fn unavailable() -> Self {
        let client = Self::default();
        client.set_available(false);
        client
    }

    pub fn with_item_delay(self, delay: Duration) -> Self {
        self.state.write().item_delay = Some(delay);
        self
    }

    pub fn push(&self, log_guid: &str, envelope: Envelope) {
        self.state
            .write()
            .envelopes
            .entry(log_guid.to_string())
            .or_default()
            .push(envelope);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Keep sessions open (never ending) after the queued envelopes are delivered
    pub fn keep_open(&self, keep_open: bool) {
        self.keep_open.store(keep_open, Ordering::SeqCst);
    }

    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn last_auth_token(&self) -> Option<String> {
        self.state.read().last_auth_token.clone()
    }
}

#[async_trait]
impl TelemetryClient for StaticTelemetryClient {
    async fn open_session(
        &self,
        log_guid: &str,
        auth_token: &str,
    ) -> Result<MetricStream, TelemetryError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(TelemetryError::Unavailable(
                "connection refused".to_string(),
            ));
        }
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);

        let (envelopes, item_delay) = {
            let mut state = self.state.write();
            state.last_auth_token = Some(auth_token.to_string());
            (
                state.envelopes.get(log_guid).cloned().unwrap_or_default(),
                state.item_delay,
            )
        };

        let items = stream::iter(envelopes).then(move |envelope| async move {
            if let Some(delay) = item_delay {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, TelemetryError>(envelope)
        });

        if self.keep_open.load(Ordering::SeqCst) {
            Ok(items.chain(stream::pending()).boxed())
        } else {
            Ok(items.boxed())
        }
    }
}
