//! Dispatcher state and the consecutive next-event error policy.

use std::fmt;
use std::sync::Arc;

use crate::directory::EventSource;

/// Where the dispatcher is in its subscription lifecycle
pub enum WatcherState {
    /// No subscription and none requested. Also the resting state after the source was
    /// closed out from under the watcher.
    Unsubscribed,
    /// A subscribe attempt is in flight
    Subscribing,
    /// Holding a live source with exactly one next-event fetch outstanding
    Subscribed { source: Arc<dyn EventSource> },
}

impl WatcherState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unsubscribed => "unsubscribed",
            Self::Subscribing => "subscribing",
            Self::Subscribed { .. } => "subscribed",
        }
    }

    pub fn source(&self) -> Option<&Arc<dyn EventSource>> {
        match self {
            Self::Subscribed { source } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Debug for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do after a failed next-event fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Fetch again from the same source
    Retry,
    /// Drop the source and subscribe again
    Resubscribe,
}

/// Counts consecutive next-event failures on one source.
///
/// Up to `threshold` failures in a row are retried on the same source; the one after that
/// triggers a resubscribe and starts the count over. A delivered event also starts the count
/// over.
#[derive(Debug, Clone)]
pub struct NextErrorTracker {
    consecutive: u32,
    threshold: u32,
}

impl NextErrorTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    pub fn record_failure(&mut self) -> NextAction {
        self.consecutive += 1;
        if self.consecutive > self.threshold {
            self.consecutive = 0;
            NextAction::Resubscribe
        } else {
            NextAction::Retry
        }
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
