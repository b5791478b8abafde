//! # Web API Application State

use std::sync::Arc;

use crate::config::WebConfig;
use crate::status::StatusAggregator;

/// Shared state handed to every handler; clones share the same aggregator
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<WebConfig>,
    pub aggregator: Arc<StatusAggregator>,
}

impl AppState {
    pub fn new(config: WebConfig, aggregator: StatusAggregator) -> Self {
        Self {
            config: Arc::new(config),
            aggregator: Arc::new(aggregator),
        }
    }
}
