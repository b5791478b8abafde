//! # Cluster Directory Client
//!
//! Read access to desired and actual process records, plus the change-event subscription
//! the crash watcher consumes.
//!
//! - [`DirectoryClient`] - record lookups and `subscribe`
//! - [`EventSource`] - one live subscription; `next` and `close` may race, and `close`
//!   must wake a pending `next` with [`EventSourceError::Closed`]
//! - [`memory::InMemoryDirectory`] - in-process directory with fault injection
//! - [`http::HttpDirectoryClient`] - JSON/SSE client for a remote directory

pub mod http;
pub mod memory;
pub mod sse;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{ActualInstanceRecord, DesiredRecord, DirectoryEvent};

pub use http::HttpDirectoryClient;
pub use memory::InMemoryDirectory;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectoryError {
    #[error("desired record not found: {0}")]
    NotFound(String),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
    #[error("failed to decode directory response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventSourceError {
    #[error("event source closed")]
    Closed,
    #[error("event stream error: {0}")]
    Stream(String),
}

#[async_trait]
pub trait DirectoryClient: Send + Sync + 'static {
    async fn desired(&self, process_guid: &str) -> Result<DesiredRecord, DirectoryError>;

    /// All observed instance records for a process, in no particular order
    async fn actual_instances(
        &self,
        process_guid: &str,
    ) -> Result<Vec<ActualInstanceRecord>, DirectoryError>;

    async fn subscribe(&self) -> Result<Arc<dyn EventSource>, DirectoryError>;
}

#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    async fn next(&self) -> Result<DirectoryEvent, EventSourceError>;

    async fn close(&self) -> Result<(), EventSourceError>;
}
