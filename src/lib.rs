#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # TPS Core
//!
//! Instance status and crash reporting for a cluster orchestrator of long-running processes.
//!
//! ## Overview
//!
//! Two subsystems sit between the cluster directory, the telemetry broker and the platform:
//!
//! - The **crash watcher** keeps a subscription to the directory's change stream, spots
//!   crash transitions, and reports them through a bounded [`work_pool::WorkPool`].
//! - The **status aggregator** rebuilds the per-instance view of a process from its declared
//!   and observed records, optionally enriched with live usage from the telemetry broker.
//!
//! ## Module Organization
//!
//! - [`models`] - directory records, change events, crash reports, status views
//! - [`directory`] - directory client trait with in-memory and HTTP implementations
//! - [`telemetry`] - telemetry broker client trait and envelope decoding
//! - [`notifier`] - crash report sink
//! - [`watcher`] - crash watcher state machine
//! - [`status`] - status aggregator
//! - [`work_pool`] - bounded fire-and-forget executor
//! - [`web`] - axum HTTP surface
//! - [`config`] - layered configuration
//! - [`logging`] - tracing subscriber setup
//! - [`error`] - error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tps_core::config::TpsConfig;
//! use tps_core::directory::InMemoryDirectory;
//! use tps_core::notifier::RecordingNotifier;
//! use tps_core::watcher::Watcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TpsConfig::default();
//! let watcher = Watcher::new(
//!     Arc::new(InMemoryDirectory::new()),
//!     Arc::new(RecordingNotifier::new()),
//!     &config.watcher,
//! )?;
//!
//! let handle = watcher.spawn();
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod models;
pub mod notifier;
pub mod status;
pub mod telemetry;
pub mod watcher;
pub mod web;
pub mod work_pool;

pub use crate::config::TpsConfig;
pub use error::{TpsError, TpsResult};
