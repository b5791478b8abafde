//! # Status Aggregator
//!
//! Builds the per-instance view of a process from the directory, optionally enriched with
//! resource usage from the telemetry broker.
//!
//! ## Reconciliation
//!
//! The output always has the declared shape: one view per index in `[0, instances)`. Observed
//! records outside that range are ignored. When the directory reports more than one record for
//! an index, the running one is shown; otherwise the first one seen. Slots with no record get a
//! `Starting` placeholder with no instance guid, placement or usage.
//!
//! ## Enrichment
//!
//! Usage samples are drained from one telemetry session for at most the drain window. Session
//! failures never fail the request; views are returned without usage instead.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::directory::DirectoryClient;
use crate::error::{TpsError, TpsResult};
use crate::models::{ActualInstanceRecord, DesiredRecord, InstanceStatusView, UsageSample};
use crate::telemetry::{TelemetryClient, TelemetryError};

fn require_guid(process_guid: &str) -> TpsResult<()> {
    if process_guid.trim().is_empty() {
        return Err(TpsError::InvalidInput(
            "process guid must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Reconcile the declared instance count against observed records, ordered by index
pub fn reconcile(
    desired: &DesiredRecord,
    actuals: &[ActualInstanceRecord],
    now: DateTime<Utc>,
) -> Vec<InstanceStatusView> {
    let mut observed: BTreeMap<u32, &ActualInstanceRecord> = BTreeMap::new();

    for record in actuals.iter().filter(|r| r.index < desired.instances) {
        match observed.entry(record.index) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if record.is_running() && !slot.get().is_running() {
                    slot.insert(record);
                }
            }
        }
    }

    (0..desired.instances)
        .map(|index| match observed.get(&index) {
            Some(record) => InstanceStatusView::from_actual(record),
            None => InstanceStatusView::placeholder(&desired.process_guid, index, now),
        })
        .collect()
}

/// Attach samples to the views with matching indices; unmatched samples are dropped
pub fn merge_usage(views: &mut [InstanceStatusView], mut samples: HashMap<u32, UsageSample>) {
    for view in views.iter_mut() {
        if let Some(sample) = samples.remove(&view.index) {
            view.usage = Some(sample);
        }
    }
}

pub struct StatusAggregator {
    directory: Arc<dyn DirectoryClient>,
    telemetry: Arc<dyn TelemetryClient>,
    drain_window: Duration,
    bulk_workers: usize,
}

impl std::fmt::Debug for StatusAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusAggregator")
            .field("drain_window", &self.drain_window)
            .field("bulk_workers", &self.bulk_workers)
            .finish()
    }
}

impl StatusAggregator {
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        telemetry: Arc<dyn TelemetryClient>,
        drain_window: Duration,
        bulk_workers: usize,
    ) -> Self {
        Self {
            directory,
            telemetry,
            drain_window,
            bulk_workers: bulk_workers.max(1),
        }
    }

    pub async fn instance_status(&self, process_guid: &str) -> TpsResult<Vec<InstanceStatusView>> {
        require_guid(process_guid)?;
        let desired = self.directory.desired(process_guid).await?;
        self.reconciled(&desired).await
    }

    /// Status with usage attached where the broker delivered a sample within the drain window
    pub async fn instance_status_with_stats(
        &self,
        process_guid: &str,
        auth_token: &str,
    ) -> TpsResult<Vec<InstanceStatusView>> {
        require_guid(process_guid)?;
        let desired = self.directory.desired(process_guid).await?;
        let mut views = self.reconciled(&desired).await?;

        match self.collect_usage(&desired.log_guid, auth_token).await {
            Ok(samples) => {
                debug!(
                    process_guid = %process_guid,
                    samples = samples.len(),
                    "Merging usage samples"
                );
                merge_usage(&mut views, samples);
            }
            Err(e) => {
                warn!(
                    process_guid = %process_guid,
                    log_guid = %desired.log_guid,
                    error = %e,
                    "Telemetry unavailable, returning status without stats"
                );
            }
        }

        Ok(views)
    }

    /// Status for each distinct guid; guids that fail are left out of the result
    pub async fn bulk_status(
        &self,
        process_guids: &[String],
    ) -> HashMap<String, Vec<InstanceStatusView>> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = process_guids
            .iter()
            .filter(|guid| seen.insert(guid.as_str()))
            .cloned()
            .collect();

        stream::iter(unique)
            .map(|guid| async move {
                let result = self.instance_status(&guid).await;
                (guid, result)
            })
            .buffer_unordered(self.bulk_workers)
            .filter_map(|(guid, result)| async move {
                match result {
                    Ok(views) => Some((guid, views)),
                    Err(e) if e.is_client_error() => {
                        debug!(process_guid = %guid, error = %e, "Omitting process from bulk status");
                        None
                    }
                    Err(e) => {
                        warn!(
                            process_guid = %guid,
                            error = %e,
                            "Omitting process from bulk status"
                        );
                        None
                    }
                }
            })
            .collect()
            .await
    }

    async fn reconciled(&self, desired: &DesiredRecord) -> TpsResult<Vec<InstanceStatusView>> {
        let actuals = self
            .directory
            .actual_instances(&desired.process_guid)
            .await?;
        Ok(reconcile(desired, &actuals, Utc::now()))
    }

    /// Drain one session until it ends or the window closes, keeping the last sample per index
    async fn collect_usage(
        &self,
        log_guid: &str,
        auth_token: &str,
    ) -> Result<HashMap<u32, UsageSample>, TelemetryError> {
        let deadline = Instant::now() + self.drain_window;

        let mut session = timeout_at(deadline, self.telemetry.open_session(log_guid, auth_token))
            .await
            .map_err(|_| {
                TelemetryError::Unavailable("session not established within drain window".to_string())
            })??;

        let mut samples = HashMap::new();
        loop {
            match timeout_at(deadline, session.next()).await {
                Err(_) => {
                    debug!(log_guid = %log_guid, "Drain window elapsed");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Ok(envelope))) => {
                    if let Some((index, sample)) = envelope.usage_sample() {
                        samples.insert(index, sample);
                    }
                }
                Ok(Some(Err(e))) => {
                    debug!(log_guid = %log_guid, error = %e, "Skipping undecodable envelope");
                }
            }
        }

        Ok(samples)
    }
}
