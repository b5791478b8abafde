use serde::{Deserialize, Serialize};

use super::actual::ActualInstanceRecord;

/// An instance record transition, as a before/after pair of snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub before: ActualInstanceRecord,
    pub after: ActualInstanceRecord,
}

impl ChangeEvent {
    pub fn new(before: ActualInstanceRecord, after: ActualInstanceRecord) -> Self {
        Self { before, after }
    }
}

/// Notifications delivered by a directory subscription
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryEvent {
    ActualInstanceCreated(ActualInstanceRecord),
    ActualInstanceChanged(ChangeEvent),
    ActualInstanceRemoved(ActualInstanceRecord),
}

impl DirectoryEvent {
    /// Wire name used on the directory's event stream
    pub fn event_type(&self) -> &'static str {
        match self {
            DirectoryEvent::ActualInstanceCreated(_) => "actual_lrp_created",
            DirectoryEvent::ActualInstanceChanged(_) => "actual_lrp_changed",
            DirectoryEvent::ActualInstanceRemoved(_) => "actual_lrp_removed",
        }
    }

    pub fn process_guid(&self) -> &str {
        match self {
            DirectoryEvent::ActualInstanceCreated(record)
            | DirectoryEvent::ActualInstanceRemoved(record) => &record.process_guid,
            DirectoryEvent::ActualInstanceChanged(change) => &change.after.process_guid,
        }
    }
}
