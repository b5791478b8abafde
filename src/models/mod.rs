//! # Domain Models
//!
//! Records read from the cluster directory, the events it emits, and the values this
//! service derives from them.
//!
//! - [`desired`] - declared process specification ([`DesiredRecord`])
//! - [`actual`] - observed instance slots ([`ActualInstanceRecord`], [`InstanceState`])
//! - [`events`] - directory change notifications ([`DirectoryEvent`], [`ChangeEvent`])
//! - [`crash`] - crash transition detection and the outbound [`CrashReport`]
//! - [`status`] - per-instance output of the status aggregator ([`InstanceStatusView`])

pub mod actual;
pub mod crash;
pub mod desired;
pub mod events;
pub mod status;

pub use actual::{ActualInstanceRecord, InstanceState, Placement};
pub use crash::{CrashReport, CRASH_REASON};
pub use desired::DesiredRecord;
pub use events::{ChangeEvent, DirectoryEvent};
pub use status::{InstanceStatusView, UsageSample};
