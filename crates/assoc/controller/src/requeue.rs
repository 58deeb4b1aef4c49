//! Scheduling decisions
//!
//! Every requeue cadence the controller uses is defined here.

use assoc_types::AssociationStatus;
use std::time::Duration;

/// Retry interval for associations waiting on a dependency
pub const REQUEUE_INTERVAL: Duration = Duration::from_secs(10);

/// Check-back interval for paused associations
pub const PAUSE_REQUEUE_INTERVAL: Duration = Duration::from_secs(20);

/// What the dispatch layer should do with a key after a reconcile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    pub requeue: bool,
    pub requeue_after: Option<Duration>,
}

impl ReconcileResult {
    /// Nothing to schedule; wait for the next watch event
    pub fn done() -> Self {
        Self::default()
    }

    pub fn requeue_after(delay: Duration) -> Self {
        Self {
            requeue: true,
            requeue_after: Some(delay),
        }
    }

    pub fn is_done(&self) -> bool {
        !self.requeue && self.requeue_after.is_none()
    }
}

/// Retry shortly; used when bookkeeping or status persistence failed
pub fn default_requeue() -> ReconcileResult {
    ReconcileResult::requeue_after(REQUEUE_INTERVAL)
}

pub fn pause_requeue() -> ReconcileResult {
    ReconcileResult::requeue_after(PAUSE_REQUEUE_INTERVAL)
}

/// Map a freshly computed status to a scheduling decision
pub fn result_from_status(status: AssociationStatus) -> ReconcileResult {
    match status {
        AssociationStatus::Pending => default_requeue(),
        // Done, or nothing more we can do until something changes
        AssociationStatus::Established | AssociationStatus::Failed => ReconcileResult::done(),
        AssociationStatus::Unknown => ReconcileResult::done(),
    }
}
