//! Aggregate sync observability.
//!
//! Scan callers never see synchronization failures; what the presentation
//! layer gets instead is this tracker: the time of the last successful
//! remote exchange and a bounded list of recent faults keyed by record id,
//! enough for a manual retry sweep to find its targets.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use loadout_domain::constants::MAX_TRACKED_SYNC_FAULTS;
use serde::{Deserialize, Serialize};

/// One recorded synchronization fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFault {
    pub record_id: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct HealthInner {
    last_success: Option<DateTime<Utc>>,
    faults: Vec<SyncFault>,
}

/// Thread-safe last-success / fault-list tracker owned by the reconciler.
#[derive(Debug, Default)]
pub struct SyncHealth {
    inner: Mutex<HealthInner>,
}

impl SyncHealth {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful remote exchange.
    pub fn record_success(&self, at: DateTime<Utc>) {
        let mut inner = self.lock();
        inner.last_success = Some(at);
    }

    /// Record a fault for `record_id`; the oldest fault is dropped once the
    /// list is full.
    pub fn record_fault(&self, record_id: &str, message: &str, at: DateTime<Utc>) {
        let mut inner = self.lock();
        if inner.faults.len() >= MAX_TRACKED_SYNC_FAULTS {
            inner.faults.remove(0);
        }
        inner.faults.push(SyncFault {
            record_id: record_id.to_string(),
            message: message.to_string(),
            at,
        });
    }

    /// Time of the last successful remote exchange, if any.
    #[must_use]
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.lock().last_success
    }

    /// Snapshot of the recorded faults, oldest first.
    #[must_use]
    pub fn faults(&self) -> Vec<SyncFault> {
        self.lock().faults.clone()
    }

    /// Drop all recorded faults (e.g. after a successful retry sweep).
    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HealthInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(epoch: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(epoch, 0).unwrap()
    }

    #[test]
    fn tracks_last_success() {
        let health = SyncHealth::new();
        assert!(health.last_success().is_none());

        health.record_success(at(100));
        health.record_success(at(200));
        assert_eq!(health.last_success(), Some(at(200)));
    }

    #[test]
    fn fault_list_is_bounded() {
        let health = SyncHealth::new();
        for i in 0..(MAX_TRACKED_SYNC_FAULTS + 5) {
            health.record_fault(&format!("rec-{i}"), "push failed", at(i as i64));
        }

        let faults = health.faults();
        assert_eq!(faults.len(), MAX_TRACKED_SYNC_FAULTS);
        // Oldest entries were dropped first.
        assert_eq!(faults[0].record_id, "rec-5");
    }

    #[test]
    fn clear_faults_empties_the_list() {
        let health = SyncHealth::new();
        health.record_fault("rec-1", "boom", at(1));
        health.clear_faults();
        assert!(health.faults().is_empty());
    }
}
