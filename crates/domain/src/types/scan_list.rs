//! The per-order, per-direction scan list aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_status_conversions;
use crate::types::direction::ScanDirection;
use crate::types::line_progress::LineProgress;

/// Lifecycle status of a scan list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanListStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl_status_conversions!(ScanListStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

/// Tracking aggregate over required vs. scanned quantities for one order
/// and one movement direction.
///
/// The aggregate owns its [`LineProgress`] records (one per SKU, unique
/// within the list, insertion-ordered) and keeps three derived facts in
/// step after every mutation:
///
/// - `scanned_total` equals the sum of per-line scanned quantities
/// - the list is `Completed` exactly when `required_total > 0` and
///   `scanned_total >= required_total`
/// - a list with zero progress is `Pending` (cancellation is terminal and
///   preserved as-is)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanList {
    pub id: String,
    pub order_id: String,
    pub order_label: String,
    pub direction: ScanDirection,
    pub required_total: u32,
    pub scanned_total: u32,
    pub status: ScanListStatus,
    pub lines: Vec<LineProgress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScanList {
    /// Create a new list from freshly built lines. Totals and status are
    /// derived from the lines immediately.
    #[must_use]
    pub fn new(
        order_id: &str,
        order_label: &str,
        direction: ScanDirection,
        lines: Vec<LineProgress>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut list = Self {
            id: Uuid::now_v7().to_string(),
            order_id: order_id.to_string(),
            order_label: order_label.to_string(),
            direction,
            required_total: 0,
            scanned_total: 0,
            status: ScanListStatus::Pending,
            lines,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        list.recompute(now);
        list
    }

    /// Find a line by SKU.
    #[must_use]
    pub fn line(&self, sku: &str) -> Option<&LineProgress> {
        self.lines.iter().find(|l| l.sku == sku)
    }

    /// Find a line by SKU for mutation.
    pub fn line_mut(&mut self, sku: &str) -> Option<&mut LineProgress> {
        self.lines.iter_mut().find(|l| l.sku == sku)
    }

    /// True when every required unit has been scanned.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.required_total > 0 && self.scanned_total >= self.required_total
    }

    /// Fraction of required units scanned, in `0.0..=1.0`.
    #[must_use]
    pub fn progress_fraction(&self) -> f64 {
        if self.required_total == 0 {
            return 0.0;
        }
        f64::from(self.scanned_total.min(self.required_total)) / f64::from(self.required_total)
    }

    /// Re-derive totals, per-line statuses, list status and `completed_at`
    /// from the owned lines.
    ///
    /// Cancellation is terminal: a cancelled list keeps its status and
    /// whatever history it holds.
    pub fn recompute(&mut self, now: DateTime<Utc>) {
        for line in &mut self.lines {
            line.recompute_status();
        }
        self.required_total = self.lines.iter().map(|l| l.required_qty).sum();
        self.scanned_total = self.lines.iter().map(LineProgress::scanned_qty).sum();

        if self.status != ScanListStatus::Cancelled {
            self.status = if self.is_complete() {
                ScanListStatus::Completed
            } else if self.scanned_total == 0 {
                ScanListStatus::Pending
            } else {
                ScanListStatus::InProgress
            };
        }

        match self.status {
            ScanListStatus::Completed => {
                if self.completed_at.is_none() {
                    self.completed_at = Some(now);
                }
            }
            ScanListStatus::Cancelled => {}
            _ => self.completed_at = None,
        }

        self.updated_at = now;
    }

    /// Check the quantity-sum invariant. Used by tests and the defensive
    /// refresh path; production mutations maintain it via [`Self::recompute`].
    #[must_use]
    pub fn totals_consistent(&self) -> bool {
        self.scanned_total == self.lines.iter().map(LineProgress::scanned_qty).sum::<u32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_754_000_000, 0).unwrap()
    }

    fn list_with_lines(lines: Vec<LineProgress>) -> ScanList {
        ScanList::new("ord-1", "Summer Fest", ScanDirection::DepotToVehicle, lines, now())
    }

    #[test]
    fn new_list_derives_totals() {
        let list = list_with_lines(vec![
            LineProgress::new("SPK-12", "12\" speaker", Some("audio"), 2),
            LineProgress::new("LED-01", "LED par", Some("lighting"), 3),
        ]);
        assert_eq!(list.required_total, 5);
        assert_eq!(list.scanned_total, 0);
        assert_eq!(list.status, ScanListStatus::Pending);
        assert!(list.totals_consistent());
    }

    #[test]
    fn recompute_transitions_status() {
        let mut list = list_with_lines(vec![LineProgress::new("SPK-12", "12\" speaker", None, 2)]);

        list.lines[0].scanned_units.push("U1".into());
        list.recompute(now());
        assert_eq!(list.status, ScanListStatus::InProgress);
        assert!(list.completed_at.is_none());

        list.lines[0].scanned_units.push("U2".into());
        list.recompute(now());
        assert_eq!(list.status, ScanListStatus::Completed);
        assert!(list.completed_at.is_some());

        list.lines[0].scanned_units.pop();
        list.recompute(now());
        assert_eq!(list.status, ScanListStatus::InProgress);
        assert!(list.completed_at.is_none());

        list.lines[0].scanned_units.pop();
        list.recompute(now());
        assert_eq!(list.status, ScanListStatus::Pending);
    }

    #[test]
    fn empty_list_never_completes() {
        let mut list = list_with_lines(Vec::new());
        list.recompute(now());
        assert_eq!(list.required_total, 0);
        assert!(!list.is_complete());
        assert_eq!(list.status, ScanListStatus::Pending);
    }

    #[test]
    fn cancelled_status_is_terminal() {
        let mut list = list_with_lines(vec![LineProgress::new("SPK-12", "12\" speaker", None, 2)]);
        list.status = ScanListStatus::Cancelled;
        list.recompute(now());
        assert_eq!(list.status, ScanListStatus::Cancelled);
    }

    #[test]
    fn progress_fraction_caps_at_one() {
        let mut list = list_with_lines(vec![LineProgress::new("SPK-12", "12\" speaker", None, 2)]);
        assert!((list.progress_fraction() - 0.0).abs() < f64::EPSILON);
        list.lines[0].scanned_units.push("U1".into());
        list.recompute(now());
        assert!((list.progress_fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn ids_are_unique() {
        let a = list_with_lines(Vec::new());
        let b = list_with_lines(Vec::new());
        assert_ne!(a.id, b.id);
    }
}
