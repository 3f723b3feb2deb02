//! Per-SKU progress records inside a scan list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_status_conversions;

/// Progress status of a single line within a scan list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Partial,
    Completed,
}

impl_status_conversions!(ItemStatus {
    Pending => "pending",
    Partial => "partial",
    Completed => "completed",
});

/// Per-SKU progress record owned by a [`crate::ScanList`].
///
/// `scanned_units` has set semantics (no duplicate identifiers) but keeps
/// insertion order so manual corrections can undo the most recent addition
/// first. Scanned quantity is always derived from the membership, never
/// stored independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineProgress {
    pub sku: String,
    pub display_name: String,
    pub category: Option<String>,
    pub required_qty: u32,
    pub scanned_units: Vec<String>,
    pub item_status: ItemStatus,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl LineProgress {
    /// Create a fresh line with no scan progress.
    #[must_use]
    pub fn new(sku: &str, display_name: &str, category: Option<&str>, required_qty: u32) -> Self {
        Self {
            sku: sku.to_string(),
            display_name: display_name.to_string(),
            category: category.map(ToString::to_string),
            required_qty,
            scanned_units: Vec::new(),
            item_status: ItemStatus::Pending,
            last_scanned_at: None,
        }
    }

    /// Number of units scanned against this line.
    #[must_use]
    pub fn scanned_qty(&self) -> u32 {
        u32::try_from(self.scanned_units.len()).unwrap_or(u32::MAX)
    }

    /// True when `unit_id` is already a member of this line.
    #[must_use]
    pub fn contains_unit(&self, unit_id: &str) -> bool {
        self.scanned_units.iter().any(|u| u == unit_id)
    }

    /// True when the line has reached its required quantity.
    #[must_use]
    pub fn at_capacity(&self) -> bool {
        self.scanned_qty() >= self.required_qty
    }

    /// Re-derive `item_status` from the current membership.
    ///
    /// A line only completes when it has a nonzero requirement; zero-quantity
    /// lines stay pending.
    pub fn recompute_status(&mut self) {
        self.item_status = if self.required_qty > 0 && self.scanned_qty() >= self.required_qty {
            ItemStatus::Completed
        } else if self.scanned_qty() == 0 {
            ItemStatus::Pending
        } else {
            ItemStatus::Partial
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_line_starts_pending() {
        let line = LineProgress::new("SPK-12", "12\" speaker", Some("audio"), 2);
        assert_eq!(line.scanned_qty(), 0);
        assert_eq!(line.item_status, ItemStatus::Pending);
        assert!(line.last_scanned_at.is_none());
    }

    #[test]
    fn status_thresholds() {
        let mut line = LineProgress::new("SPK-12", "12\" speaker", None, 2);

        line.scanned_units.push("U1".into());
        line.recompute_status();
        assert_eq!(line.item_status, ItemStatus::Partial);

        line.scanned_units.push("U2".into());
        line.recompute_status();
        assert_eq!(line.item_status, ItemStatus::Completed);

        line.scanned_units.clear();
        line.recompute_status();
        assert_eq!(line.item_status, ItemStatus::Pending);
    }

    #[test]
    fn zero_quantity_line_never_completes() {
        let mut line = LineProgress::new("CABLE-10M", "10m cable", None, 0);
        line.recompute_status();
        assert_eq!(line.item_status, ItemStatus::Pending);
        assert!(line.at_capacity());
    }
}
