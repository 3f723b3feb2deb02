//! Bulk stock catalog records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bulk (non-serialized) SKU in the stock catalog.
///
/// Stock items are mutable catalog records edited on multiple devices; the
/// reconciler merges remote copies into the local cache with last-write-wins
/// on `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// True when `other` (a remote copy) is strictly newer than this record.
    #[must_use]
    pub fn is_older_than(&self, other: &Self) -> bool {
        self.updated_at < other.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(updated_at_epoch: i64) -> StockItem {
        let ts = DateTime::from_timestamp(updated_at_epoch, 0).unwrap();
        StockItem {
            id: "stk-1".into(),
            sku: "CABLE-10M".into(),
            name: "10m power cable".into(),
            category: Some("power".into()),
            quantity: 40,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn newer_remote_wins() {
        assert!(item(100).is_older_than(&item(200)));
        assert!(!item(200).is_older_than(&item(100)));
        assert!(!item(100).is_older_than(&item(100)));
    }
}
