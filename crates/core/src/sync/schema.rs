//! Remote schema adapter.
//!
//! The remote store keeps flat records: one header row per scan list and one
//! row per line. This module owns the shape translation between the nested
//! [`ScanList`] aggregate and those records, plus the outbox payload
//! builders that snapshot a list at enqueue time. No sync policy lives here.
//!
//! The flat shape does not round-trip everything: headers carry rolled-up
//! counters only, so per-line scanned-unit membership cannot be rebuilt from
//! a header alone. The reconciler's pull path works within that limit.

use chrono::{DateTime, Utc};
use loadout_domain::{LoadoutError, Result, ScanList, SyncOperation, SyncOutboxEntry};
use serde::{Deserialize, Serialize};

/// Remote collection holding scan-list header records.
pub const SCAN_LISTS_COLLECTION: &str = "scan_lists";

/// Remote collection holding per-line records.
pub const SCAN_LIST_LINES_COLLECTION: &str = "scan_list_lines";

/// Remote collection holding bulk-stock catalog records.
pub const STOCK_ITEMS_COLLECTION: &str = "stock_items";

/// Flat header record for one scan list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteListRecord {
    pub id: String,
    pub order_id: String,
    pub order_label: String,
    pub direction: String,
    pub required_total: u32,
    pub scanned_total: u32,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

/// Flat record for one line within a scan list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLineRecord {
    pub id: String,
    pub list_id: String,
    pub order_id: String,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub required_qty: u32,
    pub scanned_qty: u32,
    pub scanned_units: Vec<String>,
    pub item_status: String,
    pub last_scanned_at: Option<i64>,
}

/// A scan list flattened for transport: header plus line records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedScanList {
    pub header: RemoteListRecord,
    pub lines: Vec<RemoteLineRecord>,
}

/// Identifier of a remote line record, unique per (list, SKU).
#[must_use]
pub fn line_record_id(list_id: &str, sku: &str) -> String {
    format!("{list_id}:{sku}")
}

/// Flatten a scan list into its remote records.
#[must_use]
pub fn flatten(list: &ScanList) -> FlattenedScanList {
    let header = RemoteListRecord {
        id: list.id.clone(),
        order_id: list.order_id.clone(),
        order_label: list.order_label.clone(),
        direction: list.direction.to_string(),
        required_total: list.required_total,
        scanned_total: list.scanned_total,
        status: list.status.to_string(),
        created_at: list.created_at.timestamp(),
        updated_at: list.updated_at.timestamp(),
        completed_at: list.completed_at.map(|t| t.timestamp()),
    };

    let lines = list
        .lines
        .iter()
        .map(|line| RemoteLineRecord {
            id: line_record_id(&list.id, &line.sku),
            list_id: list.id.clone(),
            order_id: list.order_id.clone(),
            sku: line.sku.clone(),
            name: line.display_name.clone(),
            category: line.category.clone(),
            required_qty: line.required_qty,
            scanned_qty: line.scanned_qty(),
            scanned_units: line.scanned_units.clone(),
            item_status: line.item_status.to_string(),
            last_scanned_at: line.last_scanned_at.map(|t| t.timestamp()),
        })
        .collect();

    FlattenedScanList { header, lines }
}

/// Build the outbox entry for an incremental push of one scan list.
pub fn upsert_entry(list: &ScanList, now: DateTime<Utc>) -> Result<SyncOutboxEntry> {
    let payload = serde_json::to_string(&flatten(list))
        .map_err(|e| LoadoutError::Internal(format!("serialize scan list {}: {e}", list.id)))?;
    Ok(SyncOutboxEntry::new(
        SyncOperation::UpsertList { list_id: list.id.clone() },
        payload,
        now.timestamp(),
    ))
}

/// Build the outbox entry for a full replace of an order's scan lists.
pub fn replace_entry(
    order_id: &str,
    lists: &[ScanList],
    now: DateTime<Utc>,
) -> Result<SyncOutboxEntry> {
    let flattened: Vec<FlattenedScanList> = lists.iter().map(flatten).collect();
    let payload = serde_json::to_string(&flattened)
        .map_err(|e| LoadoutError::Internal(format!("serialize order {order_id}: {e}")))?;
    Ok(SyncOutboxEntry::new(
        SyncOperation::ReplaceOrder { order_id: order_id.to_string() },
        payload,
        now.timestamp(),
    ))
}

/// Epoch seconds back to a UTC timestamp; rejects out-of-range values.
pub fn timestamp_from_epoch(epoch: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0)
        .ok_or_else(|| LoadoutError::InvalidInput(format!("timestamp out of range: {epoch}")))
}

#[cfg(test)]
mod tests {
    use loadout_domain::{LineProgress, ScanDirection};

    use super::*;

    fn sample_list() -> ScanList {
        let now = DateTime::from_timestamp(1_754_000_000, 0).unwrap();
        let mut list = ScanList::new(
            "ord-1",
            "Summer Fest",
            ScanDirection::VehicleToEvent,
            vec![
                LineProgress::new("SPK-12", "12\" speaker", Some("audio"), 2),
                LineProgress::new("CABLE-10M", "10m cable", None, 3),
            ],
            now,
        );
        list.lines[0].scanned_units.push("U1".into());
        list.recompute(now);
        list
    }

    #[test]
    fn flatten_produces_header_and_line_records() {
        let list = sample_list();
        let flat = flatten(&list);

        assert_eq!(flat.header.id, list.id);
        assert_eq!(flat.header.direction, "vehicle_to_event");
        assert_eq!(flat.header.status, "in_progress");
        assert_eq!(flat.header.required_total, 5);
        assert_eq!(flat.header.scanned_total, 1);

        assert_eq!(flat.lines.len(), 2);
        assert_eq!(flat.lines[0].id, line_record_id(&list.id, "SPK-12"));
        assert_eq!(flat.lines[0].order_id, "ord-1");
        assert_eq!(flat.lines[0].scanned_qty, 1);
        assert_eq!(flat.lines[0].scanned_units, vec!["U1".to_string()]);
        assert_eq!(flat.lines[1].scanned_qty, 0);
        assert_eq!(flat.lines[1].item_status, "pending");
    }

    #[test]
    fn upsert_entry_snapshots_full_state() {
        let list = sample_list();
        let entry = upsert_entry(&list, Utc::now()).unwrap();

        assert_eq!(entry.operation, SyncOperation::UpsertList { list_id: list.id.clone() });
        let decoded: FlattenedScanList = serde_json::from_str(&entry.payload_json).unwrap();
        assert_eq!(decoded, flatten(&list));
    }

    #[test]
    fn replace_entry_snapshots_every_list() {
        let list = sample_list();
        let entry = replace_entry("ord-1", std::slice::from_ref(&list), Utc::now()).unwrap();

        assert_eq!(entry.operation, SyncOperation::ReplaceOrder { order_id: "ord-1".into() });
        let decoded: Vec<FlattenedScanList> = serde_json::from_str(&entry.payload_json).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].header.id, list.id);
    }

    #[test]
    fn epoch_roundtrip() {
        let ts = timestamp_from_epoch(1_754_000_000).unwrap();
        assert_eq!(ts.timestamp(), 1_754_000_000);
        assert!(timestamp_from_epoch(i64::MAX).is_err());
    }
}
