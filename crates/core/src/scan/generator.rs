//! Checklist generation from finalized orders.
//!
//! An order that reaches the finalized state gets one scan list per tracked
//! direction. Regeneration is deliberately destructive: prior lists for the
//! order, including any scan progress, are deleted and replaced, so a
//! changed quote always yields checklists that reflect the new quantities.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use loadout_domain::{
    LineProgress, LoadoutError, OrderLineItem, OrderRef, Result, ScanDirection, ScanError,
    ScanList, SyncOperation, SyncOutboxEntry,
};
use tracing::{info, warn};

use super::ports::{OrderSource, PermissionChecker, Session};
use super::{PERM_ACTION_WRITE, PERM_SUBJECT_SCAN_LISTS};
use crate::sync::ports::{OutboxQueue, ScanListStore};
use crate::sync::schema;

/// Build fresh line records from order line items.
///
/// Duplicate SKUs are aggregated by summing quantities, preserving
/// first-seen order, so lines stay unique per SKU within a list.
#[must_use]
pub fn build_lines(line_items: &[OrderLineItem]) -> Vec<LineProgress> {
    let mut merged: Vec<OrderLineItem> = Vec::new();
    for item in line_items {
        if let Some(existing) = merged.iter_mut().find(|m| m.sku == item.sku) {
            existing.quantity += item.quantity;
        } else {
            merged.push(item.clone());
        }
    }

    merged
        .iter()
        .map(|item| LineProgress::new(&item.sku, &item.name, item.category.as_deref(), item.quantity))
        .collect()
}

/// Build one scan list per direction from order line items.
///
/// `directions` defaults to all four legs when empty; duplicates are
/// ignored. Fails with `OrderNotFinalized` or `EmptyOrder` before building
/// anything.
pub fn build_scan_lists(
    order: &OrderRef,
    line_items: &[OrderLineItem],
    directions: &[ScanDirection],
    now: DateTime<Utc>,
) -> std::result::Result<Vec<ScanList>, ScanError> {
    if !order.finalized {
        return Err(ScanError::OrderNotFinalized);
    }
    if line_items.is_empty() {
        return Err(ScanError::EmptyOrder);
    }

    let mut selected: Vec<ScanDirection> = Vec::new();
    let source = if directions.is_empty() { &ScanDirection::ALL[..] } else { directions };
    for dir in source {
        if !selected.contains(dir) {
            selected.push(*dir);
        }
    }

    Ok(selected
        .into_iter()
        .map(|direction| {
            ScanList::new(&order.id, &order.label, direction, build_lines(line_items), now)
        })
        .collect())
}

/// Service that regenerates an order's scan lists and kicks off the
/// full-replace sync.
pub struct GenerationService {
    orders: Arc<dyn OrderSource>,
    store: Arc<dyn ScanListStore>,
    outbox: Arc<dyn OutboxQueue>,
    permissions: Arc<dyn PermissionChecker>,
    session: Arc<dyn Session>,
}

impl GenerationService {
    /// Create a new generation service
    pub fn new(
        orders: Arc<dyn OrderSource>,
        store: Arc<dyn ScanListStore>,
        outbox: Arc<dyn OutboxQueue>,
        permissions: Arc<dyn PermissionChecker>,
        session: Arc<dyn Session>,
    ) -> Self {
        Self { orders, store, outbox, permissions, session }
    }

    /// Regenerate all scan lists for a finalized order.
    ///
    /// Every existing list for the order is deleted (local, with line
    /// records cascading in the same transaction) and replaced by the new
    /// set; a full-replace sync job is enqueued afterwards. Any prior scan
    /// progress is discarded by design.
    pub async fn regenerate(&self, order: &OrderRef) -> Result<Vec<ScanList>> {
        if !self
            .permissions
            .has_permission(PERM_SUBJECT_SCAN_LISTS, PERM_ACTION_WRITE)
            .await?
        {
            return Err(LoadoutError::PermissionDenied(format!(
                "{PERM_SUBJECT_SCAN_LISTS}:{PERM_ACTION_WRITE}"
            )));
        }

        let line_items = self.orders.get_line_items(&order.id).await?;
        let directions = self.orders.get_selected_directions(&order.id).await?;

        let now = Utc::now();
        let lists = build_scan_lists(order, &line_items, &directions, now)?;

        self.store.replace_for_order(&order.id, &lists).await?;
        info!(
            order_id = %order.id,
            count = lists.len(),
            user = self.session.current_user_id().as_deref().unwrap_or("-"),
            "scan lists regenerated"
        );

        // Remote propagation is best-effort; a failed enqueue must not
        // surface to the caller.
        match schema::replace_entry(&order.id, &lists, now) {
            Ok(entry) => {
                if let Err(err) = self.outbox.enqueue(&entry).await {
                    warn!(order_id = %order.id, error = %err, "failed to enqueue replace sync");
                }
            }
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "failed to build replace sync entry");
            }
        }

        Ok(lists)
    }

    /// Delete every scan list for an order.
    ///
    /// Local headers and line records go in one transaction; one remote
    /// delete job per list is enqueued afterwards. Returns the number of
    /// lists removed locally.
    pub async fn delete_order(&self, order_id: &str) -> Result<usize> {
        if !self
            .permissions
            .has_permission(PERM_SUBJECT_SCAN_LISTS, PERM_ACTION_WRITE)
            .await?
        {
            return Err(LoadoutError::PermissionDenied(format!(
                "{PERM_SUBJECT_SCAN_LISTS}:{PERM_ACTION_WRITE}"
            )));
        }

        let lists = self.store.list_for_order(order_id).await?;
        let removed = self.store.delete_for_order(order_id).await?;
        info!(order_id = %order_id, count = removed, "scan lists deleted");

        for list in &lists {
            let entry = SyncOutboxEntry::new(
                SyncOperation::DeleteList { list_id: list.id.clone() },
                String::new(),
                Utc::now().timestamp(),
            );
            if let Err(err) = self.outbox.enqueue(&entry).await {
                warn!(list_id = %list.id, error = %err, "failed to enqueue delete sync");
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use loadout_domain::{ScanListStatus, SyncOperation, SyncOutboxEntry};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_754_000_000, 0).unwrap()
    }

    fn items() -> Vec<OrderLineItem> {
        vec![
            OrderLineItem::new("SPK-12", "12\" speaker", Some("audio"), 2),
            OrderLineItem::new("CABLE-10M", "10m cable", Some("power"), 5),
        ]
    }

    #[test]
    fn generates_one_list_per_direction() {
        let order = OrderRef::finalized("ord-1", "Summer Fest");
        let lists = build_scan_lists(&order, &items(), &[], now()).unwrap();

        assert_eq!(lists.len(), 4);
        for (list, direction) in lists.iter().zip(ScanDirection::ALL) {
            assert_eq!(list.direction, direction);
            assert_eq!(list.order_id, "ord-1");
            assert_eq!(list.required_total, 7);
            assert_eq!(list.scanned_total, 0);
            assert_eq!(list.status, ScanListStatus::Pending);
            assert_eq!(list.lines.len(), 2);
        }
    }

    #[test]
    fn respects_selected_directions() {
        let order = OrderRef::finalized("ord-1", "Summer Fest");
        let dirs = [ScanDirection::DepotToVehicle, ScanDirection::VehicleToDepot];
        let lists = build_scan_lists(&order, &items(), &dirs, now()).unwrap();

        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].direction, ScanDirection::DepotToVehicle);
        assert_eq!(lists[1].direction, ScanDirection::VehicleToDepot);
    }

    #[test]
    fn duplicate_directions_are_ignored() {
        let order = OrderRef::finalized("ord-1", "Summer Fest");
        let dirs = [ScanDirection::DepotToVehicle, ScanDirection::DepotToVehicle];
        let lists = build_scan_lists(&order, &items(), &dirs, now()).unwrap();
        assert_eq!(lists.len(), 1);
    }

    #[test]
    fn unfinalized_order_is_rejected() {
        let order = OrderRef { id: "ord-1".into(), label: "Summer Fest".into(), finalized: false };
        let err = build_scan_lists(&order, &items(), &[], now()).unwrap_err();
        assert_eq!(err, ScanError::OrderNotFinalized);
    }

    #[test]
    fn empty_order_is_rejected() {
        let order = OrderRef::finalized("ord-1", "Summer Fest");
        let err = build_scan_lists(&order, &[], &[], now()).unwrap_err();
        assert_eq!(err, ScanError::EmptyOrder);
    }

    #[test]
    fn duplicate_skus_are_aggregated() {
        let lines = build_lines(&[
            OrderLineItem::new("SPK-12", "12\" speaker", Some("audio"), 2),
            OrderLineItem::new("LED-01", "LED par", None, 1),
            OrderLineItem::new("SPK-12", "12\" speaker", Some("audio"), 3),
        ]);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].sku, "SPK-12");
        assert_eq!(lines[0].required_qty, 5);
        assert_eq!(lines[1].sku, "LED-01");
    }

    // --- service-level tests ---------------------------------------------

    struct StubOrders {
        items: Vec<OrderLineItem>,
        directions: Vec<ScanDirection>,
    }

    #[async_trait]
    impl OrderSource for StubOrders {
        async fn get_line_items(&self, _order_id: &str) -> Result<Vec<OrderLineItem>> {
            Ok(self.items.clone())
        }

        async fn get_selected_directions(&self, _order_id: &str) -> Result<Vec<ScanDirection>> {
            Ok(self.directions.clone())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        lists: StdMutex<Vec<ScanList>>,
        replaced: StdMutex<Vec<(String, Vec<ScanList>)>>,
    }

    #[async_trait]
    impl ScanListStore for RecordingStore {
        async fn get(&self, list_id: &str) -> Result<Option<ScanList>> {
            Ok(self.lists.lock().unwrap().iter().find(|l| l.id == list_id).cloned())
        }

        async fn list_for_order(&self, order_id: &str) -> Result<Vec<ScanList>> {
            Ok(self
                .lists
                .lock()
                .unwrap()
                .iter()
                .filter(|l| l.order_id == order_id)
                .cloned()
                .collect())
        }

        async fn upsert(&self, list: &ScanList) -> Result<()> {
            let mut lists = self.lists.lock().unwrap();
            lists.retain(|l| l.id != list.id);
            lists.push(list.clone());
            Ok(())
        }

        async fn delete_for_order(&self, order_id: &str) -> Result<usize> {
            let mut lists = self.lists.lock().unwrap();
            let before = lists.len();
            lists.retain(|l| l.order_id != order_id);
            Ok(before - lists.len())
        }

        async fn replace_for_order(&self, order_id: &str, new_lists: &[ScanList]) -> Result<()> {
            self.replaced
                .lock()
                .unwrap()
                .push((order_id.to_string(), new_lists.to_vec()));
            let mut lists = self.lists.lock().unwrap();
            lists.retain(|l| l.order_id != order_id);
            lists.extend_from_slice(new_lists);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingOutbox {
        entries: StdMutex<Vec<SyncOutboxEntry>>,
        fail_enqueue: bool,
    }

    #[async_trait]
    impl OutboxQueue for RecordingOutbox {
        async fn enqueue(&self, entry: &SyncOutboxEntry) -> Result<()> {
            if self.fail_enqueue {
                return Err(LoadoutError::Database("outbox unavailable".into()));
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn dequeue_due(&self, _now: i64, _limit: usize) -> Result<Vec<SyncOutboxEntry>> {
            Ok(Vec::new())
        }

        async fn mark_sent(&self, _id: &str, _sent_at: i64) -> Result<()> {
            Ok(())
        }

        async fn mark_failed(
            &self,
            _id: &str,
            _error: &str,
            _next_attempt_at: Option<i64>,
        ) -> Result<()> {
            Ok(())
        }

        async fn dead_letters(&self) -> Result<Vec<SyncOutboxEntry>> {
            Ok(Vec::new())
        }

        async fn requeue(&self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    struct StubPermissions {
        allow: bool,
    }

    #[async_trait]
    impl PermissionChecker for StubPermissions {
        async fn has_permission(&self, _subject: &str, _action: &str) -> Result<bool> {
            Ok(self.allow)
        }
    }

    struct TestSession;

    impl Session for TestSession {
        fn current_user_id(&self) -> Option<String> {
            Some("user-1".into())
        }
    }

    fn service(
        directions: Vec<ScanDirection>,
        allow: bool,
    ) -> (GenerationService, Arc<RecordingStore>, Arc<RecordingOutbox>) {
        let store = Arc::new(RecordingStore::default());
        let outbox = Arc::new(RecordingOutbox::default());
        let svc = GenerationService::new(
            Arc::new(StubOrders { items: items(), directions }),
            store.clone(),
            outbox.clone(),
            Arc::new(StubPermissions { allow }),
            Arc::new(TestSession),
        );
        (svc, store, outbox)
    }

    #[tokio::test]
    async fn regenerate_replaces_and_enqueues_full_sync() {
        let order = OrderRef::finalized("ord-1", "Summer Fest");
        let (svc, store, outbox) = service(vec![ScanDirection::DepotToVehicle], true);

        let lists = svc.regenerate(&order).await.unwrap();
        assert_eq!(lists.len(), 1);

        let replaced = store.replaced.lock().unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].0, "ord-1");

        let entries = outbox.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].operation,
            SyncOperation::ReplaceOrder { order_id: "ord-1".into() }
        );
    }

    #[tokio::test]
    async fn regenerate_discards_prior_progress() {
        let order = OrderRef::finalized("ord-1", "Summer Fest");
        let (svc, _store, _outbox) = service(vec![ScanDirection::DepotToVehicle], true);

        let first = svc.regenerate(&order).await.unwrap();
        let second = svc.regenerate(&order).await.unwrap();

        assert_ne!(first[0].id, second[0].id);
        assert_eq!(second[0].scanned_total, 0);
        assert_eq!(second[0].status, ScanListStatus::Pending);
    }

    #[tokio::test]
    async fn regenerate_requires_permission() {
        let order = OrderRef::finalized("ord-1", "Summer Fest");
        let (svc, store, _outbox) = service(vec![], false);

        let err = svc.regenerate(&order).await.unwrap_err();
        assert!(matches!(err, LoadoutError::PermissionDenied(_)));
        assert!(store.replaced.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_order_removes_lists_and_enqueues_remote_deletes() {
        let order = OrderRef::finalized("ord-1", "Summer Fest");
        let (svc, store, outbox) = service(vec![ScanDirection::DepotToVehicle], true);
        let lists = svc.regenerate(&order).await.unwrap();

        let removed = svc.delete_order("ord-1").await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.lists.lock().unwrap().is_empty());

        let entries = outbox.entries.lock().unwrap();
        // One replace from regeneration plus one delete per removed list.
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1].operation,
            SyncOperation::DeleteList { list_id: lists[0].id.clone() }
        );
    }

    #[tokio::test]
    async fn enqueue_failure_does_not_surface() {
        let order = OrderRef::finalized("ord-1", "Summer Fest");
        let store = Arc::new(RecordingStore::default());
        let outbox = Arc::new(RecordingOutbox { fail_enqueue: true, ..Default::default() });
        let svc = GenerationService::new(
            Arc::new(StubOrders { items: items(), directions: vec![] }),
            store.clone(),
            outbox,
            Arc::new(StubPermissions { allow: true }),
            Arc::new(TestSession),
        );

        let lists = svc.regenerate(&order).await.unwrap();
        assert_eq!(lists.len(), 4);
        assert_eq!(store.replaced.lock().unwrap().len(), 1);
    }
}
