//! Bidirectional reconciliation between the local cache and the remote
//! store.
//!
//! The local cache is authoritative for in-flight work; the remote store is
//! authoritative across devices. Three flows meet here:
//!
//! - outbox execution: durable push jobs (incremental upsert, full order
//!   replace, delete) run against the remote store
//! - pull-and-rebuild: remote scan-list headers are re-materialized over
//!   line collections rebuilt from the *current* order line items, because
//!   the remote schema keeps rolled-up counters only
//! - stock merge: mutable catalog records merge last-write-wins on
//!   `updatedAt`, with orphan pruning after the pull completes

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use loadout_domain::{
    LoadoutError, Result, ScanDirection, ScanList, ScanListStatus, StockItem, SyncOperation,
    SyncOutboxEntry,
};
use tracing::{debug, info, warn};

use crate::scan::generator::build_lines;
use crate::scan::ports::OrderSource;
use crate::sync::health::SyncHealth;
use crate::sync::ports::{OutboxQueue, RemoteStore, ScanListStore, StockStore};
use crate::sync::schema::{
    self, FlattenedScanList, RemoteListRecord, SCAN_LISTS_COLLECTION,
    SCAN_LIST_LINES_COLLECTION, STOCK_ITEMS_COLLECTION,
};

/// Outcome of one stock-item merge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StockMergeSummary {
    /// Remote records applied over the local cache
    pub applied: usize,
    /// Remote records skipped because the local copy was newer or equal
    pub skipped: usize,
    /// Local orphans deleted after the pull
    pub pruned: usize,
}

/// Owner of the local/remote consistency policy.
pub struct SyncReconciler {
    store: Arc<dyn ScanListStore>,
    stock: Arc<dyn StockStore>,
    remote: Arc<dyn RemoteStore>,
    orders: Arc<dyn OrderSource>,
    outbox: Arc<dyn OutboxQueue>,
    health: Arc<SyncHealth>,
}

impl SyncReconciler {
    /// Create a new reconciler
    pub fn new(
        store: Arc<dyn ScanListStore>,
        stock: Arc<dyn StockStore>,
        remote: Arc<dyn RemoteStore>,
        orders: Arc<dyn OrderSource>,
        outbox: Arc<dyn OutboxQueue>,
    ) -> Self {
        Self { store, stock, remote, orders, outbox, health: Arc::new(SyncHealth::new()) }
    }

    /// Aggregate sync health owned by this reconciler.
    #[must_use]
    pub fn health(&self) -> Arc<SyncHealth> {
        Arc::clone(&self.health)
    }

    /// Execute one outbox entry against the remote store.
    ///
    /// Success and failure both land in the health tracker; the error is
    /// returned so the outbox can schedule a retry, never surfaced to scan
    /// callers.
    pub async fn execute(&self, entry: &SyncOutboxEntry) -> Result<()> {
        let result = self.dispatch(entry).await;
        match &result {
            Ok(()) => self.health.record_success(Utc::now()),
            Err(err) => {
                self.health.record_fault(entry.operation.target_id(), &err.to_string(), Utc::now());
            }
        }
        result
    }

    async fn dispatch(&self, entry: &SyncOutboxEntry) -> Result<()> {
        match &entry.operation {
            SyncOperation::UpsertList { list_id } => {
                let flat: FlattenedScanList = decode_payload(&entry.payload_json, list_id)?;
                self.push_flattened(&flat).await?;
                debug!(list_id = %list_id, "scan list pushed");
                Ok(())
            }
            SyncOperation::ReplaceOrder { order_id } => {
                let set: Vec<FlattenedScanList> = decode_payload(&entry.payload_json, order_id)?;
                // Delete-then-create; the whole entry retries on failure, so
                // a crash mid-sequence leaves a bounded window, not a
                // permanent hole.
                self.remote
                    .delete_where(SCAN_LIST_LINES_COLLECTION, "order_id", order_id)
                    .await?;
                self.remote.delete_where(SCAN_LISTS_COLLECTION, "order_id", order_id).await?;
                for flat in &set {
                    self.push_flattened(flat).await?;
                }
                info!(order_id = %order_id, count = set.len(), "order scan lists replaced");
                Ok(())
            }
            SyncOperation::DeleteList { list_id } => {
                self.remote
                    .delete_where(SCAN_LIST_LINES_COLLECTION, "list_id", list_id)
                    .await?;
                self.remote.delete(SCAN_LISTS_COLLECTION, list_id).await?;
                debug!(list_id = %list_id, "scan list deleted remotely");
                Ok(())
            }
        }
    }

    async fn push_flattened(&self, flat: &FlattenedScanList) -> Result<()> {
        let header = serde_json::to_value(&flat.header)
            .map_err(|e| LoadoutError::Internal(e.to_string()))?;
        self.remote.upsert(SCAN_LISTS_COLLECTION, &flat.header.id, header).await?;
        for line in &flat.lines {
            let record =
                serde_json::to_value(line).map_err(|e| LoadoutError::Internal(e.to_string()))?;
            self.remote.upsert(SCAN_LIST_LINES_COLLECTION, &line.id, record).await?;
        }
        Ok(())
    }

    /// Pull the remote scan lists for an order and rebuild the local set.
    ///
    /// The remote schema keeps rolled-up counters only, so each list's line
    /// collection is rebuilt fresh from the current order line items and
    /// the captured `scanned_total`/`status`/`completed_at` are re-applied
    /// onto the rebuilt header. Per-line scanned-unit membership is not
    /// restored; a header whose counters have no line backing stays
    /// inconsistent until the next scan or a refresh.
    pub async fn pull_order(&self, order_id: &str) -> Result<Vec<ScanList>> {
        let records = self.remote.get_where(SCAN_LISTS_COLLECTION, "order_id", order_id).await?;
        let line_items = self.orders.get_line_items(order_id).await?;

        let mut rebuilt = Vec::new();
        for value in records {
            let header: RemoteListRecord = match serde_json::from_value(value) {
                Ok(header) => header,
                Err(err) => {
                    warn!(order_id = %order_id, error = %err, "skipping malformed remote scan list");
                    self.health.record_fault(order_id, &err.to_string(), Utc::now());
                    continue;
                }
            };
            match rebuild_list(&header, &line_items) {
                Ok(list) => rebuilt.push(list),
                Err(err) => {
                    warn!(list_id = %header.id, error = %err, "skipping unrebuildable remote scan list");
                    self.health.record_fault(&header.id, &err.to_string(), Utc::now());
                }
            }
        }

        self.store.replace_for_order(order_id, &rebuilt).await?;
        self.health.record_success(Utc::now());
        info!(order_id = %order_id, count = rebuilt.len(), "scan lists rebuilt from remote");
        Ok(rebuilt)
    }

    /// Merge remote stock-item records into the local cache.
    ///
    /// Last-write-wins on `updated_at`: a remote copy older than or equal
    /// to the local one is skipped. Local records absent from the remote
    /// result set are orphans and are deleted after the iteration
    /// completes, not during it.
    pub async fn sync_stock_items(&self) -> Result<StockMergeSummary> {
        let remote_values = self.remote.get_all(STOCK_ITEMS_COLLECTION).await?;
        let local: HashMap<String, StockItem> =
            self.stock.get_all().await?.into_iter().map(|i| (i.id.clone(), i)).collect();

        let mut summary = StockMergeSummary::default();
        let mut seen: HashSet<String> = HashSet::new();

        for value in remote_values {
            let item: StockItem = match serde_json::from_value(value) {
                Ok(item) => item,
                Err(err) => {
                    warn!(error = %err, "skipping malformed remote stock item");
                    self.health.record_fault("stock_items", &err.to_string(), Utc::now());
                    continue;
                }
            };
            seen.insert(item.id.clone());

            match local.get(&item.id) {
                Some(existing) if !existing.is_older_than(&item) => summary.skipped += 1,
                _ => {
                    self.stock.upsert(&item).await?;
                    summary.applied += 1;
                }
            }
        }

        for item in local.values() {
            if !seen.contains(&item.id) {
                self.stock.delete(&item.id).await?;
                summary.pruned += 1;
            }
        }

        self.health.record_success(Utc::now());
        info!(
            applied = summary.applied,
            skipped = summary.skipped,
            pruned = summary.pruned,
            "stock items merged"
        );
        Ok(summary)
    }

    /// Re-arm every dead-lettered outbox entry for delivery.
    ///
    /// This is the manual "retry failed" sweep; the background worker picks
    /// the re-armed entries up on its next tick.
    pub async fn retry_dead_letters(&self) -> Result<usize> {
        let parked = self.outbox.dead_letters().await?;
        let count = parked.len();
        for entry in &parked {
            self.outbox.requeue(&entry.id).await?;
        }
        if count > 0 {
            info!(count = count, "dead letters re-armed");
        }
        Ok(count)
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(payload: &str, target: &str) -> Result<T> {
    serde_json::from_str(payload)
        .map_err(|e| LoadoutError::InvalidInput(format!("outbox payload for {target}: {e}")))
}

fn rebuild_list(
    header: &RemoteListRecord,
    line_items: &[loadout_domain::OrderLineItem],
) -> Result<ScanList> {
    let direction = ScanDirection::from_str(&header.direction)?;
    let status = ScanListStatus::from_str(&header.status)?;
    let lines = build_lines(line_items);
    let required_total = lines.iter().map(|l| l.required_qty).sum();

    let completed_at = match header.completed_at {
        Some(epoch) => Some(schema::timestamp_from_epoch(epoch)?),
        None => None,
    };

    Ok(ScanList {
        id: header.id.clone(),
        order_id: header.order_id.clone(),
        order_label: header.order_label.clone(),
        direction,
        required_total,
        scanned_total: header.scanned_total,
        status,
        lines,
        created_at: schema::timestamp_from_epoch(header.created_at)?,
        updated_at: schema::timestamp_from_epoch(header.updated_at)?,
        completed_at,
    })
}
