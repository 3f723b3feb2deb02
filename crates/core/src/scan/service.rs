//! Scan application service - core business logic

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use loadout_domain::{LoadoutError, Result, ScanError, ScanList};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::engine::{self, Adjustment};
use super::ports::{PermissionChecker, Session, UnitRegistry};
use super::{PERM_ACTION_WRITE, PERM_SUBJECT_SCAN_LISTS};
use crate::sync::ports::{OutboxQueue, ScanListStore};
use crate::sync::schema;

/// Scan application service
///
/// Wraps the pure engine with unit resolution, permission checks, the
/// local-first persistence rule and the lifecycle-projection side effect.
/// Every mutating call commits to the local cache before returning; remote
/// propagation is a non-blocking outbox enqueue.
///
/// Mutations on one scan list are serialized through a per-list lock;
/// different lists mutate in parallel.
pub struct ScanService {
    units: Arc<dyn UnitRegistry>,
    store: Arc<dyn ScanListStore>,
    outbox: Arc<dyn OutboxQueue>,
    permissions: Arc<dyn PermissionChecker>,
    session: Arc<dyn Session>,
    list_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ScanService {
    /// Create a new scan service
    pub fn new(
        units: Arc<dyn UnitRegistry>,
        store: Arc<dyn ScanListStore>,
        outbox: Arc<dyn OutboxQueue>,
        permissions: Arc<dyn PermissionChecker>,
        session: Arc<dyn Session>,
    ) -> Self {
        Self {
            units,
            store,
            outbox,
            permissions,
            session,
            list_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn writer_lock(&self, list_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.list_locks.lock().await;
        Arc::clone(
            locks.entry(list_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Record a scan of `unit_id` against the `sku` line of a list.
    ///
    /// The unit is resolved in the registry and its SKU verified against
    /// the claimed one before the engine runs, guarding against scanning
    /// the wrong physical item under an assumed SKU. On success the unit's
    /// lifecycle status is projected from the list direction; a failed
    /// projection write is logged and does not roll back the scan.
    pub async fn apply_scan(&self, list_id: &str, unit_id: &str, sku: &str) -> Result<ScanList> {
        self.ensure_write_permission().await?;
        let lock = self.writer_lock(list_id).await;
        let _writer = lock.lock().await;
        let mut list = self.load(list_id).await?;

        let unit = self
            .units
            .lookup(unit_id)
            .await?
            .ok_or_else(|| ScanError::UnitNotFound(unit_id.to_string()))?;
        if unit.sku != sku {
            return Err(ScanError::SkuMismatch {
                expected: sku.to_string(),
                found: unit.sku,
            }
            .into());
        }

        let now = Utc::now();
        engine::record_scan(&mut list, unit_id, sku, now)?;
        self.store.upsert(&list).await?;
        debug!(
            list_id = %list.id,
            unit_id = unit_id,
            sku = sku,
            user = self.session.current_user_id().as_deref().unwrap_or("-"),
            "scan recorded"
        );

        // The scan record is the local source of truth; a failed status
        // write on the unit must not undo it.
        let status = list.direction.unit_status_projection();
        let location = list.direction.is_outbound().then_some(list.order_id.as_str());
        if let Err(err) = self.units.set_status(unit_id, status, location).await {
            warn!(unit_id = unit_id, error = %err, "failed to project unit status");
        }

        self.enqueue_push(&list).await;
        Ok(list)
    }

    /// Remove a previously recorded scan.
    ///
    /// The unit's lifecycle status is left exactly as the forward scan set
    /// it: correcting the checklist record does not move the physical
    /// unit, and the next real scan re-projects it anyway.
    pub async fn undo_scan(&self, list_id: &str, unit_id: &str, sku: &str) -> Result<ScanList> {
        self.ensure_write_permission().await?;
        let lock = self.writer_lock(list_id).await;
        let _writer = lock.lock().await;
        let mut list = self.load(list_id).await?;

        engine::remove_scan(&mut list, unit_id, sku, Utc::now())?;
        self.store.upsert(&list).await?;
        debug!(list_id = %list.id, unit_id = unit_id, sku = sku, "scan removed");

        self.enqueue_push(&list).await;
        Ok(list)
    }

    /// Apply a manual count adjustment for bulk stock.
    pub async fn apply_manual_adjustment(
        &self,
        list_id: &str,
        sku: &str,
        adjustment: Adjustment,
    ) -> Result<ScanList> {
        self.ensure_write_permission().await?;
        let lock = self.writer_lock(list_id).await;
        let _writer = lock.lock().await;
        let mut list = self.load(list_id).await?;

        let changed = engine::adjust_count(&mut list, sku, adjustment, Utc::now())?;
        if !changed {
            return Ok(list);
        }

        self.store.upsert(&list).await?;
        debug!(list_id = %list.id, sku = sku, adjustment = ?adjustment, "manual adjustment applied");

        self.enqueue_push(&list).await;
        Ok(list)
    }

    /// Re-derive a list's totals and status after a degraded pull.
    ///
    /// Local-only repair: the result is not pushed, since a zeroed rebuild
    /// must not overwrite the remote aggregate counters.
    pub async fn refresh_list(&self, list_id: &str) -> Result<ScanList> {
        let lock = self.writer_lock(list_id).await;
        let _writer = lock.lock().await;
        let mut list = self.load(list_id).await?;
        engine::refresh(&mut list, Utc::now());
        self.store.upsert(&list).await?;
        Ok(list)
    }

    async fn load(&self, list_id: &str) -> Result<ScanList> {
        self.store
            .get(list_id)
            .await?
            .ok_or_else(|| LoadoutError::NotFound(format!("scan list {list_id}")))
    }

    async fn ensure_write_permission(&self) -> Result<()> {
        if self
            .permissions
            .has_permission(PERM_SUBJECT_SCAN_LISTS, PERM_ACTION_WRITE)
            .await?
        {
            Ok(())
        } else {
            Err(LoadoutError::PermissionDenied(format!(
                "{PERM_SUBJECT_SCAN_LISTS}:{PERM_ACTION_WRITE}"
            )))
        }
    }

    async fn enqueue_push(&self, list: &ScanList) {
        match schema::upsert_entry(list, Utc::now()) {
            Ok(entry) => {
                if let Err(err) = self.outbox.enqueue(&entry).await {
                    warn!(list_id = %list.id, error = %err, "failed to enqueue sync push");
                }
            }
            Err(err) => {
                warn!(list_id = %list.id, error = %err, "failed to build sync push entry");
            }
        }
    }
}
