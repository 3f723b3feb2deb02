//! SQLite-backed implementation of the scan-list store port.
//!
//! Headers live in `scan_lists`, lines in `scan_list_lines` with the
//! scanned-unit membership stored as a JSON array column. Deleting or
//! replacing an order's lists removes headers and lines in one transaction;
//! there is no framework-level cascade to rely on.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loadout_domain::{
    ItemStatus, LineProgress, LoadoutError, Result, ScanDirection, ScanList, ScanListStatus,
};
use loadout_core::ScanListStore;
use rusqlite::{params, Connection, Row};
use tokio::task;

use super::manager::DbManager;
use crate::errors::{map_join_error, InfraError};

/// SQLite-backed scan-list repository.
pub struct SqliteScanListRepository {
    db: Arc<DbManager>,
}

impl SqliteScanListRepository {
    /// Construct a repository backed by the shared connection manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn read_list(conn: &Connection, list_id: &str) -> Result<Option<ScanList>> {
        let mut stmt = conn.prepare(LIST_SELECT_SQL).map_err(InfraError::from)?;
        let mut rows = stmt
            .query_map(params![list_id], map_header_row)
            .map_err(InfraError::from)?;

        let Some(header) = rows.next() else {
            return Ok(None);
        };
        let header = header.map_err(InfraError::from)?;
        let lines = Self::read_lines(conn, list_id)?;
        Ok(Some(build_list(header, lines)?))
    }

    fn read_lines(conn: &Connection, list_id: &str) -> Result<Vec<LineProgress>> {
        let mut stmt = conn.prepare(LINES_SELECT_SQL).map_err(InfraError::from)?;
        let raw: Vec<LineRow> = stmt
            .query_map(params![list_id], map_line_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<_>>()
            .map_err(InfraError::from)?;

        raw.into_iter().map(build_line).collect()
    }

    fn write_list(conn: &Connection, list: &ScanList) -> Result<()> {
        conn.execute(
            LIST_UPSERT_SQL,
            params![
                list.id,
                list.order_id,
                list.order_label,
                list.direction.to_string(),
                list.required_total,
                list.scanned_total,
                list.status.to_string(),
                list.created_at.timestamp(),
                list.updated_at.timestamp(),
                list.completed_at.map(|t| t.timestamp()),
            ],
        )
        .map_err(InfraError::from)?;

        conn.execute("DELETE FROM scan_list_lines WHERE list_id = ?1", params![list.id])
            .map_err(InfraError::from)?;

        for (position, line) in list.lines.iter().enumerate() {
            let scanned_units =
                serde_json::to_string(&line.scanned_units).map_err(InfraError::from)?;
            conn.execute(
                LINE_INSERT_SQL,
                params![
                    list.id,
                    line.sku,
                    line.display_name,
                    line.category,
                    line.required_qty,
                    scanned_units,
                    line.item_status.to_string(),
                    line.last_scanned_at.map(|t| t.timestamp()),
                    position as i64,
                ],
            )
            .map_err(InfraError::from)?;
        }
        Ok(())
    }

    fn delete_order_lists(conn: &Connection, order_id: &str) -> Result<usize> {
        conn.execute(
            "DELETE FROM scan_list_lines WHERE list_id IN
                 (SELECT id FROM scan_lists WHERE order_id = ?1)",
            params![order_id],
        )
        .map_err(InfraError::from)?;
        let removed = conn
            .execute("DELETE FROM scan_lists WHERE order_id = ?1", params![order_id])
            .map_err(InfraError::from)?;
        Ok(removed)
    }
}

#[async_trait]
impl ScanListStore for SqliteScanListRepository {
    async fn get(&self, list_id: &str) -> Result<Option<ScanList>> {
        let db = Arc::clone(&self.db);
        let list_id = list_id.to_string();

        task::spawn_blocking(move || -> Result<Option<ScanList>> {
            let conn = db.get_connection()?;
            Self::read_list(&conn, &list_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_for_order(&self, order_id: &str) -> Result<Vec<ScanList>> {
        let db = Arc::clone(&self.db);
        let order_id = order_id.to_string();

        task::spawn_blocking(move || -> Result<Vec<ScanList>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare("SELECT id FROM scan_lists WHERE order_id = ?1 ORDER BY created_at, id")
                .map_err(InfraError::from)?;
            let ids: Vec<String> = stmt
                .query_map(params![order_id], |row| row.get(0))
                .map_err(InfraError::from)?
                .collect::<rusqlite::Result<_>>()
                .map_err(InfraError::from)?;

            let mut lists = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(list) = Self::read_list(&conn, &id)? {
                    lists.push(list);
                }
            }
            Ok(lists)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert(&self, list: &ScanList) -> Result<()> {
        let db = Arc::clone(&self.db);
        let list = list.clone();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(InfraError::from)?;
            Self::write_list(&tx, &list)?;
            tx.commit().map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_for_order(&self, order_id: &str) -> Result<usize> {
        let db = Arc::clone(&self.db);
        let order_id = order_id.to_string();

        task::spawn_blocking(move || -> Result<usize> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(InfraError::from)?;
            let removed = Self::delete_order_lists(&tx, &order_id)?;
            tx.commit().map_err(InfraError::from)?;
            Ok(removed)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn replace_for_order(&self, order_id: &str, lists: &[ScanList]) -> Result<()> {
        let db = Arc::clone(&self.db);
        let order_id = order_id.to_string();
        let lists = lists.to_vec();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(InfraError::from)?;
            Self::delete_order_lists(&tx, &order_id)?;
            for list in &lists {
                Self::write_list(&tx, list)?;
            }
            tx.commit().map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

const LIST_SELECT_SQL: &str = "SELECT
        id, order_id, order_label, direction, required_total, scanned_total,
        status, created_at, updated_at, completed_at
    FROM scan_lists
    WHERE id = ?1";

const LIST_UPSERT_SQL: &str = "INSERT OR REPLACE INTO scan_lists (
        id, order_id, order_label, direction, required_total, scanned_total,
        status, created_at, updated_at, completed_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const LINES_SELECT_SQL: &str = "SELECT
        sku, display_name, category, required_qty, scanned_units,
        item_status, last_scanned_at
    FROM scan_list_lines
    WHERE list_id = ?1
    ORDER BY position";

const LINE_INSERT_SQL: &str = "INSERT INTO scan_list_lines (
        list_id, sku, display_name, category, required_qty, scanned_units,
        item_status, last_scanned_at, position
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

struct HeaderRow {
    id: String,
    order_id: String,
    order_label: String,
    direction: String,
    required_total: u32,
    scanned_total: u32,
    status: String,
    created_at: i64,
    updated_at: i64,
    completed_at: Option<i64>,
}

struct LineRow {
    sku: String,
    display_name: String,
    category: Option<String>,
    required_qty: u32,
    scanned_units: String,
    item_status: String,
    last_scanned_at: Option<i64>,
}

fn map_header_row(row: &Row<'_>) -> rusqlite::Result<HeaderRow> {
    Ok(HeaderRow {
        id: row.get(0)?,
        order_id: row.get(1)?,
        order_label: row.get(2)?,
        direction: row.get(3)?,
        required_total: row.get(4)?,
        scanned_total: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        completed_at: row.get(9)?,
    })
}

fn map_line_row(row: &Row<'_>) -> rusqlite::Result<LineRow> {
    Ok(LineRow {
        sku: row.get(0)?,
        display_name: row.get(1)?,
        category: row.get(2)?,
        required_qty: row.get(3)?,
        scanned_units: row.get(4)?,
        item_status: row.get(5)?,
        last_scanned_at: row.get(6)?,
    })
}

fn build_list(header: HeaderRow, lines: Vec<LineProgress>) -> Result<ScanList> {
    Ok(ScanList {
        id: header.id,
        order_id: header.order_id,
        order_label: header.order_label,
        direction: ScanDirection::from_str(&header.direction)?,
        required_total: header.required_total,
        scanned_total: header.scanned_total,
        status: ScanListStatus::from_str(&header.status)?,
        lines,
        created_at: epoch_to_utc(header.created_at)?,
        updated_at: epoch_to_utc(header.updated_at)?,
        completed_at: header.completed_at.map(epoch_to_utc).transpose()?,
    })
}

fn build_line(row: LineRow) -> Result<LineProgress> {
    Ok(LineProgress {
        sku: row.sku,
        display_name: row.display_name,
        category: row.category,
        required_qty: row.required_qty,
        scanned_units: serde_json::from_str(&row.scanned_units).map_err(InfraError::from)?,
        item_status: ItemStatus::from_str(&row.item_status)?,
        last_scanned_at: row.last_scanned_at.map(epoch_to_utc).transpose()?,
    })
}

fn epoch_to_utc(epoch: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0)
        .ok_or_else(|| LoadoutError::Database(format!("stored timestamp out of range: {epoch}")))
}

#[cfg(test)]
mod tests {
    use loadout_core::engine;
    use tempfile::TempDir;

    use super::*;

    fn repo() -> (SqliteScanListRepository, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager =
            Arc::new(DbManager::new(temp_dir.path().join("test.db"), 2).expect("manager created"));
        manager.run_migrations().expect("migrations run");
        (SqliteScanListRepository::new(manager), temp_dir)
    }

    fn sample_list(order_id: &str) -> ScanList {
        let now = DateTime::from_timestamp(1_754_000_000, 0).unwrap();
        ScanList::new(
            order_id,
            "Summer Fest",
            ScanDirection::DepotToVehicle,
            vec![
                LineProgress::new("SPK-12", "12\" speaker", Some("audio"), 2),
                LineProgress::new("CABLE-10M", "10m cable", None, 5),
            ],
            now,
        )
    }

    #[tokio::test]
    async fn roundtrips_a_list_with_scan_progress() {
        let (repo, _dir) = repo();
        let mut list = sample_list("ord-1");
        let now = DateTime::from_timestamp(1_754_000_100, 0).unwrap();
        engine::record_scan(&mut list, "U1", "SPK-12", now).unwrap();

        repo.upsert(&list).await.unwrap();
        let loaded = repo.get(&list.id).await.unwrap().unwrap();

        assert_eq!(loaded, list);
        assert_eq!(loaded.lines[0].scanned_units, vec!["U1".to_string()]);
        assert_eq!(loaded.lines[0].last_scanned_at, Some(now));
    }

    #[tokio::test]
    async fn missing_list_is_none() {
        let (repo, _dir) = repo();
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_lines() {
        let (repo, _dir) = repo();
        let mut list = sample_list("ord-1");
        repo.upsert(&list).await.unwrap();

        list.lines.remove(1);
        list.recompute(DateTime::from_timestamp(1_754_000_200, 0).unwrap());
        repo.upsert(&list).await.unwrap();

        let loaded = repo.get(&list.id).await.unwrap().unwrap();
        assert_eq!(loaded.lines.len(), 1);
        assert_eq!(loaded.required_total, 2);
    }

    #[tokio::test]
    async fn delete_for_order_cascades_to_lines() {
        let (repo, _dir) = repo();
        let list_a = sample_list("ord-1");
        let list_b = sample_list("ord-1");
        let other = sample_list("ord-2");
        repo.upsert(&list_a).await.unwrap();
        repo.upsert(&list_b).await.unwrap();
        repo.upsert(&other).await.unwrap();

        let removed = repo.delete_for_order("ord-1").await.unwrap();
        assert_eq!(removed, 2);
        assert!(repo.get(&list_a.id).await.unwrap().is_none());
        assert!(repo.get(&other.id).await.unwrap().is_some());

        // No orphaned line rows survive the transactional delete.
        let conn = repo.db.get_connection().unwrap();
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM scan_list_lines WHERE list_id = ?1",
                params![list_a.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn replace_for_order_swaps_the_set() {
        let (repo, _dir) = repo();
        let old = sample_list("ord-1");
        repo.upsert(&old).await.unwrap();

        let new_list = sample_list("ord-1");
        repo.replace_for_order("ord-1", std::slice::from_ref(&new_list)).await.unwrap();

        assert!(repo.get(&old.id).await.unwrap().is_none());
        let lists = repo.list_for_order("ord-1").await.unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].id, new_list.id);
    }
}
