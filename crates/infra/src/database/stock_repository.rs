//! SQLite-backed implementation of the stock catalog store port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loadout_core::StockStore;
use loadout_domain::{LoadoutError, Result, StockItem};
use rusqlite::{params, Row};
use tokio::task;

use super::manager::DbManager;
use crate::errors::{map_join_error, InfraError};

/// SQLite-backed stock repository.
pub struct SqliteStockRepository {
    db: Arc<DbManager>,
}

impl SqliteStockRepository {
    /// Construct a repository backed by the shared connection manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StockStore for SqliteStockRepository {
    async fn get_all(&self) -> Result<Vec<StockItem>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<StockItem>> {
            let conn = db.get_connection()?;
            let mut stmt = conn.prepare(STOCK_SELECT_SQL).map_err(InfraError::from)?;
            let raw: Vec<StockRow> = stmt
                .query_map(params![], map_stock_row)
                .map_err(InfraError::from)?
                .collect::<rusqlite::Result<Vec<StockRow>>>()
                .map_err(InfraError::from)?;

            raw.into_iter().map(build_item).collect()
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert(&self, item: &StockItem) -> Result<()> {
        let db = Arc::clone(&self.db);
        let item = item.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                STOCK_UPSERT_SQL,
                params![
                    item.id,
                    item.sku,
                    item.name,
                    item.category,
                    item.quantity,
                    item.created_at.timestamp(),
                    item.updated_at.timestamp(),
                ],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM stock_items WHERE id = ?1", params![id])
                .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

const STOCK_SELECT_SQL: &str = "SELECT
        id, sku, name, category, quantity, created_at, updated_at
    FROM stock_items
    ORDER BY sku";

const STOCK_UPSERT_SQL: &str = "INSERT OR REPLACE INTO stock_items (
        id, sku, name, category, quantity, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

struct StockRow {
    id: String,
    sku: String,
    name: String,
    category: Option<String>,
    quantity: u32,
    created_at: i64,
    updated_at: i64,
}

fn map_stock_row(row: &Row<'_>) -> rusqlite::Result<StockRow> {
    Ok(StockRow {
        id: row.get(0)?,
        sku: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        quantity: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn build_item(row: StockRow) -> Result<StockItem> {
    Ok(StockItem {
        id: row.id,
        sku: row.sku,
        name: row.name,
        category: row.category,
        quantity: row.quantity,
        created_at: epoch_to_utc(row.created_at)?,
        updated_at: epoch_to_utc(row.updated_at)?,
    })
}

fn epoch_to_utc(epoch: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0)
        .ok_or_else(|| LoadoutError::Database(format!("stored timestamp out of range: {epoch}")))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn repo() -> (SqliteStockRepository, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager =
            Arc::new(DbManager::new(temp_dir.path().join("test.db"), 2).expect("manager created"));
        manager.run_migrations().expect("migrations run");
        (SqliteStockRepository::new(manager), temp_dir)
    }

    fn item(id: &str, sku: &str) -> StockItem {
        let ts = DateTime::from_timestamp(1_754_000_000, 0).unwrap();
        StockItem {
            id: id.to_string(),
            sku: sku.to_string(),
            name: format!("Item {sku}"),
            category: Some("power".into()),
            quantity: 12,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn roundtrips_stock_items() {
        let (repo, _dir) = repo();
        let a = item("stk-1", "CABLE-10M");
        let b = item("stk-2", "ADAPTER-16A");
        repo.upsert(&a).await.unwrap();
        repo.upsert(&b).await.unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        // Ordered by SKU.
        assert_eq!(all[0].sku, "ADAPTER-16A");
        assert_eq!(all[1], a);
    }

    #[tokio::test]
    async fn upsert_overwrites_and_delete_removes() {
        let (repo, _dir) = repo();
        let mut a = item("stk-1", "CABLE-10M");
        repo.upsert(&a).await.unwrap();

        a.quantity = 99;
        repo.upsert(&a).await.unwrap();
        assert_eq!(repo.get_all().await.unwrap()[0].quantity, 99);

        repo.delete("stk-1").await.unwrap();
        assert!(repo.get_all().await.unwrap().is_empty());
    }
}
