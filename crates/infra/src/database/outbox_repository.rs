//! SQLite-backed implementation of the sync outbox port.
//!
//! Dequeue honours the backoff schedule: only pending rows whose
//! `next_attempt_at` is unset or due are returned. `mark_failed` with no
//! next attempt parks the row as a dead letter for the manual retry sweep.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use loadout_core::OutboxQueue;
use loadout_domain::constants::MAX_OUTBOX_ERROR_LEN;
use loadout_domain::{OutboxStatus, Result, SyncOperation, SyncOutboxEntry};
use rusqlite::{params, Connection, Row};
use tokio::task;

use super::manager::DbManager;
use crate::errors::{map_join_error, InfraError};

/// SQLite-backed outbox repository.
pub struct SqliteOutboxRepository {
    db: Arc<DbManager>,
}

impl SqliteOutboxRepository {
    /// Construct a repository backed by the shared connection manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn insert_entry(conn: &Connection, entry: &SyncOutboxEntry) -> Result<()> {
        conn.execute(
            OUTBOX_INSERT_SQL,
            params![
                entry.id,
                entry.operation.kind(),
                entry.operation.target_id(),
                entry.payload_json,
                entry.status.to_string(),
                entry.attempts,
                entry.last_error,
                entry.next_attempt_at,
                entry.created_at,
                entry.sent_at,
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    fn fetch_due(conn: &Connection, now: i64, limit: usize) -> Result<Vec<SyncOutboxEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(OUTBOX_DEQUEUE_SQL).map_err(InfraError::from)?;
        let rows: Vec<OutboxRow> = stmt
            .query_map(params![now, i64::try_from(limit).unwrap_or(i64::MAX)], map_outbox_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<_>>()
            .map_err(InfraError::from)?;

        rows.into_iter().map(build_entry).collect()
    }
}

#[async_trait]
impl OutboxQueue for SqliteOutboxRepository {
    async fn enqueue(&self, entry: &SyncOutboxEntry) -> Result<()> {
        let db = Arc::clone(&self.db);
        let entry = entry.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            Self::insert_entry(&conn, &entry)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn dequeue_due(&self, now: i64, limit: usize) -> Result<Vec<SyncOutboxEntry>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<SyncOutboxEntry>> {
            let conn = db.get_connection()?;
            Self::fetch_due(&conn, now, limit)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_sent(&self, id: &str, sent_at: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE sync_outbox SET status = 'sent', sent_at = ?2, last_error = NULL
                 WHERE id = ?1",
                params![id, sent_at],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_failed(
        &self,
        id: &str,
        error: &str,
        next_attempt_at: Option<i64>,
    ) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        let reason = truncate_reason(error);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            match next_attempt_at {
                Some(at) => {
                    conn.execute(
                        "UPDATE sync_outbox
                         SET attempts = attempts + 1, last_error = ?2, next_attempt_at = ?3
                         WHERE id = ?1",
                        params![id, reason, at],
                    )
                    .map_err(InfraError::from)?;
                }
                None => {
                    conn.execute(
                        "UPDATE sync_outbox
                         SET attempts = attempts + 1, last_error = ?2,
                             status = 'dead_letter', next_attempt_at = NULL
                         WHERE id = ?1",
                        params![id, reason],
                    )
                    .map_err(InfraError::from)?;
                }
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn dead_letters(&self) -> Result<Vec<SyncOutboxEntry>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<SyncOutboxEntry>> {
            let conn = db.get_connection()?;
            let mut stmt = conn.prepare(OUTBOX_DEAD_LETTERS_SQL).map_err(InfraError::from)?;
            let rows: Vec<OutboxRow> = stmt
                .query_map(params![], map_outbox_row)
                .map_err(InfraError::from)?
                .collect::<rusqlite::Result<_>>()
                .map_err(InfraError::from)?;
            rows.into_iter().map(build_entry).collect()
        })
        .await
        .map_err(map_join_error)?
    }

    async fn requeue(&self, id: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE sync_outbox SET status = 'pending', next_attempt_at = NULL
                 WHERE id = ?1 AND status = 'dead_letter'",
                params![id],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

const OUTBOX_INSERT_SQL: &str = "INSERT OR REPLACE INTO sync_outbox (
        id, op_kind, target_id, payload_json, status, attempts, last_error,
        next_attempt_at, created_at, sent_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const OUTBOX_DEQUEUE_SQL: &str = "SELECT
        id, op_kind, target_id, payload_json, status, attempts, last_error,
        next_attempt_at, created_at, sent_at
    FROM sync_outbox
    WHERE status = 'pending'
      AND (next_attempt_at IS NULL OR next_attempt_at <= ?1)
    ORDER BY created_at ASC
    LIMIT ?2";

const OUTBOX_DEAD_LETTERS_SQL: &str = "SELECT
        id, op_kind, target_id, payload_json, status, attempts, last_error,
        next_attempt_at, created_at, sent_at
    FROM sync_outbox
    WHERE status = 'dead_letter'
    ORDER BY created_at ASC";

struct OutboxRow {
    id: String,
    op_kind: String,
    target_id: String,
    payload_json: String,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    next_attempt_at: Option<i64>,
    created_at: i64,
    sent_at: Option<i64>,
}

fn map_outbox_row(row: &Row<'_>) -> rusqlite::Result<OutboxRow> {
    Ok(OutboxRow {
        id: row.get(0)?,
        op_kind: row.get(1)?,
        target_id: row.get(2)?,
        payload_json: row.get(3)?,
        status: row.get(4)?,
        attempts: row.get(5)?,
        last_error: row.get(6)?,
        next_attempt_at: row.get(7)?,
        created_at: row.get(8)?,
        sent_at: row.get(9)?,
    })
}

fn build_entry(row: OutboxRow) -> Result<SyncOutboxEntry> {
    Ok(SyncOutboxEntry {
        id: row.id,
        operation: SyncOperation::from_parts(&row.op_kind, &row.target_id)?,
        payload_json: row.payload_json,
        status: OutboxStatus::from_str(&row.status)?,
        attempts: row.attempts,
        last_error: row.last_error,
        next_attempt_at: row.next_attempt_at,
        created_at: row.created_at,
        sent_at: row.sent_at,
    })
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_OUTBOX_ERROR_LEN {
        return reason.to_string();
    }

    let mut truncated =
        reason.chars().take(MAX_OUTBOX_ERROR_LEN.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn repo() -> (SqliteOutboxRepository, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager =
            Arc::new(DbManager::new(temp_dir.path().join("test.db"), 2).expect("manager created"));
        manager.run_migrations().expect("migrations run");
        (SqliteOutboxRepository::new(manager), temp_dir)
    }

    fn entry(created_at: i64) -> SyncOutboxEntry {
        SyncOutboxEntry::new(
            SyncOperation::UpsertList { list_id: "sl-1".into() },
            "{\"header\":{}}".into(),
            created_at,
        )
    }

    #[tokio::test]
    async fn dequeues_due_entries_oldest_first() {
        let (repo, _dir) = repo();
        let older = entry(100);
        let newer = entry(200);
        repo.enqueue(&newer).await.unwrap();
        repo.enqueue(&older).await.unwrap();

        let due = repo.dequeue_due(1_000, 10).await.unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, older.id);
        assert_eq!(due[1].id, newer.id);
    }

    #[tokio::test]
    async fn backoff_schedule_defers_delivery() {
        let (repo, _dir) = repo();
        let e = entry(100);
        repo.enqueue(&e).await.unwrap();

        repo.mark_failed(&e.id, "remote unreachable", Some(500)).await.unwrap();
        assert!(repo.dequeue_due(400, 10).await.unwrap().is_empty());

        let due = repo.dequeue_due(500, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempts, 1);
        assert_eq!(due[0].last_error.as_deref(), Some("remote unreachable"));
    }

    #[tokio::test]
    async fn sent_entries_leave_the_queue() {
        let (repo, _dir) = repo();
        let e = entry(100);
        repo.enqueue(&e).await.unwrap();
        repo.mark_sent(&e.id, 150).await.unwrap();

        assert!(repo.dequeue_due(1_000, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_entries_park_as_dead_letters_and_requeue() {
        let (repo, _dir) = repo();
        let e = entry(100);
        repo.enqueue(&e).await.unwrap();

        repo.mark_failed(&e.id, "boom", None).await.unwrap();
        assert!(repo.dequeue_due(1_000, 10).await.unwrap().is_empty());

        let parked = repo.dead_letters().await.unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].status, OutboxStatus::DeadLetter);
        assert_eq!(parked[0].attempts, 1);

        repo.requeue(&e.id).await.unwrap();
        let due = repo.dequeue_due(1_000, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].status, OutboxStatus::Pending);
    }

    #[tokio::test]
    async fn long_error_reasons_are_truncated() {
        let (repo, _dir) = repo();
        let e = entry(100);
        repo.enqueue(&e).await.unwrap();

        let reason = "x".repeat(1_000);
        repo.mark_failed(&e.id, &reason, Some(200)).await.unwrap();

        let due = repo.dequeue_due(1_000, 10).await.unwrap();
        let stored = due[0].last_error.as_deref().unwrap();
        assert_eq!(stored.len(), MAX_OUTBOX_ERROR_LEN);
        assert!(stored.ends_with("..."));
    }
}
