//! Port interfaces for sync operations

use async_trait::async_trait;
use futures::stream::BoxStream;
use loadout_domain::{Result, ScanList, StockItem, SyncOutboxEntry};
use serde_json::Value;

/// Trait for the local scan-list cache
///
/// The local cache is the source of truth for in-flight work; every
/// mutation lands here synchronously before any remote propagation.
#[async_trait]
pub trait ScanListStore: Send + Sync {
    /// Fetch one scan list with its lines
    async fn get(&self, list_id: &str) -> Result<Option<ScanList>>;

    /// All scan lists for an order, one per tracked direction
    async fn list_for_order(&self, order_id: &str) -> Result<Vec<ScanList>>;

    /// Insert or update a scan list together with its lines
    async fn upsert(&self, list: &ScanList) -> Result<()>;

    /// Delete every scan list for an order, cascading to line records in
    /// the same transaction; returns the number of lists removed
    async fn delete_for_order(&self, order_id: &str) -> Result<usize>;

    /// Atomically replace the order's scan lists with `lists`
    async fn replace_for_order(&self, order_id: &str, lists: &[ScanList]) -> Result<()>;
}

/// Trait for the local bulk-stock catalog cache
#[async_trait]
pub trait StockStore: Send + Sync {
    /// All cached stock items
    async fn get_all(&self) -> Result<Vec<StockItem>>;

    /// Insert or update one stock item
    async fn upsert(&self, item: &StockItem) -> Result<()>;

    /// Delete one stock item by id
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Trait for managing the durable sync outbox
#[async_trait]
pub trait OutboxQueue: Send + Sync {
    /// Enqueue a sync job
    async fn enqueue(&self, entry: &SyncOutboxEntry) -> Result<()>;

    /// Fetch up to `limit` pending entries due at `now`, oldest first
    async fn dequeue_due(&self, now: i64, limit: usize) -> Result<Vec<SyncOutboxEntry>>;

    /// Mark an entry as delivered
    async fn mark_sent(&self, id: &str, sent_at: i64) -> Result<()>;

    /// Record a failed attempt; `next_attempt_at` of `None` parks the entry
    /// as a dead letter
    async fn mark_failed(&self, id: &str, error: &str, next_attempt_at: Option<i64>)
        -> Result<()>;

    /// All parked dead letters, oldest first
    async fn dead_letters(&self) -> Result<Vec<SyncOutboxEntry>>;

    /// Re-arm a dead letter for immediate delivery
    async fn requeue(&self, id: &str) -> Result<()>;
}

/// Trait for the schemaless remote store driver
///
/// The driver moves flat records by collection and id and holds no schema
/// logic; record shapes are owned by [`crate::sync::schema`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert or replace one record
    async fn upsert(&self, collection: &str, id: &str, record: Value) -> Result<()>;

    /// Delete one record by id
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Delete every record whose `field` equals `value`
    async fn delete_where(&self, collection: &str, field: &str, value: &str) -> Result<()>;

    /// Fetch every record in a collection
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>>;

    /// Fetch every record whose `field` equals `value`
    async fn get_where(&self, collection: &str, field: &str, value: &str) -> Result<Vec<Value>>;

    /// Stream snapshots of the records whose `field` equals `value`.
    ///
    /// Feeds live progress displays only; nothing in the reconciliation
    /// policy depends on it.
    async fn subscribe(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<BoxStream<'static, Vec<Value>>>;
}
