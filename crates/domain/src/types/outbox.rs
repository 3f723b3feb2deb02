//! Durable outbox records for remote synchronization.
//!
//! Every local mutation that must reach the remote store is captured as an
//! outbox row. Rows are pushed by a background worker, retried on a backoff
//! schedule, and parked as dead letters once the attempt budget is spent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StatusParseError;
use crate::impl_status_conversions;

/// Remote operation carried by an outbox entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum SyncOperation {
    /// Upsert one scan list (header + lines) by list id.
    UpsertList { list_id: String },
    /// Delete all remote scan lists for an order, then create the new set
    /// carried in the payload.
    ReplaceOrder { order_id: String },
    /// Delete one remote scan list and its line records.
    DeleteList { list_id: String },
}

impl SyncOperation {
    /// Stable kind discriminator used for persistence.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UpsertList { .. } => "upsert_list",
            Self::ReplaceOrder { .. } => "replace_order",
            Self::DeleteList { .. } => "delete_list",
        }
    }

    /// Identifier of the record the operation targets.
    #[must_use]
    pub fn target_id(&self) -> &str {
        match self {
            Self::UpsertList { list_id } | Self::DeleteList { list_id } => list_id,
            Self::ReplaceOrder { order_id } => order_id,
        }
    }

    /// Rebuild an operation from its persisted kind and target id.
    pub fn from_parts(kind: &str, target_id: &str) -> Result<Self, StatusParseError> {
        match kind {
            "upsert_list" => Ok(Self::UpsertList { list_id: target_id.to_string() }),
            "replace_order" => Ok(Self::ReplaceOrder { order_id: target_id.to_string() }),
            "delete_list" => Ok(Self::DeleteList { list_id: target_id.to_string() }),
            _ => Err(StatusParseError::new("SyncOperation", kind)),
        }
    }
}

/// Delivery status of an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Awaiting first or next delivery attempt.
    Pending,
    /// Delivered to the remote store.
    Sent,
    /// Attempt budget exhausted; waiting for a manual retry sweep.
    DeadLetter,
}

impl_status_conversions!(OutboxStatus {
    Pending => "pending",
    Sent => "sent",
    DeadLetter => "dead_letter",
});

/// One durable sync job.
///
/// `payload_json` is the flattened snapshot captured at enqueue time; each
/// push carries the full state of its target so a late delivery is an
/// idempotent upsert rather than a partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutboxEntry {
    pub id: String,
    pub operation: SyncOperation,
    pub payload_json: String,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<i64>,
    pub created_at: i64,
    pub sent_at: Option<i64>,
}

impl SyncOutboxEntry {
    /// Create a pending entry due immediately.
    #[must_use]
    pub fn new(operation: SyncOperation, payload_json: String, created_at: i64) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            operation,
            payload_json,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
            created_at,
            sent_at: None,
        }
    }

    /// True when the entry is eligible for delivery at `now`.
    #[must_use]
    pub fn is_due(&self, now: i64) -> bool {
        self.status == OutboxStatus::Pending && self.next_attempt_at.map_or(true, |at| at <= now)
    }
}
