//! # Loadout Infra
//!
//! Infrastructure adapters for the Loadout core.
//!
//! This crate contains:
//! - The SQLite-backed local cache (repositories over a pooled connection)
//! - The durable outbox worker and its retry policy
//!
//! Core port traits are implemented here; no business rules live in this
//! crate.

pub mod database;
pub mod errors;
pub mod sync;

pub use database::manager::DbManager;
pub use database::outbox_repository::SqliteOutboxRepository;
pub use database::scan_list_repository::SqliteScanListRepository;
pub use database::stock_repository::SqliteStockRepository;
pub use errors::InfraError;
pub use sync::outbox_worker::{EntryExecutor, OutboxWorker, OutboxWorkerConfig};
pub use sync::retry::RetryPolicy;
