//! SQLite-backed local cache: connection manager and repositories.

pub mod manager;
pub mod outbox_repository;
pub mod scan_list_repository;
pub mod stock_repository;
