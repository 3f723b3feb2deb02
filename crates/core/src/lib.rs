//! # Loadout Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The scan application engine and checklist generator
//! - Port/adapter interfaces (traits)
//! - The synchronization reconciler and remote schema adapter
//!
//! ## Architecture Principles
//! - Only depends on `loadout-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod scan;
pub mod sync;

// Re-export specific items to avoid ambiguity
pub use scan::engine::{self, Adjustment};
pub use scan::generator::{build_scan_lists, GenerationService};
pub use scan::ports::{OrderSource, PermissionChecker, Session, UnitRegistry};
pub use scan::service::ScanService;
pub use sync::health::{SyncFault, SyncHealth};
pub use sync::ports::{OutboxQueue, RemoteStore, ScanListStore, StockStore};
pub use sync::reconciler::{StockMergeSummary, SyncReconciler};
pub use sync::schema::{FlattenedScanList, RemoteLineRecord, RemoteListRecord};
