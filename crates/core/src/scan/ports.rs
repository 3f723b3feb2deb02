//! Port interfaces for scan operations
//!
//! These traits define the boundaries between core business logic
//! and the external collaborators it depends on.

use async_trait::async_trait;
use loadout_domain::{OrderLineItem, Result, ScanDirection, Unit, UnitLifecycleStatus};

/// Trait for resolving and updating serialized inventory units
#[async_trait]
pub trait UnitRegistry: Send + Sync {
    /// Look up a unit by its identifier; `None` when unknown
    async fn lookup(&self, unit_id: &str) -> Result<Option<Unit>>;

    /// Write the unit's derived lifecycle status and optional location
    async fn set_status(
        &self,
        unit_id: &str,
        status: UnitLifecycleStatus,
        location_id: Option<&str>,
    ) -> Result<()>;
}

/// Trait for reading finalized order data
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Line items of the order, in quote order
    async fn get_line_items(&self, order_id: &str) -> Result<Vec<OrderLineItem>>;

    /// Directions selected for tracking; empty means all four
    async fn get_selected_directions(&self, order_id: &str) -> Result<Vec<ScanDirection>>;
}

/// Trait for checking the current session's permissions
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Whether the current session may perform `action` on `subject`
    async fn has_permission(&self, subject: &str, action: &str) -> Result<bool>;
}

/// Trait exposing the current session identity
pub trait Session: Send + Sync {
    /// Identifier of the signed-in user, if any
    fn current_user_id(&self) -> Option<String>;
}
