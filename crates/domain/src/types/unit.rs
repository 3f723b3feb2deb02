//! Serialized inventory units referenced by the scan core.

use serde::{Deserialize, Serialize};

use crate::types::direction::UnitLifecycleStatus;

/// A serialized, individually identifiable inventory item.
///
/// Units are owned by the external asset registry; the scan core reads the
/// SKU for validation and writes `lifecycle_status`/`location_id` as a scan
/// side effect, but never manages the rest of the unit's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub sku: String,
    pub lifecycle_status: UnitLifecycleStatus,
    pub location_id: Option<String>,
}

impl Unit {
    /// Build a unit in the `Available` state with no location.
    #[must_use]
    pub fn available(id: &str, sku: &str) -> Self {
        Self {
            id: id.to_string(),
            sku: sku.to_string(),
            lifecycle_status: UnitLifecycleStatus::Available,
            location_id: None,
        }
    }
}
