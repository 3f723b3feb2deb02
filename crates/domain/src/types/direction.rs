//! Movement directions and the unit lifecycle statuses they project.
//!
//! Equipment moves through four legs per event: depot → vehicle →
//! event site → vehicle → depot. Each leg has its own scan list, and
//! recording a scan on a leg projects a new lifecycle status onto the
//! scanned unit.

use serde::{Deserialize, Serialize};

use crate::impl_status_conversions;

/// One leg of the depot ↔ vehicle ↔ event movement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    /// Loading at the depot onto the vehicle (outbound).
    DepotToVehicle,
    /// Unloading the vehicle at the event site.
    VehicleToEvent,
    /// Loading at the event site back onto the vehicle (return).
    EventToVehicle,
    /// Unloading the vehicle back into the depot.
    VehicleToDepot,
}

impl ScanDirection {
    /// All four legs in pipeline order.
    pub const ALL: [Self; 4] =
        [Self::DepotToVehicle, Self::VehicleToEvent, Self::EventToVehicle, Self::VehicleToDepot];

    /// Lifecycle status a unit takes on when scanned in this direction.
    #[must_use]
    pub const fn unit_status_projection(self) -> UnitLifecycleStatus {
        match self {
            Self::DepotToVehicle => UnitLifecycleStatus::InTransitToEvent,
            Self::VehicleToEvent => UnitLifecycleStatus::InUseAtEvent,
            Self::EventToVehicle => UnitLifecycleStatus::InTransitToDepot,
            Self::VehicleToDepot => UnitLifecycleStatus::Available,
        }
    }

    /// True for the legs that move gear towards the event site.
    #[must_use]
    pub const fn is_outbound(self) -> bool {
        matches!(self, Self::DepotToVehicle | Self::VehicleToEvent)
    }
}

impl_status_conversions!(ScanDirection {
    DepotToVehicle => "depot_to_vehicle",
    VehicleToEvent => "vehicle_to_event",
    EventToVehicle => "event_to_vehicle",
    VehicleToDepot => "vehicle_to_depot",
});

/// Lifecycle status of a serialized inventory unit.
///
/// The scan core writes the four statuses produced by
/// [`ScanDirection::unit_status_projection`]; `Reserved` and `InRepair` are
/// set by other subsystems and only read back here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitLifecycleStatus {
    Available,
    Reserved,
    InTransitToEvent,
    InUseAtEvent,
    InTransitToDepot,
    InRepair,
}

impl_status_conversions!(UnitLifecycleStatus {
    Available => "available",
    Reserved => "reserved",
    InTransitToEvent => "in_transit_to_event",
    InUseAtEvent => "in_use_at_event",
    InTransitToDepot => "in_transit_to_depot",
    InRepair => "in_repair",
});
