//! Vehicle lifecycle status

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a rental vehicle
///
/// Statuses the client does not know about decode to [`VehicleStatus::Unknown`]
/// instead of failing the whole event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    Rented,
    Reserved,
    Maintenance,
    OutOfService,
    #[serde(other)]
    Unknown,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::Rented => "rented",
            VehicleStatus::Reserved => "reserved",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::OutOfService => "out_of_service",
            VehicleStatus::Unknown => "unknown",
        }
    }

    /// Whether the vehicle can be handed to a customer right now
    pub fn is_rentable(&self) -> bool {
        matches!(self, VehicleStatus::Available)
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
