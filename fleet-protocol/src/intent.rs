//! Client-to-server intents

use serde_json::{json, Value};
use std::fmt;

use crate::frame::WireFrame;
use crate::id::VehicleId;

/// Outbound messages expressing interest (or loss of interest) in updates
///
/// Intents are fire-and-forget: the server acknowledges nothing and does not
/// persist them across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientIntent {
    WatchVehicle(VehicleId),
    UnwatchVehicle(VehicleId),
    WatchFleetTracking,
    UnwatchFleetTracking,
    Ping,
    Health,
}

impl ClientIntent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientIntent::WatchVehicle(_) => "vehicle:subscribe",
            ClientIntent::UnwatchVehicle(_) => "vehicle:unsubscribe",
            ClientIntent::WatchFleetTracking => "vehicle:tracking:subscribe",
            ClientIntent::UnwatchFleetTracking => "vehicle:tracking:unsubscribe",
            ClientIntent::Ping => "ping",
            ClientIntent::Health => "health",
        }
    }

    /// The intent that retracts this one, if any
    pub fn inverse(&self) -> Option<ClientIntent> {
        match *self {
            ClientIntent::WatchVehicle(id) => Some(ClientIntent::UnwatchVehicle(id)),
            ClientIntent::UnwatchVehicle(id) => Some(ClientIntent::WatchVehicle(id)),
            ClientIntent::WatchFleetTracking => Some(ClientIntent::UnwatchFleetTracking),
            ClientIntent::UnwatchFleetTracking => Some(ClientIntent::WatchFleetTracking),
            ClientIntent::Ping | ClientIntent::Health => None,
        }
    }

    pub fn to_frame(&self) -> WireFrame {
        let data = match self {
            ClientIntent::WatchVehicle(id) | ClientIntent::UnwatchVehicle(id) => {
                json!({ "vehicleId": id })
            }
            _ => Value::Null,
        };
        WireFrame::new(self.event_name(), data)
    }

    /// Read an intent back from a frame (used by test servers and tooling)
    pub fn from_frame(frame: &WireFrame) -> Option<Self> {
        let vehicle_id = || -> Option<VehicleId> {
            serde_json::from_value(frame.data.get("vehicleId")?.clone()).ok()
        };

        match frame.event.as_str() {
            "vehicle:subscribe" => vehicle_id().map(ClientIntent::WatchVehicle),
            "vehicle:unsubscribe" => vehicle_id().map(ClientIntent::UnwatchVehicle),
            "vehicle:tracking:subscribe" => Some(ClientIntent::WatchFleetTracking),
            "vehicle:tracking:unsubscribe" => Some(ClientIntent::UnwatchFleetTracking),
            "ping" => Some(ClientIntent::Ping),
            "health" => Some(ClientIntent::Health),
            _ => None,
        }
    }
}

impl fmt::Display for ClientIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIntent::WatchVehicle(id) | ClientIntent::UnwatchVehicle(id) => {
                write!(f, "{} #{}", self.event_name(), id)
            }
            _ => f.write_str(self.event_name()),
        }
    }
}
