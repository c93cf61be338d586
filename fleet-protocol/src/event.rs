//! Event names and the typed event contract
//!
//! [`EventName`] is the closed set of names the server may push. The
//! [`WireEvent`] trait ties each payload type to its name so that listeners
//! registered for `LocationUpdate` can only ever be handed a `LocationUpdate`.
//!
//! # Example
//!
//! ```rust
//! use fleet_protocol::{EventName, StatusUpdate, WireEvent};
//!
//! fn describe<E: WireEvent>() -> &'static str {
//!     E::NAME.as_str()
//! }
//!
//! assert_eq!(describe::<StatusUpdate>(), "vehicle:status:update");
//! assert_eq!("vehicle:status:update".parse::<EventName>().ok(), Some(EventName::VehicleStatusUpdate));
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::id::VehicleId;

/// Names of every server-to-client event in the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    Connected,
    Error,
    HealthResponse,
    Pong,
    VehicleLocationUpdate,
    VehicleStatusUpdate,
    VehicleServiceUpdate,
    VehicleTrackingUpdate,
    VehicleCreated,
    VehicleDeleted,
    VehicleGpsSyncComplete,
}

impl EventName {
    /// All inbound event names, in declaration order
    pub const ALL: [EventName; 11] = [
        EventName::Connected,
        EventName::Error,
        EventName::HealthResponse,
        EventName::Pong,
        EventName::VehicleLocationUpdate,
        EventName::VehicleStatusUpdate,
        EventName::VehicleServiceUpdate,
        EventName::VehicleTrackingUpdate,
        EventName::VehicleCreated,
        EventName::VehicleDeleted,
        EventName::VehicleGpsSyncComplete,
    ];

    /// The name as it appears in the `event` field of a frame
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventName::Connected => "connected",
            EventName::Error => "error",
            EventName::HealthResponse => "health:response",
            EventName::Pong => "pong",
            EventName::VehicleLocationUpdate => "vehicle:location:update",
            EventName::VehicleStatusUpdate => "vehicle:status:update",
            EventName::VehicleServiceUpdate => "vehicle:service:update",
            EventName::VehicleTrackingUpdate => "vehicle:tracking:update",
            EventName::VehicleCreated => "vehicle:created",
            EventName::VehicleDeleted => "vehicle:deleted",
            EventName::VehicleGpsSyncComplete => "vehicle:gps:sync:complete",
        }
    }

    /// Look up a wire name, returning `None` for names outside the contract
    pub fn from_wire(name: &str) -> Option<Self> {
        EventName::ALL.into_iter().find(|candidate| candidate.as_str() == name)
    }

    /// Whether events with this name always carry a vehicle id
    pub fn is_vehicle_scoped(&self) -> bool {
        matches!(
            self,
            EventName::VehicleLocationUpdate
                | EventName::VehicleStatusUpdate
                | EventName::VehicleServiceUpdate
                | EventName::VehicleTrackingUpdate
                | EventName::VehicleCreated
                | EventName::VehicleDeleted
                | EventName::VehicleGpsSyncComplete
        )
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::from_wire(s).ok_or_else(|| ProtocolError::UnknownEvent(s.to_string()))
    }
}

/// A payload type bound to exactly one event name
///
/// Payloads must be plain data:
/// - Clone + Send + Sync: handed to listeners on the dispatch thread
/// - DeserializeOwned: decoded straight from the frame's `data` field
/// - 'static: stored type-erased in the event bus
pub trait WireEvent: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// The event name this payload travels under
    const NAME: EventName;
}

/// Payloads that concern a single vehicle
///
/// Entity-scoped consumers compare this id against their own before acting,
/// since the fleet channel multiplexes many vehicles onto one event name.
pub trait VehicleScoped {
    fn vehicle_id(&self) -> VehicleId;
}
