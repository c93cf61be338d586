//! # fleet-protocol
//!
//! The wire contract spoken between the rental dashboard and the realtime
//! vehicle service.
//!
//! Every frame, in both directions, is a JSON text message of the shape
//! `{"event": "<name>", "data": <payload>}`. Inbound event names form a closed
//! enumeration ([`EventName`]) and each name is bound to exactly one payload
//! type at compile time through the [`WireEvent`] trait:
//!
//! ```rust
//! use fleet_protocol::{EventName, LocationUpdate, WireEvent};
//!
//! assert_eq!(LocationUpdate::NAME, EventName::VehicleLocationUpdate);
//! assert_eq!(LocationUpdate::NAME.as_str(), "vehicle:location:update");
//! ```
//!
//! Outbound traffic is limited to the [`ClientIntent`] set (watch/unwatch a
//! vehicle, watch/unwatch the fleet tracking channel, ping, health).
//!
//! ## Decoding
//!
//! ```rust
//! use fleet_protocol::{ServerEvent, WireFrame};
//!
//! let frame = WireFrame::parse(
//!     r#"{"event":"vehicle:status:update","data":{"vehicleId":7,"newStatus":"rented"}}"#,
//! )?;
//! match ServerEvent::decode(&frame)? {
//!     ServerEvent::StatusUpdate(update) => assert_eq!(update.vehicle_id.get(), 7),
//!     other => panic!("unexpected event {:?}", other.name()),
//! }
//! # Ok::<(), fleet_protocol::ProtocolError>(())
//! ```

pub mod error;
pub mod event;
pub mod frame;
pub mod id;
pub mod intent;
pub mod payload;
pub mod status;

pub use error::{ProtocolError, Result};
pub use event::{EventName, VehicleScoped, WireEvent};
pub use frame::{ServerEvent, WireFrame};
pub use id::VehicleId;
pub use intent::ClientIntent;
pub use payload::{
    ConnectedPayload, ErrorPayload, GpsSyncComplete, HealthResponse, LocationUpdate, PongPayload,
    ServiceUpdate, StatusUpdate, TrackingUpdate, VehicleCreated, VehicleDeleted, VehicleRecord,
};
pub use status::VehicleStatus;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ClientIntent, EventName, LocationUpdate, ServerEvent, StatusUpdate, TrackingUpdate,
        VehicleId, VehicleScoped, VehicleStatus, WireEvent, WireFrame,
    };
}
