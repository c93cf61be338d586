//! # fleet-sync
//!
//! Realtime synchronization client for a vehicle rental dashboard.
//!
//! One long-lived, reconnecting connection keeps many independent views
//! (lists, detail pages, the tracking map) coherent with server-pushed
//! vehicle changes, without each view opening its own socket.
//!
//! ```rust,no_run
//! use fleet_sync::{FleetSync, SyncSettings, VehicleId};
//!
//! fn main() -> fleet_sync::Result<()> {
//!     fleet_sync::logging::init_logging_from_env()?;
//!
//!     let sync = FleetSync::start(SyncSettings::from_env()?)?;
//!     let fleet = sync.track_fleet();
//!     let detail = sync.watch_vehicle(VehicleId::new(7));
//!
//!     for change in fleet.cache().changes() {
//!         println!("{} ({} vehicles)", change, fleet.len());
//!         if let Some(vehicle) = detail.current() {
//!             println!("  #7 at {:?}", vehicle.position());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! fleet-sync (composition root, settings, logging)
//!     ↓
//! fleet-state (VehicleCache, FleetTracker, VehicleWatcher)
//!     ↓
//! fleet-stream (ConnectionManager, reconnection, transports)
//!     ↓
//! fleet-bus (EventBus, SubscriptionRegistry, Binding)
//!     ↓
//! fleet-protocol (wire frames, events, intents)
//! ```

pub mod logging;

mod diagnostics;
mod error;
mod settings;
mod system;

pub use diagnostics::Diagnostics;
pub use error::{Result, SyncError};
pub use settings::SyncSettings;
pub use system::FleetSync;

pub use fleet_bus::{Binding, BindingBuilder, BusStats, ConnectionState, EventBus};
pub use fleet_protocol::{
    ClientIntent, ErrorPayload, EventName, ServerEvent, VehicleId, VehicleStatus, WireEvent,
    WireFrame,
};
pub use fleet_state::{FleetTracker, VehicleCache, VehicleSnapshot, VehicleWatcher};
pub use fleet_stream::{ConnectionManager, Connector, StreamConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{FleetSync, SyncSettings};
    pub use fleet_bus::{Binding, ConnectionState};
    pub use fleet_protocol::prelude::*;
    pub use fleet_state::prelude::*;
}
