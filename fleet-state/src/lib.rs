//! # fleet-state
//!
//! Client-side mirror of vehicle state, derived purely from the realtime
//! event stream.
//!
//! - [`VehicleCache`]: id to latest [`VehicleSnapshot`], built by folding
//!   partial updates; absent fields are kept, arrival order wins
//! - [`FleetTracker`]: fleet-wide binding feeding a cache (map views)
//! - [`VehicleWatcher`]: one-vehicle binding (detail views)
//!
//! # Architecture
//!
//! ```text
//! EventBus ──► Binding (filtered listeners) ──► VehiclePatch::apply_to
//!                                                   │
//!                                   watch::Sender<Arc<BTreeMap<VehicleId, VehicleSnapshot>>>
//!                                                   │
//!                              snapshot() / subscribe() / changes()
//! ```

pub mod cache;
pub mod change;
pub mod iter;
pub mod snapshot;
pub mod tracker;
pub mod watcher;

pub use cache::{VehicleCache, VehicleMap};
pub use change::{CacheChange, ChangeKind};
pub use iter::{ChangeIterator, TimeoutIter, TryIter};
pub use snapshot::{VehiclePatch, VehicleSnapshot};
pub use tracker::FleetTracker;
pub use watcher::VehicleWatcher;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{FleetTracker, VehicleCache, VehiclePatch, VehicleSnapshot, VehicleWatcher};
}
