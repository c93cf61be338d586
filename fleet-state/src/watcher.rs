//! Single-vehicle binding for detail views
//!
//! [`VehicleWatcher`] watches one vehicle, folds its location, status and
//! service events into one snapshot and remembers the outcome of the last
//! GPS resync. Updates for other vehicles multiplexed onto the same event
//! names are filtered out before they reach the merge.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use fleet_bus::{Binding, BindingId, EventBus, SubscriptionRegistry};
use fleet_protocol::{
    GpsSyncComplete, LocationUpdate, ServiceUpdate, StatusUpdate, TrackingUpdate, VehicleCreated,
    VehicleDeleted, VehicleId, VehicleRecord,
};

use crate::snapshot::{VehiclePatch, VehicleSnapshot};

struct WatchedVehicle {
    snapshot: watch::Sender<Option<VehicleSnapshot>>,
    gps_sync: Mutex<Option<GpsSyncComplete>>,
    retired: AtomicBool,
}

impl WatchedVehicle {
    /// Merge `patch`; a patch after retirement brings the vehicle back
    fn fold<P: VehiclePatch + ?Sized>(&self, patch: &P) -> bool {
        if self.retired.swap(false, Ordering::AcqRel) {
            debug!(vehicle_id = %patch.target(), "Retired vehicle reappeared");
        }
        self.snapshot.send_if_modified(|current| {
            if let Some(snapshot) = current.as_mut() {
                return snapshot.merge(patch);
            }
            *current = Some(VehicleSnapshot::from_patch(patch));
            true
        })
    }
}

pub struct VehicleWatcher {
    id: VehicleId,
    state: Arc<WatchedVehicle>,
    binding: Option<Binding>,
}

impl VehicleWatcher {
    pub fn start(bus: &EventBus, registry: &SubscriptionRegistry, id: VehicleId) -> Self {
        let (snapshot, _) = watch::channel(None);
        let state = Arc::new(WatchedVehicle {
            snapshot,
            gps_sync: Mutex::new(None),
            retired: AtomicBool::new(false),
        });

        let binding = Binding::builder(bus, registry)
            .watch_vehicle(id)
            .on_vehicle::<LocationUpdate, _>(id, {
                let state = state.clone();
                move |update| {
                    state.fold(update);
                }
            })
            .on_vehicle::<TrackingUpdate, _>(id, {
                let state = state.clone();
                move |update| {
                    state.fold(update);
                }
            })
            .on_vehicle::<StatusUpdate, _>(id, {
                let state = state.clone();
                move |update| {
                    state.fold(update);
                }
            })
            .on_vehicle::<ServiceUpdate, _>(id, {
                let state = state.clone();
                move |update| {
                    state.fold(update);
                }
            })
            .on_vehicle::<VehicleCreated, _>(id, {
                let state = state.clone();
                move |created| {
                    state.fold(created);
                }
            })
            .on_vehicle::<VehicleDeleted, _>(id, {
                let state = state.clone();
                move |_| {
                    info!(vehicle_id = %id, "Watched vehicle was retired");
                    state.retired.store(true, Ordering::Release);
                    state.snapshot.send_replace(None);
                }
            })
            .on_vehicle::<GpsSyncComplete, _>(id, {
                let state = state.clone();
                move |result| {
                    debug!(vehicle_id = %id, success = result.success, "GPS sync finished");
                    *state.gps_sync.lock() = Some(result.clone());
                }
            })
            .activate();

        debug!(vehicle_id = %id, binding = %binding.id(), "Watching vehicle");
        Self {
            id,
            state,
            binding: Some(binding),
        }
    }

    pub fn vehicle_id(&self) -> VehicleId {
        self.id
    }

    /// Merge the record from an initial fetch; realtime fields it lacks are kept
    pub fn seed(&self, record: &VehicleRecord) -> bool {
        if record.id != self.id {
            return false;
        }
        self.state.fold(record)
    }

    /// Latest merged snapshot, `None` before the first event or after retirement
    pub fn current(&self) -> Option<VehicleSnapshot> {
        self.state.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<VehicleSnapshot>> {
        self.state.snapshot.subscribe()
    }

    pub fn last_gps_sync(&self) -> Option<GpsSyncComplete> {
        self.state.gps_sync.lock().clone()
    }

    /// Whether the vehicle was deleted while watched
    pub fn is_retired(&self) -> bool {
        self.state.retired.load(Ordering::Acquire)
    }

    pub fn binding_id(&self) -> Option<BindingId> {
        self.binding.as_ref().map(Binding::id)
    }

    /// Stop watching; existing receivers keep the last snapshot
    pub fn release(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.release();
            debug!(vehicle_id = %self.id, "Stopped watching vehicle");
        }
    }
}

impl Drop for VehicleWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for VehicleWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VehicleWatcher")
            .field("vehicle_id", &self.id)
            .field("binding", &self.binding_id())
            .field("retired", &self.is_retired())
            .finish()
    }
}
