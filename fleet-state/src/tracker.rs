//! Fleet-wide tracking binding
//!
//! [`FleetTracker`] is the "everything on the map" consumer: it watches the
//! fleet tracking channel and folds every vehicle event it sees into a
//! [`VehicleCache`]. Releasing it unwatches, unregisters and clears the cache.

use std::fmt;

use tracing::{debug, info};

use fleet_bus::{Binding, BindingId, EventBus, SubscriptionRegistry};
use fleet_protocol::{
    LocationUpdate, ServiceUpdate, StatusUpdate, TrackingUpdate, VehicleCreated, VehicleDeleted,
    VehicleId,
};

use crate::cache::{VehicleCache, VehicleMap};
use crate::snapshot::VehicleSnapshot;

pub struct FleetTracker {
    cache: VehicleCache,
    binding: Option<Binding>,
}

impl FleetTracker {
    /// Watch the fleet channel with a fresh cache
    pub fn start(bus: &EventBus, registry: &SubscriptionRegistry) -> Self {
        Self::with_cache(bus, registry, VehicleCache::new())
    }

    /// Watch the fleet channel, folding into an existing cache
    ///
    /// Use this to keep records seeded from an initial fetch.
    pub fn with_cache(bus: &EventBus, registry: &SubscriptionRegistry, cache: VehicleCache) -> Self {
        let binding = Binding::builder(bus, registry)
            .watch_fleet_tracking()
            .on::<TrackingUpdate, _>({
                let cache = cache.clone();
                move |update| {
                    cache.apply_tracking(update);
                }
            })
            .on::<LocationUpdate, _>({
                let cache = cache.clone();
                move |update| {
                    cache.apply_location(update);
                }
            })
            .on::<StatusUpdate, _>({
                let cache = cache.clone();
                move |update| {
                    cache.apply_status(update);
                }
            })
            .on::<ServiceUpdate, _>({
                let cache = cache.clone();
                move |update| {
                    cache.apply_service(update);
                }
            })
            .on::<VehicleCreated, _>({
                let cache = cache.clone();
                move |created| {
                    debug!(vehicle_id = %created.vehicle.id, "Vehicle added to fleet");
                    cache.insert_created(created);
                }
            })
            .on::<VehicleDeleted, _>({
                let cache = cache.clone();
                move |deleted| {
                    debug!(vehicle_id = %deleted.vehicle_id, "Vehicle retired from fleet");
                    cache.remove(deleted.vehicle_id);
                }
            })
            .activate();

        info!(binding = %binding.id(), "Fleet tracking started");
        Self {
            cache,
            binding: Some(binding),
        }
    }

    pub fn cache(&self) -> &VehicleCache {
        &self.cache
    }

    pub fn snapshot(&self) -> std::sync::Arc<VehicleMap> {
        self.cache.snapshot()
    }

    pub fn get(&self, id: VehicleId) -> Option<VehicleSnapshot> {
        self.cache.get(id)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn binding_id(&self) -> Option<BindingId> {
        self.binding.as_ref().map(Binding::id)
    }

    /// Stop tracking and clear the cache
    pub fn release(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(binding) = self.binding.take() {
            let id = binding.id();
            binding.release();
            self.cache.clear();
            info!(binding = %id, "Fleet tracking stopped");
        }
    }
}

impl Drop for FleetTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for FleetTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FleetTracker")
            .field("binding", &self.binding_id())
            .field("vehicles", &self.cache.len())
            .finish()
    }
}
