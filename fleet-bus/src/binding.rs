//! Scoped consumer bindings
//!
//! A [`Binding`] ties one consumer's lifetime to a set of bus listeners and
//! watch intents. Building it declares what the consumer needs; activating it
//! registers the listeners and issues the watches; releasing it (explicitly or
//! by dropping) removes every listener and retracts every watch, exactly once.
//!
//! ```rust
//! use fleet_bus::{Binding, EventBus, IntentSink, SubscriptionRegistry};
//! use fleet_protocol::{ClientIntent, LocationUpdate, VehicleId};
//! use std::sync::Arc;
//!
//! struct Offline;
//! impl IntentSink for Offline {
//!     fn is_open(&self) -> bool { false }
//!     fn send_intent(&self, _: ClientIntent) -> bool { false }
//! }
//!
//! let bus = EventBus::new();
//! let registry = SubscriptionRegistry::new(Arc::new(Offline));
//!
//! let binding = Binding::builder(&bus, &registry)
//!     .watch_vehicle(VehicleId::new(7))
//!     .on_vehicle::<LocationUpdate, _>(VehicleId::new(7), |update| {
//!         println!("vehicle 7 at {:?}", update.latitude);
//!     })
//!     .activate();
//!
//! assert_eq!(bus.listeners_owned_by(binding.id()), 2);
//! binding.release();
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use fleet_protocol::{ClientIntent, VehicleId, VehicleScoped, WireEvent};

use crate::bus::EventBus;
use crate::listener::{BindingId, Unregister};
use crate::registry::SubscriptionRegistry;
use crate::state::ConnectionState;

/// A server-side interest held by a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Watch {
    Vehicle(VehicleId),
    FleetTracking,
}

impl Watch {
    pub fn intent(&self) -> ClientIntent {
        match *self {
            Watch::Vehicle(id) => ClientIntent::WatchVehicle(id),
            Watch::FleetTracking => ClientIntent::WatchFleetTracking,
        }
    }

    pub fn retraction(&self) -> ClientIntent {
        match *self {
            Watch::Vehicle(id) => ClientIntent::UnwatchVehicle(id),
            Watch::FleetTracking => ClientIntent::UnwatchFleetTracking,
        }
    }
}

type PendingListener = Box<dyn FnOnce(&EventBus, BindingId) -> Unregister + Send>;

/// Declares the listeners and watches of a binding before activation
#[must_use = "a binding does nothing until activated"]
pub struct BindingBuilder {
    bus: EventBus,
    registry: SubscriptionRegistry,
    id: BindingId,
    watches: Vec<Watch>,
    pending: Vec<PendingListener>,
}

impl BindingBuilder {
    pub fn watch_vehicle(mut self, id: VehicleId) -> Self {
        self.watches.push(Watch::Vehicle(id));
        self
    }

    pub fn watch_fleet_tracking(mut self) -> Self {
        self.watches.push(Watch::FleetTracking);
        self
    }

    /// Listen to every event of type `E`
    pub fn on<E, F>(mut self, handler: F) -> Self
    where
        E: WireEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.pending
            .push(Box::new(move |bus: &EventBus, owner: BindingId| {
                bus.on_owned::<E, _>(owner, handler)
            }));
        self
    }

    /// Listen to events of type `E` for one vehicle only
    ///
    /// Events for other vehicles sharing the same name (the fleet channel
    /// multiplexes all of them) are dropped before reaching `handler`.
    pub fn on_vehicle<E, F>(self, id: VehicleId, handler: F) -> Self
    where
        E: WireEvent + VehicleScoped,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.on::<E, _>(move |event: &E| {
            if event.vehicle_id() == id {
                handler(event);
            } else {
                trace!(vehicle_id = %event.vehicle_id(), wanted = %id, "Filtered event for other vehicle");
            }
        })
    }

    pub fn on_connection_change<F>(mut self, handler: F) -> Self
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.pending
            .push(Box::new(move |bus: &EventBus, owner: BindingId| {
                bus.on_connection_change_owned(owner, handler)
            }));
        self
    }

    /// Register all listeners, then issue watches if the connection is open
    ///
    /// A binding with watches also re-issues them on every transition to
    /// [`ConnectionState::Connected`] until it is released.
    pub fn activate(self) -> Binding {
        let BindingBuilder {
            bus,
            registry,
            id,
            watches,
            pending,
        } = self;

        let mut handles: Vec<Unregister> = pending
            .into_iter()
            .map(|register| register(&bus, id))
            .collect();

        let released = Arc::new(AtomicBool::new(false));
        let watches: Arc<[Watch]> = watches.into();

        if !watches.is_empty() {
            // set once the watches went out on the current session, so a
            // Connected transition racing the initial check issues them once
            let issued = Arc::new(AtomicBool::new(false));

            let rewatch_registry = registry.clone();
            let rewatch = watches.clone();
            let rewatch_released = released.clone();
            let rewatch_issued = issued.clone();
            handles.push(bus.on_connection_change_owned(id, move |state| {
                if state != ConnectionState::Connected {
                    rewatch_issued.store(false, Ordering::Release);
                    return;
                }
                if rewatch_released.load(Ordering::Acquire)
                    || rewatch_issued.swap(true, Ordering::AcqRel)
                {
                    return;
                }
                debug!(binding = %id, watches = rewatch.len(), "Connected, re-issuing watches");
                for watch in rewatch.iter() {
                    rewatch_registry.emit(watch.intent());
                }
            }));

            if registry.is_open() && !issued.swap(true, Ordering::AcqRel) {
                for watch in watches.iter() {
                    registry.emit(watch.intent());
                }
            }
        }

        debug!(
            binding = %id,
            listeners = handles.len(),
            watches = watches.len(),
            "Binding activated"
        );

        Binding {
            id,
            bus,
            registry,
            watches,
            handles,
            released,
        }
    }
}

/// A live set of listeners and watches owned by one consumer
///
/// Released exactly once, by [`release`](Binding::release) or on drop. After
/// release returns, none of its handlers will run again.
pub struct Binding {
    id: BindingId,
    bus: EventBus,
    registry: SubscriptionRegistry,
    watches: Arc<[Watch]>,
    handles: Vec<Unregister>,
    released: Arc<AtomicBool>,
}

impl Binding {
    pub fn builder(bus: &EventBus, registry: &SubscriptionRegistry) -> BindingBuilder {
        BindingBuilder {
            id: bus.next_binding_id(),
            bus: bus.clone(),
            registry: registry.clone(),
            watches: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn watches(&self) -> &[Watch] {
        &self.watches
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Listeners this binding still has on the bus
    pub fn listener_count(&self) -> usize {
        self.bus.listeners_owned_by(self.id)
    }

    pub fn release(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        for handle in std::mem::take(&mut self.handles) {
            handle.unregister();
        }

        for watch in self.watches.iter() {
            self.registry.emit(watch.retraction());
        }

        debug!(binding = %self.id, "Binding released");
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("watches", &self.watches)
            .field("listeners", &self.handles.len())
            .field("released", &self.is_released())
            .finish()
    }
}
