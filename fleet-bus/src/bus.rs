//! Typed publish/subscribe registry
//!
//! The bus maps each [`EventName`] to an ordered set of listeners and hands
//! every published payload to all of them, synchronously, in registration
//! order. A second, independent registry carries [`ConnectionState`]
//! transitions.
//!
//! # Example
//!
//! ```rust
//! use fleet_bus::EventBus;
//! use fleet_protocol::{StatusUpdate, VehicleId, VehicleStatus};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = seen.clone();
//! let handle = bus.on::<StatusUpdate, _>(move |update| {
//!     assert_eq!(update.new_status, VehicleStatus::Rented);
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! bus.publish(&StatusUpdate::new(VehicleId::new(7), VehicleStatus::Rented));
//! handle.unregister();
//! bus.publish(&StatusUpdate::new(VehicleId::new(7), VehicleStatus::Rented));
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, error, trace, warn};

use fleet_protocol::{EventName, ProtocolError, ServerEvent, WireEvent, WireFrame};

use crate::listener::{BindingId, ListenerId, ListenerKey, Unregister};
use crate::state::ConnectionState;
use crate::stats::BusStats;

type EventCallback = Arc<dyn Fn(&dyn Any) + Send + Sync>;
type StateCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Listener captured at the start of a dispatch pass
type Captured<F> = (ListenerId, F, Arc<AtomicBool>);

struct Entry<F> {
    owner: Option<BindingId>,
    callback: F,
    active: Arc<AtomicBool>,
}

impl<F: Clone> Entry<F> {
    fn capture(&self, id: ListenerId) -> Captured<F> {
        (id, self.callback.clone(), self.active.clone())
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    events: HashMap<EventName, BTreeMap<ListenerId, Entry<EventCallback>>>,
    connection: BTreeMap<ListenerId, Entry<StateCallback>>,
}

impl Registry {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId::new(self.next_id)
    }
}

pub(crate) struct BusInner {
    registry: Mutex<Registry>,
    /// Held for a whole dispatch pass; removal waits on it
    gate: ReentrantMutex<()>,
    next_binding: AtomicU64,
    connection_state: Mutex<ConnectionState>,
    events_dispatched: AtomicU64,
    rejected_frames: AtomicU64,
    listener_failures: AtomicU64,
}

impl BusInner {
    fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            gate: ReentrantMutex::new(()),
            next_binding: AtomicU64::new(0),
            connection_state: Mutex::new(ConnectionState::Disconnected),
            events_dispatched: AtomicU64::new(0),
            rejected_frames: AtomicU64::new(0),
            listener_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn remove(&self, key: ListenerKey) {
        let _gate = self.gate.lock();
        let mut registry = self.registry.lock();

        match key {
            ListenerKey::Event(name, id) => {
                let emptied = match registry.events.get_mut(&name) {
                    Some(listeners) => {
                        listeners.remove(&id);
                        listeners.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    registry.events.remove(&name);
                }
                trace!(event = %name, listener = %id, "Listener removed");
            }
            ListenerKey::Connection(id) => {
                registry.connection.remove(&id);
                trace!(listener = %id, "Connection listener removed");
            }
        }
    }
}

/// Shared event bus
///
/// Cloning is cheap and every clone refers to the same registry. The bus is
/// created once by the composition root and outlives every binding.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner::new()),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a listener for the event bound to `E`
    pub fn on<E, F>(&self, callback: F) -> Unregister
    where
        E: WireEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register_event(None, callback)
    }

    /// Register a listener tagged with the binding that owns it
    pub fn on_owned<E, F>(&self, owner: BindingId, callback: F) -> Unregister
    where
        E: WireEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register_event(Some(owner), callback)
    }

    /// Register a listener for connection state transitions
    pub fn on_connection_change<F>(&self, callback: F) -> Unregister
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.register_connection(None, callback)
    }

    pub fn on_connection_change_owned<F>(&self, owner: BindingId, callback: F) -> Unregister
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.register_connection(Some(owner), callback)
    }

    fn register_event<E, F>(&self, owner: Option<BindingId>, callback: F) -> Unregister
    where
        E: WireEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let erased: EventCallback = Arc::new(move |payload: &dyn Any| {
            if let Some(event) = payload.downcast_ref::<E>() {
                callback(event);
            }
        });
        let active = Arc::new(AtomicBool::new(true));

        let id = {
            let mut registry = self.inner.registry.lock();
            let id = registry.allocate();
            registry.events.entry(E::NAME).or_default().insert(
                id,
                Entry {
                    owner,
                    callback: erased,
                    active: active.clone(),
                },
            );
            id
        };

        trace!(event = %E::NAME, listener = %id, "Listener registered");
        Unregister::new(
            Arc::downgrade(&self.inner),
            ListenerKey::Event(E::NAME, id),
            active,
        )
    }

    fn register_connection<F>(&self, owner: Option<BindingId>, callback: F) -> Unregister
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));

        let id = {
            let mut registry = self.inner.registry.lock();
            let id = registry.allocate();
            registry.connection.insert(
                id,
                Entry {
                    owner,
                    callback: Arc::new(callback) as StateCallback,
                    active: active.clone(),
                },
            );
            id
        };

        trace!(listener = %id, "Connection listener registered");
        Unregister::new(
            Arc::downgrade(&self.inner),
            ListenerKey::Connection(id),
            active,
        )
    }

    /// Allocate an id for a new scoped binding
    pub fn next_binding_id(&self) -> BindingId {
        BindingId::new(self.inner.next_binding.fetch_add(1, Ordering::Relaxed) + 1)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Deliver a typed payload to every listener of `E::NAME`
    ///
    /// Returns the number of listeners that ran to completion.
    pub fn publish<E: WireEvent>(&self, payload: &E) -> usize {
        let _gate = self.inner.gate.lock();

        let listeners: Vec<Captured<EventCallback>> = {
            let registry = self.inner.registry.lock();
            registry
                .events
                .get(&E::NAME)
                .map(|entries| entries.iter().map(|(id, entry)| entry.capture(*id)).collect())
                .unwrap_or_default()
        };

        self.inner.events_dispatched.fetch_add(1, Ordering::Relaxed);
        trace!(event = %E::NAME, listeners = listeners.len(), "Dispatching event");

        let payload: &dyn Any = payload;
        self.run_pass(E::NAME.as_str(), listeners, |callback| callback(payload))
    }

    /// Deliver an already decoded server event
    pub fn publish_event(&self, event: &ServerEvent) -> usize {
        match event {
            ServerEvent::Connected(payload) => self.publish(payload),
            ServerEvent::Error(payload) => self.publish(payload),
            ServerEvent::HealthResponse(payload) => self.publish(payload),
            ServerEvent::Pong(payload) => self.publish(payload),
            ServerEvent::LocationUpdate(payload) => self.publish(payload),
            ServerEvent::StatusUpdate(payload) => self.publish(payload),
            ServerEvent::ServiceUpdate(payload) => self.publish(payload),
            ServerEvent::TrackingUpdate(payload) => self.publish(payload),
            ServerEvent::VehicleCreated(payload) => self.publish(payload),
            ServerEvent::VehicleDeleted(payload) => self.publish(payload),
            ServerEvent::GpsSyncComplete(payload) => self.publish(payload),
        }
    }

    /// Decode a raw frame by its event name and dispatch it
    ///
    /// Frames outside the contract and malformed payloads are counted, logged
    /// and returned as errors; they never reach a listener.
    pub fn publish_frame(&self, frame: &WireFrame) -> Result<EventName, ProtocolError> {
        match ServerEvent::decode(frame) {
            Ok(event) => {
                let name = event.name();
                self.publish_event(&event);
                Ok(name)
            }
            Err(err) => {
                self.inner.rejected_frames.fetch_add(1, Ordering::Relaxed);
                match &err {
                    ProtocolError::UnknownEvent(name) => {
                        debug!(event = %name, "Dropping frame with unknown event name");
                    }
                    other => {
                        warn!(event = %frame.event, error = %other, "Dropping malformed frame");
                    }
                }
                Err(err)
            }
        }
    }

    /// Record a connection state transition and notify connection listeners
    pub fn publish_connection_state(&self, state: ConnectionState) -> usize {
        let _gate = self.inner.gate.lock();
        *self.inner.connection_state.lock() = state;

        let listeners: Vec<Captured<StateCallback>> = {
            let registry = self.inner.registry.lock();
            registry
                .connection
                .iter()
                .map(|(id, entry)| entry.capture(*id))
                .collect()
        };

        debug!(state = %state, listeners = listeners.len(), "Connection state changed");
        self.run_pass("connection", listeners, |callback| callback(state))
    }

    /// Invoke captured listeners, skipping any removed since the capture
    fn run_pass<F>(
        &self,
        label: &str,
        listeners: Vec<Captured<F>>,
        invoke: impl Fn(&F),
    ) -> usize {
        let mut completed = 0;

        for (id, callback, active) in listeners {
            if !active.load(Ordering::Acquire) {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| invoke(&callback))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    self.inner.listener_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        event = label,
                        listener = %id,
                        "Listener panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        completed
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// The last state passed to [`publish_connection_state`](Self::publish_connection_state)
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.connection_state.lock()
    }

    pub fn listener_count(&self, name: EventName) -> usize {
        self.inner
            .registry
            .lock()
            .events
            .get(&name)
            .map_or(0, BTreeMap::len)
    }

    pub fn connection_listener_count(&self) -> usize {
        self.inner.registry.lock().connection.len()
    }

    /// Listeners (event and connection) still registered for a binding
    pub fn listeners_owned_by(&self, owner: BindingId) -> usize {
        let registry = self.inner.registry.lock();
        let events = registry
            .events
            .values()
            .flat_map(BTreeMap::values)
            .filter(|entry| entry.owner == Some(owner))
            .count();
        let connection = registry
            .connection
            .values()
            .filter(|entry| entry.owner == Some(owner))
            .count();
        events + connection
    }

    pub fn stats(&self) -> BusStats {
        let registry = self.inner.registry.lock();
        BusStats {
            listeners: registry
                .events
                .iter()
                .map(|(name, entries)| (*name, entries.len()))
                .collect(),
            connection_listeners: registry.connection.len(),
            events_dispatched: self.inner.events_dispatched.load(Ordering::Relaxed),
            rejected_frames: self.inner.rejected_frames.load(Ordering::Relaxed),
            listener_failures: self.inner.listener_failures.load(Ordering::Relaxed),
            connection_state: *self.inner.connection_state.lock(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.lock();
        f.debug_struct("EventBus")
            .field("event_names", &registry.events.len())
            .field("connection_listeners", &registry.connection.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_protocol::{LocationUpdate, StatusUpdate, TrackingUpdate, VehicleId, VehicleStatus};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn status(id: u64) -> StatusUpdate {
        StatusUpdate::new(VehicleId::new(id), VehicleStatus::Available)
    }

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |entry| sink.lock().push(entry))
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let bus = EventBus::new();
        let (log, record) = recorder();

        let r = record.clone();
        let _a = bus.on::<StatusUpdate, _>(move |_| r("first"));
        let r = record.clone();
        let _b = bus.on::<StatusUpdate, _>(move |_| r("second"));
        let r = record;
        let _c = bus.on::<StatusUpdate, _>(move |_| r("third"));

        assert_eq!(bus.publish(&status(1)), 3);
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_siblings() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(None));

        let _bad = bus.on::<StatusUpdate, _>(|_| panic!("listener blew up"));
        let slot = received.clone();
        let _good = bus.on::<StatusUpdate, _>(move |update| {
            *slot.lock() = Some(update.clone());
        });

        let update = status(4);
        let completed = bus.publish(&update);

        assert_eq!(completed, 1);
        assert_eq!(received.lock().as_ref(), Some(&update));
        assert_eq!(bus.stats().listener_failures, 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let first = bus.on::<StatusUpdate, _>(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = count.clone();
        let _second = bus.on::<StatusUpdate, _>(move |_| {
            c.fetch_add(10, Ordering::SeqCst);
        });

        assert!(first.unregister());
        assert!(!first.unregister());
        assert!(!first.is_registered());

        bus.publish(&status(1));
        assert_eq!(count.load(Ordering::SeqCst), 10);
        assert_eq!(bus.listener_count(EventName::VehicleStatusUpdate), 1);
    }

    #[test]
    fn test_listener_added_during_dispatch_waits_for_next_pass() {
        let bus = EventBus::new();
        let late_calls = Arc::new(AtomicUsize::new(0));
        let handles = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = bus.clone();
        let late = late_calls.clone();
        let stash = handles.clone();
        let _adder = bus.on::<StatusUpdate, _>(move |_| {
            let late = late.clone();
            let handle = inner_bus.on::<StatusUpdate, _>(move |_| {
                late.fetch_add(1, Ordering::SeqCst);
            });
            stash.lock().push(handle);
        });

        bus.publish(&status(1));
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        bus.publish(&status(1));
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_removed_during_dispatch_is_skipped() {
        let bus = EventBus::new();
        let (log, record) = recorder();
        let victim: Arc<Mutex<Option<Unregister>>> = Arc::new(Mutex::new(None));

        let slot = victim.clone();
        let r = record.clone();
        let _remover = bus.on::<StatusUpdate, _>(move |_| {
            r("remover");
            if let Some(handle) = slot.lock().as_ref() {
                handle.unregister();
            }
        });
        let r = record;
        *victim.lock() = Some(bus.on::<StatusUpdate, _>(move |_| r("victim")));

        bus.publish(&status(1));
        assert_eq!(*log.lock(), vec!["remover"]);
    }

    #[test]
    fn test_unregister_waits_for_in_flight_dispatch() {
        let bus = EventBus::new();
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();

        let done = finished.clone();
        let handle = bus.on::<StatusUpdate, _>(move |_| {
            let _ = started_tx.send(());
            thread::sleep(Duration::from_millis(50));
            done.store(true, Ordering::SeqCst);
        });

        let publisher = bus.clone();
        let worker = thread::spawn(move || publisher.publish(&status(1)));

        started_rx.recv().unwrap();
        handle.unregister();
        assert!(finished.load(Ordering::SeqCst));

        worker.join().unwrap();
    }

    #[test]
    fn test_payload_types_are_isolated_by_name() {
        let bus = EventBus::new();
        let location_calls = Arc::new(AtomicUsize::new(0));

        let c = location_calls.clone();
        let _h = bus.on::<LocationUpdate, _>(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let tracking = TrackingUpdate::from(LocationUpdate::new(VehicleId::new(3)));
        assert_eq!(bus.publish(&tracking), 0);
        assert_eq!(location_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_publish_frame_dispatches_by_name() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        let _h = bus.on::<LocationUpdate, _>(move |update| s.lock().push(update.vehicle_id));

        let frame = WireFrame::parse(
            r#"{"event":"vehicle:location:update","data":{"vehicleId":12,"latitude":1.0}}"#,
        )
        .unwrap();
        assert_eq!(bus.publish_frame(&frame).unwrap(), EventName::VehicleLocationUpdate);
        assert_eq!(*seen.lock(), vec![VehicleId::new(12)]);
    }

    #[test]
    fn test_publish_frame_rejects_unknown_and_malformed() {
        let bus = EventBus::new();
        let unknown = WireFrame::parse(r#"{"event":"vehicle:teleported","data":{}}"#).unwrap();
        let malformed = WireFrame::parse(r#"{"event":"vehicle:deleted","data":{}}"#).unwrap();

        assert!(bus.publish_frame(&unknown).is_err());
        assert!(bus.publish_frame(&malformed).is_err());
        assert_eq!(bus.stats().rejected_frames, 2);
        assert_eq!(bus.stats().events_dispatched, 0);
    }

    #[test]
    fn test_connection_listeners_are_separate() {
        let bus = EventBus::new();
        let states = Arc::new(Mutex::new(Vec::new()));

        let s = states.clone();
        let handle = bus.on_connection_change(move |state| s.lock().push(state));

        bus.publish(&status(1));
        bus.publish_connection_state(ConnectionState::Connecting);
        bus.publish_connection_state(ConnectionState::Connected);
        handle.unregister();
        bus.publish_connection_state(ConnectionState::Disconnected);

        assert_eq!(
            *states.lock(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
        assert_eq!(bus.connection_state(), ConnectionState::Disconnected);
        assert_eq!(bus.connection_listener_count(), 0);
    }

    #[test]
    fn test_owner_tags_are_counted() {
        let bus = EventBus::new();
        let owner = bus.next_binding_id();
        let other = bus.next_binding_id();
        assert_ne!(owner, other);

        let a = bus.on_owned::<StatusUpdate, _>(owner, |_| {});
        let _b = bus.on_owned::<LocationUpdate, _>(owner, |_| {});
        let _c = bus.on_connection_change_owned(owner, |_| {});
        let _d = bus.on_owned::<StatusUpdate, _>(other, |_| {});

        assert_eq!(bus.listeners_owned_by(owner), 3);
        a.unregister();
        assert_eq!(bus.listeners_owned_by(owner), 2);
        assert_eq!(bus.listeners_owned_by(other), 1);
    }

    #[test]
    fn test_unregister_after_bus_dropped() {
        let bus = EventBus::new();
        let handle = bus.on::<StatusUpdate, _>(|_| {});
        drop(bus);
        assert!(!handle.is_registered());
        assert!(handle.unregister());
        assert!(!handle.unregister());
    }
}
