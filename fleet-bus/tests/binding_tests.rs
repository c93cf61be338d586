//! Lifecycle tests for scoped bindings against a recording intent sink

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rstest::rstest;

use fleet_bus::{Binding, ConnectionState, EventBus, IntentSink, SubscriptionRegistry};
use fleet_protocol::{
    ClientIntent, LocationUpdate, ServiceUpdate, StatusUpdate, TrackingUpdate, VehicleId,
    VehicleStatus,
};

/// Intent sink that records everything and can be opened/closed
#[derive(Default)]
struct RecordingSink {
    open: AtomicBool,
    sent: Mutex<Vec<ClientIntent>>,
}

impl RecordingSink {
    fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    fn sent(&self) -> Vec<ClientIntent> {
        self.sent.lock().clone()
    }

    fn count(&self, intent: ClientIntent) -> usize {
        self.sent.lock().iter().filter(|sent| **sent == intent).count()
    }
}

impl IntentSink for RecordingSink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_intent(&self, intent: ClientIntent) -> bool {
        self.sent.lock().push(intent);
        true
    }
}

struct Harness {
    bus: EventBus,
    registry: SubscriptionRegistry,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new(open: bool) -> Self {
        let sink = Arc::new(RecordingSink::default());
        sink.set_open(open);
        Self {
            bus: EventBus::new(),
            registry: SubscriptionRegistry::new(sink.clone()),
            sink,
        }
    }

    /// Simulate the connection manager completing a (re)connect
    fn connect(&self) {
        self.sink.set_open(true);
        self.bus.publish_connection_state(ConnectionState::Connected);
    }

    fn disconnect(&self) {
        self.sink.set_open(false);
        self.bus.publish_connection_state(ConnectionState::Disconnected);
    }
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Clone + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    (count, move || {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn test_release_removes_all_listeners_and_retracts_watch() {
    let h = Harness::new(true);
    let id = VehicleId::new(7);

    let binding = Binding::builder(&h.bus, &h.registry)
        .watch_vehicle(id)
        .on_vehicle::<LocationUpdate, _>(id, |_| {})
        .on_vehicle::<StatusUpdate, _>(id, |_| {})
        .on_vehicle::<ServiceUpdate, _>(id, |_| {})
        .activate();

    let owner = binding.id();
    assert_eq!(h.sink.count(ClientIntent::WatchVehicle(id)), 1);
    assert!(h.bus.listeners_owned_by(owner) >= 3);

    binding.release();

    assert_eq!(h.bus.listeners_owned_by(owner), 0);
    assert_eq!(h.sink.count(ClientIntent::UnwatchVehicle(id)), 1);
    assert_eq!(h.bus.stats().total_listeners(), 0);
}

#[test]
fn test_fleet_event_for_other_vehicle_is_filtered() {
    let h = Harness::new(true);
    let (hits, hit) = counter();

    let _binding = Binding::builder(&h.bus, &h.registry)
        .watch_vehicle(VehicleId::new(9))
        .on_vehicle::<TrackingUpdate, _>(VehicleId::new(9), move |_| hit())
        .activate();

    let other = TrackingUpdate::from(LocationUpdate::new(VehicleId::new(7)).with_position(1.0, 2.0));
    h.bus.publish(&other);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let mine = TrackingUpdate::from(LocationUpdate::new(VehicleId::new(9)).with_position(1.0, 2.0));
    h.bus.publish(&mine);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_watch_not_issued_while_closed_then_issued_on_connect() {
    let h = Harness::new(false);
    let id = VehicleId::new(3);

    let _binding = Binding::builder(&h.bus, &h.registry)
        .watch_vehicle(id)
        .activate();
    assert!(h.sink.sent().is_empty());

    h.connect();
    assert_eq!(h.sink.sent(), vec![ClientIntent::WatchVehicle(id)]);
}

#[rstest]
#[case(1)]
#[case(3)]
fn test_watches_reissued_on_every_reconnect(#[case] reconnects: usize) {
    let h = Harness::new(true);

    let _binding = Binding::builder(&h.bus, &h.registry)
        .watch_fleet_tracking()
        .activate();
    assert_eq!(h.sink.count(ClientIntent::WatchFleetTracking), 1);

    for _ in 0..reconnects {
        h.disconnect();
        h.connect();
    }

    assert_eq!(h.sink.count(ClientIntent::WatchFleetTracking), 1 + reconnects);
}

#[test]
fn test_binding_released_while_disconnected_does_not_rewatch() {
    let h = Harness::new(true);
    let id = VehicleId::new(5);

    let binding = Binding::builder(&h.bus, &h.registry)
        .watch_vehicle(id)
        .activate();

    h.disconnect();
    binding.release();
    h.connect();

    assert_eq!(h.sink.count(ClientIntent::WatchVehicle(id)), 1);
    // the unwatch was attempted while closed and dropped
    assert_eq!(h.sink.count(ClientIntent::UnwatchVehicle(id)), 0);
}

#[test]
fn test_independent_bindings_issue_their_own_pairs() {
    let h = Harness::new(true);
    let id = VehicleId::new(11);

    let first = Binding::builder(&h.bus, &h.registry).watch_vehicle(id).activate();
    let second = Binding::builder(&h.bus, &h.registry).watch_vehicle(id).activate();
    assert_eq!(h.sink.count(ClientIntent::WatchVehicle(id)), 2);

    first.release();
    assert_eq!(h.sink.count(ClientIntent::UnwatchVehicle(id)), 1);
    assert!(!second.is_released());

    drop(second);
    assert_eq!(h.sink.count(ClientIntent::UnwatchVehicle(id)), 2);
}

#[test]
fn test_connection_handler_sees_transitions_until_release() {
    let h = Harness::new(false);
    let states = Arc::new(Mutex::new(Vec::new()));

    let s = states.clone();
    let binding = Binding::builder(&h.bus, &h.registry)
        .on_connection_change(move |state| s.lock().push(state))
        .activate();

    h.bus.publish_connection_state(ConnectionState::Connecting);
    h.connect();
    binding.release();
    h.disconnect();

    assert_eq!(
        *states.lock(),
        vec![ConnectionState::Connecting, ConnectionState::Connected]
    );
}

#[test]
fn test_release_from_inside_handler_stops_remaining_handlers() {
    let h = Harness::new(false);
    let slot: Arc<Mutex<Option<Binding>>> = Arc::new(Mutex::new(None));
    let (late_hits, late_hit) = counter();

    let release_slot = slot.clone();
    let _releaser = Binding::builder(&h.bus, &h.registry)
        .on::<StatusUpdate, _>(move |_| {
            if let Some(binding) = release_slot.lock().take() {
                binding.release();
            }
        })
        .activate();

    *slot.lock() = Some(
        Binding::builder(&h.bus, &h.registry)
            .on::<StatusUpdate, _>(move |_| late_hit())
            .activate(),
    );

    h.bus
        .publish(&StatusUpdate::new(VehicleId::new(1), VehicleStatus::Reserved));
    assert_eq!(late_hits.load(Ordering::SeqCst), 0);
}
