//! Domain subscription registry
//!
//! Turns "interest in a vehicle" or "interest in the fleet tracking channel"
//! into outbound [`ClientIntent`]s. The registry keeps no record of who is
//! watching what; the binding that issued a watch owns its retraction.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use fleet_protocol::{ClientIntent, VehicleId};

/// Outbound side of the realtime connection
///
/// Implemented by the connection manager; tests substitute a recorder.
pub trait IntentSink: Send + Sync {
    /// Whether the connection is currently open
    fn is_open(&self) -> bool;

    /// Queue an intent for transmission, returning `false` if it was dropped
    fn send_intent(&self, intent: ClientIntent) -> bool;
}

/// Emits watch/unwatch intents over the shared connection
///
/// Intents issued while the connection is not open are dropped, not queued.
/// Live bindings re-issue their watches when the connection comes back.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    sink: Arc<dyn IntentSink>,
}

impl SubscriptionRegistry {
    pub fn new(sink: Arc<dyn IntentSink>) -> Self {
        Self { sink }
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_open()
    }

    pub fn watch_vehicle(&self, id: VehicleId) -> bool {
        self.emit(ClientIntent::WatchVehicle(id))
    }

    pub fn unwatch_vehicle(&self, id: VehicleId) -> bool {
        self.emit(ClientIntent::UnwatchVehicle(id))
    }

    pub fn watch_fleet_tracking(&self) -> bool {
        self.emit(ClientIntent::WatchFleetTracking)
    }

    pub fn unwatch_fleet_tracking(&self) -> bool {
        self.emit(ClientIntent::UnwatchFleetTracking)
    }

    /// Send any intent, subject to the same drop-when-closed rule
    pub fn emit(&self, intent: ClientIntent) -> bool {
        if !self.sink.is_open() {
            debug!(intent = %intent, "Connection not open, dropping intent");
            return false;
        }

        let sent = self.sink.send_intent(intent);
        if sent {
            debug!(intent = %intent, "Intent sent");
        } else {
            debug!(intent = %intent, "Intent rejected by connection");
        }
        sent
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("open", &self.sink.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Recorder {
        open: AtomicBool,
        sent: Mutex<Vec<ClientIntent>>,
    }

    impl IntentSink for Recorder {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn send_intent(&self, intent: ClientIntent) -> bool {
            self.sent.lock().push(intent);
            true
        }
    }

    #[test]
    fn test_intents_dropped_while_closed() {
        let sink = Arc::new(Recorder::default());
        let registry = SubscriptionRegistry::new(sink.clone());

        assert!(!registry.watch_vehicle(VehicleId::new(7)));
        assert!(!registry.watch_fleet_tracking());
        assert!(sink.sent.lock().is_empty());
    }

    #[test]
    fn test_intents_sent_while_open() {
        let sink = Arc::new(Recorder::default());
        sink.open.store(true, Ordering::SeqCst);
        let registry = SubscriptionRegistry::new(sink.clone());

        assert!(registry.watch_vehicle(VehicleId::new(7)));
        assert!(registry.unwatch_vehicle(VehicleId::new(7)));
        assert!(registry.watch_fleet_tracking());
        assert!(registry.unwatch_fleet_tracking());

        assert_eq!(
            *sink.sent.lock(),
            vec![
                ClientIntent::WatchVehicle(VehicleId::new(7)),
                ClientIntent::UnwatchVehicle(VehicleId::new(7)),
                ClientIntent::WatchFleetTracking,
                ClientIntent::UnwatchFleetTracking,
            ]
        );
    }

    #[test]
    fn test_repeated_watch_is_not_deduplicated() {
        let sink = Arc::new(Recorder::default());
        sink.open.store(true, Ordering::SeqCst);
        let registry = SubscriptionRegistry::new(sink.clone());

        registry.watch_vehicle(VehicleId::new(2));
        registry.watch_vehicle(VehicleId::new(2));
        assert_eq!(sink.sent.lock().len(), 2);
    }
}
