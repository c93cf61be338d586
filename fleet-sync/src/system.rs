//! FleetSync - composition root of the realtime client
//!
//! Builds exactly one event bus, one connection manager and one subscription
//! registry, and hands out bindings over them. There is no global instance:
//! the application owns the `FleetSync` and passes it (or the pieces it
//! needs) to its views.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use fleet_bus::{Binding, BindingBuilder, EventBus, IntentSink, SubscriptionRegistry};
use fleet_protocol::VehicleId;
use fleet_state::{FleetTracker, VehicleCache, VehicleWatcher};
use fleet_stream::{ConnectionManager, Connector, StreamConfig, WsConnector};

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::settings::SyncSettings;

/// Realtime client for the rental dashboard
///
/// Fully synchronous - no async/await required.
///
/// # Example
///
/// ```rust,ignore
/// use fleet_sync::{FleetSync, SyncSettings};
///
/// let sync = FleetSync::start(SyncSettings::from_env()?)?;
///
/// // Map view: every vehicle on the fleet channel
/// let fleet = sync.track_fleet();
///
/// // Detail view: one vehicle
/// let detail = sync.watch_vehicle(VehicleId::new(7));
///
/// println!("{}", sync.diagnostics());
/// ```
pub struct FleetSync {
    bus: EventBus,
    connection: Arc<ConnectionManager>,
    registry: SubscriptionRegistry,
}

impl FleetSync {
    /// Create a client on the WebSocket transport; not connected yet
    pub fn new(config: StreamConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(WsConnector::new()))
    }

    /// Create a client on a custom transport; not connected yet
    pub fn with_connector(config: StreamConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let bus = EventBus::new();
        let connection = Arc::new(ConnectionManager::with_connector(
            config,
            bus.clone(),
            connector,
        )?);
        let registry = SubscriptionRegistry::new(connection.clone() as Arc<dyn IntentSink>);

        info!(endpoint = %connection.config().endpoint, "Fleet sync created");
        Ok(Self {
            bus,
            connection,
            registry,
        })
    }

    /// Create a client from settings and connect right away
    ///
    /// Connects with the configured credential, or anonymously without one.
    pub fn start(settings: SyncSettings) -> Result<Self> {
        let sync = Self::new(settings.stream)?;
        match settings.credential {
            Some(token) => sync.update_credential(token)?,
            None => sync.connect()?,
        }
        Ok(sync)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn connect(&self) -> Result<()> {
        Ok(self.connection.connect()?)
    }

    pub fn disconnect(&self) -> Result<()> {
        Ok(self.connection.disconnect()?)
    }

    /// Swap the bearer credential; the connection is cycled to apply it
    pub fn update_credential(&self, token: impl Into<String>) -> Result<()> {
        Ok(self.connection.update_credential(token)?)
    }

    /// Forget the credential (logout) and disconnect
    pub fn clear_credential(&self) -> Result<()> {
        Ok(self.connection.clear_credential()?)
    }

    /// Start composing a custom binding
    pub fn binding(&self) -> BindingBuilder {
        Binding::builder(&self.bus, &self.registry)
    }

    /// Fleet-wide tracking into a fresh cache
    pub fn track_fleet(&self) -> FleetTracker {
        FleetTracker::start(&self.bus, &self.registry)
    }

    /// Fleet-wide tracking into `cache`, e.g. one seeded from a REST fetch
    pub fn track_fleet_into(&self, cache: VehicleCache) -> FleetTracker {
        FleetTracker::with_cache(&self.bus, &self.registry, cache)
    }

    pub fn watch_vehicle(&self, id: VehicleId) -> VehicleWatcher {
        VehicleWatcher::start(&self.bus, &self.registry, id)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            endpoint: self.connection.config().endpoint.to_string(),
            connection_state: self.connection.state(),
            reconnect_attempts: self.connection.reconnect_attempts(),
            max_reconnect_attempts: self.connection.config().max_reconnect_attempts,
            has_credential: self.connection.has_credential(),
            bus: self.bus.stats(),
        }
    }

    /// Close the connection and stop the worker
    ///
    /// Also runs on drop. Bindings still alive afterwards release cleanly;
    /// their retractions are dropped.
    pub fn shutdown(&self) {
        self.connection.shutdown();
    }
}

// Bindings can keep the manager alive through the bus; stop the worker here.
impl Drop for FleetSync {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for FleetSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FleetSync")
            .field("connection", &self.connection)
            .field("listeners", &self.bus.stats().total_listeners())
            .finish()
    }
}
