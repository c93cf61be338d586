//! Sync-first connection manager
//!
//! [`ConnectionManager`] is the one owner of the realtime connection. All of
//! its methods are synchronous and return immediately; the work happens on
//! a background worker thread that owns the socket.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleet_bus::EventBus;
//! use fleet_stream::{ConnectionManager, StreamConfig};
//!
//! let bus = EventBus::new();
//! let config = StreamConfig::for_endpoint("wss://fleet.example.com/realtime")?;
//! let manager = ConnectionManager::new(config, bus.clone())?;
//!
//! manager.update_credential("eyJhbGciOi...")?;
//! // ... later, on logout
//! manager.clear_credential()?;
//! ```

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error};

use fleet_bus::{ConnectionState, EventBus, IntentSink};
use fleet_protocol::ClientIntent;

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::transport::Connector;
use crate::worker::{spawn_connection_worker, Command, ConnectionWorker, Shared};
use crate::ws::WsConnector;

/// Owns the single realtime connection and its reconnection policy
///
/// Every inbound frame is decoded and published on the [`EventBus`]; every
/// state transition is published to its connection listeners. Failed attempts
/// are retried every `reconnect_interval` until `max_reconnect_attempts`
/// consecutive failures, after which only an explicit [`connect`](Self::connect)
/// starts again.
pub struct ConnectionManager {
    config: StreamConfig,
    bus: EventBus,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Create a manager using the WebSocket transport
    ///
    /// This is a synchronous operation - no `.await` required. The connection
    /// is not opened until [`connect`](Self::connect) or
    /// [`update_credential`](Self::update_credential) is called.
    pub fn new(config: StreamConfig, bus: EventBus) -> Result<Self> {
        Self::with_connector(config, bus, Arc::new(WsConnector::new()))
    }

    /// Create a manager with a custom transport
    pub fn with_connector(
        config: StreamConfig,
        bus: EventBus,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StreamError::Runtime)?;

        let shared = Arc::new(Shared::default());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker = ConnectionWorker::new(config.clone(), bus.clone(), connector, shared.clone());
        let handle =
            spawn_connection_worker(worker, runtime, command_rx).map_err(StreamError::Runtime)?;

        Ok(Self {
            config,
            bus,
            shared,
            commands: command_tx,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Open the connection; no-op when already connected or connecting
    ///
    /// Resets the attempt counter, so this is also how to resume after the
    /// reconnection bound has been reached.
    pub fn connect(&self) -> Result<()> {
        let state = self.state();
        if state.is_active() {
            debug!(state = %state, "Connect ignored, already active");
            return Ok(());
        }
        self.send(Command::Connect)
    }

    /// Close the connection and cancel any pending reconnection
    pub fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect)
    }

    /// Replace the bearer credential and reconnect with it immediately
    pub fn update_credential(&self, token: impl Into<String>) -> Result<()> {
        *self.shared.credential.write() = Some(token.into());
        self.send(Command::Reconnect)
    }

    /// Forget the credential and disconnect
    ///
    /// A later [`connect`](Self::connect) opens an anonymous connection.
    pub fn clear_credential(&self) -> Result<()> {
        *self.shared.credential.write() = None;
        self.send(Command::Disconnect)
    }

    pub fn has_credential(&self) -> bool {
        self.shared.credential.read().is_some()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Consecutive failed attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::Acquire)
    }

    /// Send a `ping` intent; `false` when not connected
    pub fn ping(&self) -> bool {
        self.is_connected() && self.send_intent(ClientIntent::Ping)
    }

    /// Ask the server for a `health:response`; `false` when not connected
    pub fn request_health(&self) -> bool {
        self.is_connected() && self.send_intent(ClientIntent::Health)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Stop the worker, closing the connection
    ///
    /// Called automatically on drop. Waits for the worker thread unless called
    /// from the worker thread itself (e.g. from inside a listener).
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                debug!("Shutdown requested from the connection worker, not joining");
                return;
            }
            if handle.join().is_err() {
                error!("Connection worker panicked");
            }
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| StreamError::WorkerUnavailable)
    }
}

impl IntentSink for ConnectionManager {
    fn is_open(&self) -> bool {
        self.is_connected()
    }

    fn send_intent(&self, intent: ClientIntent) -> bool {
        self.send(Command::Send(intent.to_frame())).is_ok()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        debug!(state = %self.state(), "ConnectionManager dropping");
        self.shutdown();
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.config.endpoint.as_str())
            .field("state", &self.state())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish()
    }
}
