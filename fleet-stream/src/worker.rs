//! Background worker thread for the realtime connection
//!
//! Spawns a thread with its own single-threaded tokio runtime. The worker
//! owns the transport link, the reconnection timer and the attempt counter,
//! and performs every bus dispatch, so all listeners run on this one thread.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use fleet_bus::{ConnectionState, EventBus};
use fleet_protocol::{ClientIntent, ErrorPayload, WireFrame};

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::policy::{ReconnectPolicy, RetryDecision};
use crate::transport::{CloseReason, Connector, TransportEvent, TransportLink};

/// Commands sent from the sync ConnectionManager to the background worker
#[derive(Debug)]
pub enum Command {
    /// Open the connection unless already connected or connecting
    Connect,
    /// Close the connection and cancel any pending retry
    Disconnect,
    /// Close and immediately reopen (credential changed)
    Reconnect,
    /// Send a frame over the open link
    Send(WireFrame),
    /// Stop the worker
    Shutdown,
}

/// State readable from any thread without asking the worker
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) state: RwLock<ConnectionState>,
    pub(crate) attempts: AtomicU32,
    pub(crate) credential: RwLock<Option<String>>,
}

/// Spawns the connection worker thread
///
/// The runtime is built by the caller so that failure to create it surfaces
/// as an error instead of a silently dead worker.
pub(crate) fn spawn_connection_worker(
    worker: ConnectionWorker,
    runtime: Runtime,
    commands: mpsc::UnboundedReceiver<Command>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("fleet-sync-connection".to_string())
        .spawn(move || {
            runtime.block_on(worker.run(commands));
        })
}

/// A connection attempt in flight; dropping it abandons the handshake
type PendingAttempt = BoxFuture<'static, Result<TransportLink>>;

pub(crate) struct ConnectionWorker {
    config: StreamConfig,
    bus: EventBus,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    policy: ReconnectPolicy,
    pending: Option<PendingAttempt>,
    link: Option<TransportLink>,
    opened_at: Option<Instant>,
    retry_at: Option<Instant>,
    keepalive: Option<Interval>,
}

impl ConnectionWorker {
    pub(crate) fn new(
        config: StreamConfig,
        bus: EventBus,
        connector: Arc<dyn Connector>,
        shared: Arc<Shared>,
    ) -> Self {
        let policy = ReconnectPolicy::new(config.reconnect_interval, config.max_reconnect_attempts);
        Self {
            config,
            bus,
            connector,
            shared,
            policy,
            pending: None,
            link: None,
            opened_at: None,
            retry_at: None,
            keepalive: None,
        }
    }

    /// Main loop running inside the worker runtime
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!(endpoint = %self.config.endpoint, "Connection worker started");

        loop {
            let attempting = self.pending.is_some();
            let linked = self.link.is_some();
            let retry_at = self.retry_at;

            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },

                outcome = next_outcome(&mut self.pending), if attempting => {
                    self.pending = None;
                    match outcome {
                        Ok(link) => self.opened(link),
                        Err(e) => self.attempt_failed(e),
                    }
                }

                event = next_link_event(&mut self.link), if linked => {
                    self.handle_link_event(event);
                }

                _ = sleep_until(retry_at), if retry_at.is_some() => {
                    self.retry_at = None;
                    debug!(attempt = self.policy.failures() + 1, "Reconnection timer fired");
                    self.start_attempt();
                }

                _ = tick(&mut self.keepalive), if linked => {
                    trace!("Keepalive ping");
                    self.send_frame(ClientIntent::Ping.to_frame());
                }
            }
        }

        self.retry_at = None;
        self.cancel_attempt();
        self.close_link();
        self.set_state(ConnectionState::Disconnected);
        info!("Connection worker shut down");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                if self.current_state().is_active() {
                    debug!(state = %self.current_state(), "Connect ignored, already active");
                    return;
                }
                self.reset_attempts();
                self.start_attempt();
            }
            Command::Disconnect => {
                self.retry_at = None;
                let cancelled = self.cancel_attempt();
                if self.close_link() || cancelled {
                    info!("Disconnected by request");
                }
                self.set_state(ConnectionState::Disconnected);
            }
            Command::Reconnect => {
                info!("Cycling connection for new credential");
                self.retry_at = None;
                self.cancel_attempt();
                self.close_link();
                self.set_state(ConnectionState::Disconnected);
                self.reset_attempts();
                self.start_attempt();
            }
            Command::Send(frame) => self.send_frame(frame),
            // handled by the run loop
            Command::Shutdown => {}
        }
    }

    fn handle_link_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Frame(frame)) => {
                trace!(event = %frame.event, "Frame received");
                // rejected frames are logged and counted by the bus
                let _ = self.bus.publish_frame(&frame);
            }
            Some(TransportEvent::Closed(reason)) if reason.is_server_requested() => {
                self.server_closed(reason)
            }
            Some(TransportEvent::Closed(reason)) => self.connection_lost(reason),
            None => self.connection_lost(CloseReason::Dropped(
                "transport ended without close".to_string(),
            )),
        }
    }

    /// Start one connection attempt with the current credential
    ///
    /// The handshake runs as part of the select loop, so commands that arrive
    /// meanwhile can abandon it.
    fn start_attempt(&mut self) {
        self.retry_at = None;
        self.cancel_attempt();
        self.close_link();
        self.set_state(ConnectionState::Connecting);

        let credential = self.shared.credential.read().clone();
        info!(
            endpoint = %self.config.endpoint,
            attempt = self.policy.failures() + 1,
            authenticated = credential.is_some(),
            "Connecting"
        );

        let connector = self.connector.clone();
        let config = self.config.clone();
        let timeout = config.connect_timeout;
        self.pending = Some(
            async move {
                let connect = connector.connect(&config, credential.as_deref());
                match tokio::time::timeout(timeout, connect).await {
                    Ok(result) => result,
                    Err(_) => Err(StreamError::Timeout(timeout)),
                }
            }
            .boxed(),
        );
    }

    /// Drop an in-flight attempt; `true` if there was one
    fn cancel_attempt(&mut self) -> bool {
        let cancelled = self.pending.take().is_some();
        if cancelled {
            debug!("Abandoned in-flight connection attempt");
        }
        cancelled
    }

    fn opened(&mut self, link: TransportLink) {
        self.policy.record_success();
        self.shared.attempts.store(0, Ordering::Release);
        self.link = Some(link);
        self.opened_at = Some(Instant::now());
        self.keepalive = self.config.keepalive_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        self.set_state(ConnectionState::Connected);
        info!(endpoint = %self.config.endpoint, "Connected");
    }

    fn attempt_failed(&mut self, error: StreamError) {
        let decision = self.policy.record_failure();
        let failures = self.policy.failures();
        self.shared.attempts.store(failures, Ordering::Release);

        warn!(
            attempt = failures,
            max_attempts = self.policy.max_attempts(),
            error = %error,
            "Connection attempt failed"
        );
        self.publish_error(error.to_string());
        self.set_state(ConnectionState::Error);

        match decision {
            RetryDecision::RetryAfter(delay) => {
                debug!(delay_ms = delay.as_millis() as u64, "Scheduling reconnection");
                self.retry_at = Some(Instant::now() + delay);
            }
            RetryDecision::Exhausted => {
                warn!(
                    attempts = failures,
                    "Reconnection attempts exhausted, waiting for explicit connect"
                );
            }
        }
    }

    /// Server-requested close: reconnect at once after a session that lasted,
    /// otherwise wait the normal interval
    fn server_closed(&mut self, reason: CloseReason) {
        let lasted = self.opened_at.map(|at| at.elapsed()).unwrap_or_default();
        self.close_link();
        self.set_state(ConnectionState::Disconnected);

        if lasted >= self.config.rotation_min_session {
            info!(reason = %reason, "Server requested disconnect, reconnecting now");
            self.start_attempt();
        } else {
            let delay = self.policy.interval();
            warn!(
                reason = %reason,
                session_ms = lasted.as_millis() as u64,
                delay_ms = delay.as_millis() as u64,
                "Server closed a short-lived session, reconnecting after interval"
            );
            self.retry_at = Some(Instant::now() + delay);
        }
    }

    fn connection_lost(&mut self, reason: CloseReason) {
        warn!(reason = %reason, "Connection lost");
        self.close_link();
        self.publish_error(reason.to_string());
        self.set_state(ConnectionState::Error);

        let delay = self.policy.interval();
        debug!(delay_ms = delay.as_millis() as u64, "Scheduling reconnection");
        self.retry_at = Some(Instant::now() + delay);
    }

    fn send_frame(&mut self, frame: WireFrame) {
        match &self.link {
            Some(link) => {
                let event = frame.event.clone();
                match link.send(frame) {
                    Ok(()) => trace!(event = %event, "Frame queued"),
                    Err(e) => warn!(event = %event, error = %e, "Failed to send frame"),
                }
            }
            None => debug!(event = %frame.event, "Not connected, dropping outbound frame"),
        }
    }

    fn publish_error(&self, message: String) {
        self.bus.publish(&ErrorPayload::now(message));
    }

    /// Drop the link (closing it) and stop the keepalive; `true` if one was open
    fn close_link(&mut self) -> bool {
        self.keepalive = None;
        self.opened_at = None;
        self.link.take().is_some()
    }

    fn reset_attempts(&mut self) {
        self.policy.reset();
        self.shared.attempts.store(0, Ordering::Release);
    }

    fn current_state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Record the new state and notify connection listeners on change
    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.shared.state.write(), state);
        if previous != state {
            self.bus.publish_connection_state(state);
        }
    }
}

async fn next_outcome(pending: &mut Option<PendingAttempt>) -> Result<TransportLink> {
    match pending {
        Some(attempt) => attempt.await,
        None => std::future::pending().await,
    }
}

async fn next_link_event(link: &mut Option<TransportLink>) -> Option<TransportEvent> {
    match link {
        Some(link) => link.next_event().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
