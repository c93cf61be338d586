//! # fleet-stream
//!
//! Owns the one realtime connection of a fleet dashboard.
//!
//! [`ConnectionManager`] opens the socket with the current bearer credential,
//! forwards every inbound frame to the [`fleet_bus::EventBus`], publishes
//! connection state transitions, and reconnects on failure:
//!
//! - a failed attempt is retried after a fixed interval, up to a bounded
//!   number of consecutive attempts; success resets the count
//! - an unexpected drop schedules a retry after the same interval
//! - a server-requested close (code 1000/4000) reconnects immediately
//! - an explicit [`ConnectionManager::disconnect`] cancels any pending retry
//!
//! Transport is abstracted behind [`Connector`]; [`WsConnector`] is the
//! production implementation and [`TransportLink::in_memory`] gives tests a
//! scripted peer.

pub mod config;
pub mod error;
pub mod manager;
pub mod policy;
pub mod transport;
mod worker;
pub mod ws;

pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use manager::ConnectionManager;
pub use policy::{ReconnectPolicy, RetryDecision};
pub use transport::{CloseReason, Connector, LinkPeer, TransportEvent, TransportLink};
pub use ws::WsConnector;
