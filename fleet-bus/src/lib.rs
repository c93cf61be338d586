//! # fleet-bus
//!
//! In-process event distribution for the fleet realtime client.
//!
//! - [`EventBus`]: typed publish/subscribe keyed by [`fleet_protocol::EventName`],
//!   plus a separate registry for [`ConnectionState`] transitions
//! - [`SubscriptionRegistry`]: emits watch/unwatch intents through an
//!   [`IntentSink`] (the connection manager)
//! - [`Binding`]: scoped composition of listeners and watches with
//!   exactly-once release
//!
//! The bus knows nothing about transport. The connection manager feeds it
//! decoded frames and state transitions from its single worker thread.

pub mod binding;
pub mod bus;
pub mod listener;
pub mod registry;
pub mod state;
pub mod stats;

pub use binding::{Binding, BindingBuilder, Watch};
pub use bus::EventBus;
pub use listener::{BindingId, ListenerId, Unregister};
pub use registry::{IntentSink, SubscriptionRegistry};
pub use state::ConnectionState;
pub use stats::BusStats;
