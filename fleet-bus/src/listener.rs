//! Listener identity and removal handles

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use fleet_protocol::EventName;

use crate::bus::BusInner;

/// Identity of one registered listener
///
/// Ids are allocated from a monotonic counter, so ordering by id is ordering
/// by registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Identity of a scoped binding, used to tag the listeners it owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}

/// Which registry a listener lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenerKey {
    Event(EventName, ListenerId),
    Connection(ListenerId),
}

impl ListenerKey {
    pub(crate) fn id(&self) -> ListenerId {
        match self {
            ListenerKey::Event(_, id) | ListenerKey::Connection(id) => *id,
        }
    }
}

/// Handle that removes exactly one listener
///
/// Calling [`unregister`](Unregister::unregister) more than once is a no-op.
/// Dropping the handle leaves the listener registered; scoped bindings own
/// the release of everything they register.
///
/// When `unregister` returns, the listener will not be invoked again: a
/// dispatch pass already running on another thread is waited for, and a pass
/// running on the calling thread skips the listener for its remaining
/// entries.
#[must_use = "dropping an Unregister handle leaves the listener registered"]
pub struct Unregister {
    bus: Weak<BusInner>,
    key: ListenerKey,
    active: Arc<AtomicBool>,
}

impl Unregister {
    pub(crate) fn new(bus: Weak<BusInner>, key: ListenerKey, active: Arc<AtomicBool>) -> Self {
        Self { bus, key, active }
    }

    /// Remove the listener, returning `true` only on the call that removed it
    pub fn unregister(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }

        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.key);
        }
        true
    }

    pub fn listener_id(&self) -> ListenerId {
        self.key.id()
    }

    pub fn is_registered(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.bus.strong_count() > 0
    }
}

impl fmt::Debug for Unregister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unregister")
            .field("key", &self.key)
            .field("registered", &self.is_registered())
            .finish()
    }
}
