//! Bus diagnostics

use std::collections::BTreeMap;

use fleet_protocol::EventName;

use crate::state::ConnectionState;

/// Point-in-time view of the bus registries and counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Registered listeners per event name (names without listeners omitted)
    pub listeners: BTreeMap<EventName, usize>,
    pub connection_listeners: usize,
    pub events_dispatched: u64,
    /// Frames dropped for an unknown name or an undecodable payload
    pub rejected_frames: u64,
    /// Listener invocations that panicked
    pub listener_failures: u64,
    pub connection_state: ConnectionState,
}

impl BusStats {
    pub fn total_listeners(&self) -> usize {
        self.listeners.values().sum::<usize>() + self.connection_listeners
    }
}

impl std::fmt::Display for BusStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Event Bus Stats:")?;
        writeln!(f, "  Connection: {}", self.connection_state)?;
        writeln!(f, "  Events dispatched: {}", self.events_dispatched)?;
        writeln!(f, "  Rejected frames: {}", self.rejected_frames)?;
        writeln!(f, "  Listener failures: {}", self.listener_failures)?;
        writeln!(f, "  Connection listeners: {}", self.connection_listeners)?;
        writeln!(f, "  Listeners:")?;
        for (name, count) in &self.listeners {
            writeln!(f, "    {}: {}", name, count)?;
        }
        Ok(())
    }
}
