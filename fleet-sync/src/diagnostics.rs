//! Explicit inspection of a running client

use std::fmt;

use fleet_bus::{BusStats, ConnectionState};

/// Point-in-time view of the connection and bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub endpoint: String,
    pub connection_state: ConnectionState,
    /// Consecutive failed attempts since the last successful open
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub has_credential: bool,
    pub bus: BusStats,
}

impl Diagnostics {
    /// No automatic reconnection will happen until `connect` is called
    pub fn retries_exhausted(&self) -> bool {
        !self.connection_state.is_active() && self.reconnect_attempts >= self.max_reconnect_attempts
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fleet Sync Diagnostics:")?;
        writeln!(f, "  Endpoint: {}", self.endpoint)?;
        writeln!(f, "  State: {}", self.connection_state)?;
        writeln!(
            f,
            "  Reconnect attempts: {}/{}",
            self.reconnect_attempts, self.max_reconnect_attempts
        )?;
        writeln!(f, "  Authenticated: {}", self.has_credential)?;
        write!(f, "{}", self.bus)
    }
}
