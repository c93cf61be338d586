//! Cache change records

use std::fmt;
use std::time::Instant;

use fleet_protocol::VehicleId;

/// What happened to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// First snapshot for a previously unseen vehicle
    Inserted(VehicleId),
    /// An existing snapshot took a patch that changed it
    Updated(VehicleId),
    /// The vehicle was retired
    Removed(VehicleId),
    /// Every snapshot was dropped
    Cleared,
}

/// One change to a [`VehicleCache`](crate::VehicleCache)
#[derive(Debug, Clone)]
pub struct CacheChange {
    pub kind: ChangeKind,
    /// Cache version after this change
    pub version: u64,
    pub timestamp: Instant,
}

impl CacheChange {
    pub(crate) fn new(kind: ChangeKind, version: u64) -> Self {
        Self {
            kind,
            version,
            timestamp: Instant::now(),
        }
    }

    /// Vehicle affected, `None` for [`ChangeKind::Cleared`]
    pub fn vehicle_id(&self) -> Option<VehicleId> {
        match self.kind {
            ChangeKind::Inserted(id) | ChangeKind::Updated(id) | ChangeKind::Removed(id) => {
                Some(id)
            }
            ChangeKind::Cleared => None,
        }
    }
}

impl fmt::Display for CacheChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChangeKind::Inserted(id) => write!(f, "v{}: inserted #{}", self.version, id),
            ChangeKind::Updated(id) => write!(f, "v{}: updated #{}", self.version, id),
            ChangeKind::Removed(id) => write!(f, "v{}: removed #{}", self.version, id),
            ChangeKind::Cleared => write!(f, "v{}: cleared", self.version),
        }
    }
}
