//! Vehicle identity type

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a vehicle
///
/// Matches the numeric primary key the REST layer hands out, so ids taken
/// from an initial fetch and ids carried by realtime events compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(u64);

impl VehicleId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw numeric id
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for VehicleId {
    fn from(id: u64) -> Self {
        VehicleId::new(id)
    }
}

impl FromStr for VehicleId {
    type Err = std::num::ParseIntError;

    /// Accepts both `7` and the `#7` form used in dashboard labels
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        digits.parse().map(VehicleId)
    }
}
