//! Environment-driven settings
//!
//! | Variable                  | Meaning                                   |
//! |---------------------------|-------------------------------------------|
//! | `FLEET_SYNC_URL`          | realtime endpoint (`wss://` needs `tls`)  |
//! | `FLEET_SYNC_TOKEN`        | bearer credential                         |
//! | `FLEET_SYNC_RECONNECT_MS` | delay between reconnection attempts       |
//! | `FLEET_SYNC_MAX_ATTEMPTS` | failed attempts before giving up          |
//!
//! Unset variables keep the [`StreamConfig`] defaults.

use std::fmt;
use std::time::Duration;

use fleet_stream::StreamConfig;

use crate::error::{Result, SyncError};

pub const ENV_URL: &str = "FLEET_SYNC_URL";
pub const ENV_TOKEN: &str = "FLEET_SYNC_TOKEN";
pub const ENV_RECONNECT_MS: &str = "FLEET_SYNC_RECONNECT_MS";
pub const ENV_MAX_ATTEMPTS: &str = "FLEET_SYNC_MAX_ATTEMPTS";

/// Everything needed to start a [`FleetSync`](crate::FleetSync)
#[derive(Clone, Default)]
pub struct SyncSettings {
    pub stream: StreamConfig,
    pub credential: Option<String>,
}

impl SyncSettings {
    pub fn new(stream: StreamConfig) -> Self {
        Self {
            stream,
            credential: None,
        }
    }

    pub fn with_credential(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(token.into());
        self
    }

    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut stream = match get(ENV_URL) {
            Some(url) => StreamConfig::for_endpoint(url.trim())?,
            None => StreamConfig::default(),
        };

        if let Some(raw) = get(ENV_RECONNECT_MS) {
            let millis = parse_number::<u64>(ENV_RECONNECT_MS, &raw)?;
            stream = stream.with_reconnect_interval(Duration::from_millis(millis));
        }

        if let Some(raw) = get(ENV_MAX_ATTEMPTS) {
            let attempts = parse_number::<u32>(ENV_MAX_ATTEMPTS, &raw)?;
            stream = stream.with_max_reconnect_attempts(attempts);
        }

        stream.validate()?;

        Ok(Self {
            stream,
            credential: get(ENV_TOKEN),
        })
    }
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| SyncError::InvalidSetting {
            name,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

// keep the credential out of logs
impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("stream", &self.stream)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
