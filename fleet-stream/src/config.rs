//! Configuration types for the fleet-stream crate
//!
//! Controls where the connection manager connects and how it behaves when the
//! connection fails.

use std::time::Duration;

use url::Url;

use crate::error::{Result, StreamError};

/// Endpoint used when none is configured
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:3000/realtime";

/// Configuration for the ConnectionManager
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Realtime endpoint (`ws://`, or `wss://` with the `tls` feature)
    /// Default: ws://localhost:3000/realtime
    pub endpoint: Url,

    /// Delay before an automatic reconnection attempt
    /// Default: 3 seconds
    pub reconnect_interval: Duration,

    /// Failed attempts after which automatic reconnection stops
    /// Default: 5
    pub max_reconnect_attempts: u32,

    /// Upper bound on a single connection attempt
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Shortest session after which a server-requested close reconnects at
    /// once; shorter sessions wait `reconnect_interval`
    /// Default: 1 second
    pub rotation_min_session: Duration,

    /// Interval between `ping` intents while connected (`None` disables)
    /// Default: 25 seconds
    pub keepalive_interval: Option<Duration>,

    /// Outbound frames buffered by a transport before back-pressure applies
    /// Default: 256
    pub outbound_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            reconnect_interval: Duration::from_secs(3),
            max_reconnect_attempts: 5,
            connect_timeout: Duration::from_secs(10),
            rotation_min_session: Duration::from_secs(1),
            keepalive_interval: Some(Duration::from_secs(25)),
            outbound_buffer: 256,
        }
    }
}

impl StreamConfig {
    /// Create a new StreamConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a StreamConfig for the given endpoint
    pub fn for_endpoint(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            StreamError::Configuration(format!("Invalid endpoint '{}': {}", endpoint, e))
        })?;
        let config = Self {
            endpoint,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a StreamConfig tuned for flaky mobile links
    pub fn patient() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(10),
            max_reconnect_attempts: 12,
            connect_timeout: Duration::from_secs(20),
            keepalive_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        }
    }

    /// Create a StreamConfig suited to local development and tests
    pub fn fast_retry() -> Self {
        Self {
            reconnect_interval: Duration::from_millis(250),
            connect_timeout: Duration::from_secs(2),
            keepalive_interval: None,
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_rotation_min_session(mut self, session: Duration) -> Self {
        self.rotation_min_session = session;
        self
    }

    pub fn with_keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.endpoint.scheme(), "ws" | "wss") {
            return Err(StreamError::Configuration(format!(
                "Endpoint scheme must be ws or wss, got '{}'",
                self.endpoint.scheme()
            )));
        }

        #[cfg(not(feature = "tls"))]
        if self.endpoint.scheme() == "wss" {
            return Err(StreamError::Configuration(
                "wss:// endpoints require the 'tls' feature".to_string(),
            ));
        }

        if self.max_reconnect_attempts == 0 {
            return Err(StreamError::Configuration(
                "Max reconnect attempts must be greater than 0".to_string(),
            ));
        }

        if self.connect_timeout == Duration::ZERO {
            return Err(StreamError::Configuration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.rotation_min_session == Duration::ZERO {
            return Err(StreamError::Configuration(
                "Rotation minimum session must be greater than 0".to_string(),
            ));
        }

        if self.keepalive_interval == Some(Duration::ZERO) {
            return Err(StreamError::Configuration(
                "Keepalive interval must be greater than 0 when enabled".to_string(),
            ));
        }

        if self.outbound_buffer == 0 {
            return Err(StreamError::Configuration(
                "Outbound buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_endpoint() -> Url {
    Url::parse(DEFAULT_ENDPOINT).unwrap_or_else(|_| unreachable!("default endpoint is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(config.reconnect_interval, Duration::from_secs(3));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.keepalive_interval, Some(Duration::from_secs(25)));
        assert_eq!(config.rotation_min_session, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(StreamConfig::patient().validate().is_ok());
        assert!(StreamConfig::fast_retry().validate().is_ok());
        assert!(StreamConfig::fast_retry().keepalive_interval.is_none());
    }

    #[rstest]
    #[case("http://fleet.example.com/realtime")]
    #[case("ftp://fleet.example.com")]
    fn test_rejects_non_websocket_scheme(#[case] endpoint: &str) {
        assert!(StreamConfig::for_endpoint(endpoint).is_err());
    }

    #[cfg(feature = "tls")]
    #[test]
    fn test_for_endpoint_accepts_wss() {
        let config = StreamConfig::for_endpoint("wss://fleet.example.com/realtime").unwrap();
        assert_eq!(config.endpoint.host_str(), Some("fleet.example.com"));
    }

    #[cfg(not(feature = "tls"))]
    #[test]
    fn test_wss_rejected_without_tls() {
        let err = StreamConfig::for_endpoint("wss://fleet.example.com/realtime").unwrap_err();
        assert!(matches!(err, StreamError::Configuration(ref m) if m.contains("tls")));

        let config = StreamConfig::default()
            .with_endpoint(Url::parse("wss://fleet.example.com/realtime").unwrap());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_invalid_bounds() {
        let config = StreamConfig::default().with_max_reconnect_attempts(0);
        assert!(matches!(config.validate(), Err(StreamError::Configuration(_))));

        let config = StreamConfig::default().with_keepalive(Some(Duration::ZERO));
        assert!(config.validate().is_err());

        let config = StreamConfig::default().with_connect_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = StreamConfig::default().with_rotation_min_session(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
