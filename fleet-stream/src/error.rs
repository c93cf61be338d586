//! Error types for the fleet-stream crate.

use std::time::Duration;

use fleet_protocol::ProtocolError;

/// Errors raised by the connection manager and its transports.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The transport could not be opened
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Opening the transport took longer than the configured timeout
    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// An established transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// A frame could not be encoded or decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The background connection worker is no longer running
    #[error("Connection worker is not running")]
    WorkerUnavailable,

    /// The worker thread or its runtime could not be created
    #[error("Failed to start connection worker: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_display() {
        let error = StreamError::Configuration("zero attempts".to_string());
        assert_eq!(error.to_string(), "Configuration error: zero attempts");

        let error = StreamError::Connect("connection refused".to_string());
        assert_eq!(error.to_string(), "Connection failed: connection refused");

        let error = StreamError::Timeout(Duration::from_secs(10));
        assert_eq!(error.to_string(), "Connection attempt timed out after 10s");

        let error = StreamError::WorkerUnavailable;
        assert_eq!(error.to_string(), "Connection worker is not running");
    }

    #[test]
    fn test_protocol_error_conversion() {
        let error: StreamError = ProtocolError::UnknownEvent("bogus".to_string()).into();
        assert!(matches!(error, StreamError::Protocol(_)));
        assert!(error.to_string().contains("bogus"));
    }
}
