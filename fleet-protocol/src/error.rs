//! Error types for the wire contract.

use thiserror::Error;

/// Errors raised while encoding or decoding wire frames
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The text was not a valid `{"event", "data"}` frame
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    /// The frame named an event outside the contract
    #[error("Unknown event name: {0}")]
    UnknownEvent(String),

    /// The payload did not match the shape bound to its event name
    #[error("Invalid payload for {event}: {source}")]
    InvalidPayload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The payload could not be serialized
    #[error("Failed to encode {event}: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_display() {
        let error = ProtocolError::UnknownEvent("vehicle:teleported".to_string());
        assert_eq!(error.to_string(), "Unknown event name: vehicle:teleported");
    }

    #[test]
    fn test_invalid_payload_display() {
        let source = serde_json::from_str::<u32>("\"seven\"").unwrap_err();
        let error = ProtocolError::InvalidPayload {
            event: "vehicle:deleted",
            source,
        };
        assert!(error.to_string().starts_with("Invalid payload for vehicle:deleted"));
    }
}
