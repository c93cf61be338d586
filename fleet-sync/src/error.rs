use thiserror::Error;

use crate::logging::LoggingError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Connection error: {0}")]
    Stream(#[from] fleet_stream::StreamError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] fleet_protocol::ProtocolError),

    #[error("Invalid setting {name}='{value}': {reason}")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
