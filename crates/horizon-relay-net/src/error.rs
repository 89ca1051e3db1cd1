//! Error types for the networking module.

use std::time::Duration;

use thiserror::Error;

/// Network-specific errors.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    /// Configuration rejected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Connection refused or failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// Connect attempt did not complete in time.
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),
    /// The operation needs a live connection.
    #[error("Not connected")]
    NotConnected,
    /// TCP socket error.
    #[error("TCP socket error: {0}")]
    TcpSocket(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
    /// Settings could not be read, written or parsed.
    #[error("Settings error: {0}")]
    Settings(String),
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Settings(err.to_string())
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
