//! Error types for the event-subscription client

use std::net::SocketAddr;

/// Errors raised by LPEC connections, parsing and queries
#[derive(Debug, thiserror::Error)]
pub enum LpecError {
    /// The device address could not be resolved
    #[error("Cannot resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    /// Connection refused or otherwise failed
    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A bounded wait elapsed (connect or subscribe)
    #[error("Timed out during {0}")]
    Timeout(&'static str),

    /// The device closed the connection (read returned EOF)
    #[error("Connection closed by device")]
    Closed,

    /// Socket error after the connection was established
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A protocol line could not be parsed
    #[error("Malformed line: {0}")]
    Parse(String),
}

impl LpecError {
    /// Whether the error means the connection is gone and must be re-established
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, LpecError::Closed | LpecError::Io(_))
    }
}

/// Type alias for results of LPEC operations
pub type Result<T> = std::result::Result<T, LpecError>;
