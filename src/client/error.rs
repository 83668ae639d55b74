//! Client Error Types

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::handshake::{HandshakeError, HandshakeFailure};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

// ============================================================================
// ClientError
// ============================================================================

/// Client error
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// TCP connect failed
    #[error("Connection error: failed to connect to {address}: {source}")]
    Connect {
        /// Address that refused the connection
        address: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TCP connect did not finish in time
    #[error("Timeout: connecting to {address} took longer than {timeout:?}")]
    ConnectTimeout {
        /// Address being connected to
        address: String,
        /// Configured connect timeout
        timeout: Duration,
    },

    /// Handshake did not establish a session
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeFailure),

    /// I/O error after the session was established
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if retrying the connection may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::ConnectTimeout { .. } | Self::Io(_) => true,
            Self::Handshake(failure) => failure.is_retryable(),
            Self::Configuration(_) => false,
        }
    }

    /// The server's rejection, if the handshake was refused
    pub fn rejection(&self) -> Option<&HandshakeError> {
        match self {
            Self::Handshake(failure) => failure.rejection(),
            _ => None,
        }
    }
}
