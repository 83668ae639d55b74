//! Handshake failure types.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;

use thiserror::Error;

use crate::protocol::status::{RetryAdvice, StatusKind, StatusRegistry, STANDARD_REGISTRY};
use crate::protocol::{DecodingError, EncodingError, ProtocolVersion};

use super::state::HandshakeState;

/// The peer refused the handshake.
///
/// Carries the status byte and message exactly as received. Equality and
/// hashing only consider those two; the classified kind and the server
/// version are diagnostics.
#[derive(Debug, Clone)]
pub struct HandshakeError {
    status_code: u8,
    message: String,
    kind: StatusKind,
    server_version: Option<ProtocolVersion>,
}

impl HandshakeError {
    /// Create an error classified with the standard registry.
    pub fn new(status_code: u8, message: impl Into<String>) -> Self {
        Self::classified(status_code, message, &STANDARD_REGISTRY)
    }

    /// Create an error classified with `registry`.
    pub fn classified(
        status_code: u8,
        message: impl Into<String>,
        registry: &StatusRegistry,
    ) -> Self {
        Self {
            status_code,
            message: message.into(),
            kind: registry.classify(status_code),
            server_version: None,
        }
    }

    pub(crate) fn with_server_version(mut self, version: ProtocolVersion) -> Self {
        self.server_version = Some(version);
        self
    }

    /// Raw status byte as received, even if unrecognized.
    pub fn status_code(&self) -> u8 {
        self.status_code
    }

    /// Message as received.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classified kind.
    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    /// Server protocol version reported with the rejection.
    pub fn server_version(&self) -> Option<ProtocolVersion> {
        self.server_version
    }

    /// Check if retrying against the same peer may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl PartialEq for HandshakeError {
    fn eq(&self, other: &Self) -> bool {
        self.status_code == other.status_code && self.message == other.message
    }
}

impl Eq for HandshakeError {}

impl Hash for HandshakeError {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.status_code.hash(state);
        self.message.hash(state);
    }
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handshake rejected ({}, status {}): {}",
            self.kind, self.status_code, self.message
        )?;
        if let Some(version) = self.server_version {
            write!(f, " [server version {}]", version)?;
        }
        Ok(())
    }
}

impl std::error::Error for HandshakeError {}

/// Why the channel was abandoned.
#[derive(Error, Debug)]
pub enum ChannelBrokenCause {
    /// Write or read failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Peer sent bytes that are not a handshake response
    #[error("malformed response: {0}")]
    Decoding(#[from] DecodingError),

    /// Caller gave up before a terminal state
    #[error("handshake cancelled")]
    Cancelled,
}

/// Every way a handshake can end other than established.
#[derive(Error, Debug)]
pub enum HandshakeFailure {
    /// Peer refused
    #[error(transparent)]
    Rejected(#[from] HandshakeError),

    /// No complete response before the deadline
    #[error("Handshake timed out")]
    TimedOut,

    /// Peer never answered properly
    #[error("Channel broken during handshake: {0}")]
    ChannelBroken(#[from] ChannelBrokenCause),

    /// Request refused by the local codec; nothing was sent
    #[error("Handshake request could not be encoded: {0}")]
    Encoding(#[from] EncodingError),
}

impl HandshakeFailure {
    /// State the attempt ended in.
    pub fn state(&self) -> HandshakeState {
        match self {
            HandshakeFailure::Rejected(_) => HandshakeState::Rejected,
            HandshakeFailure::TimedOut => HandshakeState::TimedOut,
            HandshakeFailure::ChannelBroken(_) => HandshakeState::ChannelBroken,
            HandshakeFailure::Encoding(_) => HandshakeState::Idle,
        }
    }

    /// Retry policy for this failure.
    pub fn retry_advice(&self) -> RetryAdvice {
        match self {
            HandshakeFailure::Rejected(error) => error.kind().retry_advice(),
            HandshakeFailure::TimedOut => RetryAdvice::RetryWithBackoff,
            HandshakeFailure::ChannelBroken(ChannelBrokenCause::Cancelled) => {
                RetryAdvice::DoNotRetry
            }
            HandshakeFailure::ChannelBroken(_) => RetryAdvice::Reconnect,
            HandshakeFailure::Encoding(_) => RetryAdvice::DoNotRetry,
        }
    }

    /// Check if any kind of retry may succeed.
    pub fn is_retryable(&self) -> bool {
        self.retry_advice() != RetryAdvice::DoNotRetry
    }

    /// The rejection, if the peer refused.
    pub fn rejection(&self) -> Option<&HandshakeError> {
        match self {
            HandshakeFailure::Rejected(error) => Some(error),
            _ => None,
        }
    }
}
