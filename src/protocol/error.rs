//! Handshake codec error types.

use std::io;

use thiserror::Error;

/// Errors from the framed [`crate::protocol::ServerCodec`].
#[derive(Error, Debug)]
pub enum CodecError {
    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed request
    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),

    /// Response could not be encoded
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

/// A handshake message could not be encoded.
///
/// Always a local, caller-fixable problem. Never retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Credentials payload is longer than the configured limit
    #[error("credentials too large: {size} bytes (max: {max})")]
    CredentialsTooLarge {
        /// Payload length
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Rejection message does not fit its 2-byte length prefix
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Message length in bytes
        size: usize,
        /// Largest encodable length
        max: usize,
    },

    /// A credential field does not fit its 2-byte length prefix
    #[error("{field} too large: {size} bytes (max: {max})")]
    FieldTooLarge {
        /// Field name
        field: &'static str,
        /// Field length in bytes
        size: usize,
        /// Largest encodable length
        max: usize,
    },
}

/// Bytes received from a peer are not a well-formed handshake message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodingError {
    /// Fewer bytes than the fixed header requires
    #[error("truncated {what}: need {needed} bytes, got {available}")]
    Truncated {
        /// Part of the message being read
        what: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes present
        available: usize,
    },

    /// A length-prefixed field claims more bytes than are present
    #[error("{field} claims {claimed} bytes but only {available} remain")]
    LengthOverflow {
        /// Field name
        field: &'static str,
        /// Length the prefix claims
        claimed: usize,
        /// Bytes present
        available: usize,
    },

    /// Length prefix larger than the configured limit
    #[error("{field} length {claimed} exceeds limit {max}")]
    LimitExceeded {
        /// Field name
        field: &'static str,
        /// Length the prefix claims
        claimed: usize,
        /// Configured limit
        max: usize,
    },

    /// Response flag is neither 0 nor 1
    #[error("invalid response flag: 0x{0:02X}")]
    InvalidFlag(u8),

    /// Request does not start with the handshake message type
    #[error("unexpected message type: 0x{0:02X}")]
    UnexpectedMessageType(u8),

    /// Unknown client type byte
    #[error("unknown client type: 0x{0:02X}")]
    UnknownClientType(u8),

    /// Rejection message is not valid UTF-8
    #[error("rejection message is not valid UTF-8")]
    InvalidUtf8,

    /// Extra bytes after a complete message
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}
