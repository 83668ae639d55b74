//! # Handshake Wire Protocol
//!
//! Low-level pieces of the connection handshake shared by both sides of a
//! connection.
//!
//! ## Overview
//!
//! Every client connection starts with exactly one request/response exchange
//! before any other traffic is allowed:
//!
//! ```text
//! client                                   server
//!   | -- HANDSHAKE (version, type, creds) --> |
//!   | <------------- [1]  accepted ---------- |
//!   | <-- [0][status][message][version] ----- |  rejected
//! ```
//!
//! ## Submodules
//!
//! - [`version`] - Protocol version triple
//! - [`message`] - Request/response structures
//! - [`status`] - Status byte registry and classification
//! - [`codec`] - Byte layout encoding/decoding
//! - [`error`] - Codec error types
//!
//! ## Note
//!
//! Most users should use [`crate::client::Connection`] or
//! [`crate::handshake::perform_handshake`] instead of calling the codec
//! directly.

pub mod codec;
pub mod error;
pub mod message;
pub mod status;
pub mod version;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, ResponseFraming,
    ServerCodec, WireLimits, HANDSHAKE_MESSAGE_TYPE,
};
pub use error::{CodecError, DecodingError, EncodingError};
pub use message::{
    ClientType, Credentials, HandshakeRequest, HandshakeRequestBuilder, HandshakeResponse,
};
pub use status::{RetryAdvice, StatusCode, StatusKind, StatusRegistry};
pub use version::ProtocolVersion;
