//! Handshake request and response messages.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::error::{DecodingError, EncodingError};
use super::version::ProtocolVersion;

/// Kind of client opening the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClientType {
    /// ODBC driver
    Odbc = 0,
    /// JDBC driver
    Jdbc = 1,
    /// Native thin client
    Thin = 2,
}

impl ClientType {
    /// All client types.
    pub const ALL: [ClientType; 3] = [ClientType::Odbc, ClientType::Jdbc, ClientType::Thin];

    /// Wire byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire byte.
    pub fn from_u8(value: u8) -> Result<Self, DecodingError> {
        match value {
            0 => Ok(ClientType::Odbc),
            1 => Ok(ClientType::Jdbc),
            2 => Ok(ClientType::Thin),
            other => Err(DecodingError::UnknownClientType(other)),
        }
    }
}

impl Default for ClientType {
    fn default() -> Self {
        ClientType::Thin
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientType::Odbc => write!(f, "odbc"),
            ClientType::Jdbc => write!(f, "jdbc"),
            ClientType::Thin => write!(f, "thin"),
        }
    }
}

/// Opaque credentials payload.
///
/// The handshake does not interpret credentials; the server's authenticator
/// does. [`Credentials::basic`] builds the user/password layout understood by
/// [`crate::handshake::StaticAuthenticator`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials(Bytes);

impl Credentials {
    /// Wrap a raw payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self(payload.into())
    }

    /// Username/password payload: `[u16 len][user][u16 len][password]`.
    ///
    /// Fails if either part is longer than `u16::MAX` bytes.
    pub fn basic(username: &str, password: &str) -> Result<Self, EncodingError> {
        let user = basic_part("username", username)?;
        let pass = basic_part("password", password)?;

        let mut buf = BytesMut::with_capacity(4 + user.len() + pass.len());
        buf.put_u16(user.len() as u16);
        buf.put_slice(user);
        buf.put_u16(pass.len() as u16);
        buf.put_slice(pass);
        Ok(Self(buf.freeze()))
    }

    /// Parse a payload built by [`Credentials::basic`].
    pub fn parse_basic(&self) -> Option<(String, String)> {
        let (user, rest) = split_u16_prefixed(&self.0)?;
        let (pass, rest) = split_u16_prefixed(rest)?;
        if !rest.is_empty() {
            return None;
        }
        Some((
            String::from_utf8(user.to_vec()).ok()?,
            String::from_utf8(pass.to_vec()).ok()?,
        ))
    }

    /// Raw payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials(<{} bytes redacted>)", self.0.len())
    }
}

fn basic_part<'a>(field: &'static str, value: &'a str) -> Result<&'a [u8], EncodingError> {
    if value.len() > u16::MAX as usize {
        return Err(EncodingError::FieldTooLarge {
            field,
            size: value.len(),
            max: u16::MAX as usize,
        });
    }
    Ok(value.as_bytes())
}

fn split_u16_prefixed(data: &[u8]) -> Option<(&[u8], &[u8])> {
    if data.len() < 2 {
        return None;
    }
    let len = u16::from_be_bytes([data[0], data[1]]) as usize;
    let rest = &data[2..];
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

/// Client handshake request.
///
/// Immutable once built. Build a fresh one per connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    version: ProtocolVersion,
    client_type: ClientType,
    credentials: Option<Credentials>,
}

impl HandshakeRequest {
    /// Request without credentials.
    pub fn new(version: ProtocolVersion, client_type: ClientType) -> Self {
        Self {
            version,
            client_type,
            credentials: None,
        }
    }

    /// Start a request builder.
    pub fn builder() -> HandshakeRequestBuilder {
        HandshakeRequestBuilder::default()
    }

    /// Requested protocol version.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Client type.
    pub fn client_type(&self) -> ClientType {
        self.client_type
    }

    /// Credentials, if any.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

/// Builder for [`HandshakeRequest`].
#[derive(Debug, Clone, Default)]
pub struct HandshakeRequestBuilder {
    version: ProtocolVersion,
    client_type: ClientType,
    credentials: Option<Credentials>,
}

impl HandshakeRequestBuilder {
    /// Set the protocol version.
    pub fn with_version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    /// Set the client type.
    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        self
    }

    /// Set credentials. An empty payload means no credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials).filter(|c| !c.is_empty());
        self
    }

    /// Build the request.
    pub fn build(self) -> HandshakeRequest {
        HandshakeRequest {
            version: self.version,
            client_type: self.client_type,
            credentials: self.credentials,
        }
    }
}

/// Server handshake response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeResponse {
    /// Session established
    Accepted,
    /// Handshake refused
    Rejected {
        /// Raw status byte, classified later by the registry
        status_code: u8,
        /// Human-readable reason from the server
        message: String,
        /// Server's protocol version, for diagnostics
        server_version: ProtocolVersion,
    },
}

impl HandshakeResponse {
    /// Rejection response.
    pub fn rejected(
        status_code: u8,
        message: impl Into<String>,
        server_version: ProtocolVersion,
    ) -> Self {
        HandshakeResponse::Rejected {
            status_code,
            message: message.into(),
            server_version,
        }
    }

    /// Check if the handshake was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, HandshakeResponse::Accepted)
    }

    /// Status byte of a rejection.
    pub fn status_code(&self) -> Option<u8> {
        match self {
            HandshakeResponse::Accepted => None,
            HandshakeResponse::Rejected { status_code, .. } => Some(*status_code),
        }
    }
}
