//! Handshake byte layout.
//!
//! All integers are big-endian.
//!
//! ```text
//! request:   [1: type=0x01][2: major][2: minor][2: patch][1: client type]
//!            [4: credentials length][N: credentials]
//! accepted:  [1: flag=1]
//! rejected:  [1: flag=0][1: status][2: message length][M: UTF-8 message]
//!            [2: server major][2: server minor][2: server patch]
//! ```
//!
//! The codec only checks structure. Status bytes are returned as-is and
//! classified by [`super::status::StatusRegistry`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

use super::error::{CodecError, DecodingError, EncodingError};
use super::message::{ClientType, Credentials, HandshakeRequest, HandshakeResponse};
use super::version::ProtocolVersion;

/// Message type byte opening every handshake request.
pub const HANDSHAKE_MESSAGE_TYPE: u8 = 0x01;

/// Fixed part of a request (everything before the credentials payload).
pub const REQUEST_HEADER_LEN: usize = 1 + ProtocolVersion::ENCODED_LEN + 1 + 4;

/// Response flag for an accepted handshake.
pub const FLAG_ACCEPTED: u8 = 1;

/// Response flag for a rejected handshake.
pub const FLAG_REJECTED: u8 = 0;

/// Fixed part of a rejection before the message bytes: flag, status, length.
pub const REJECTION_HEADER_LEN: usize = 1 + 1 + 2;

/// Default credentials limit (64 KiB).
pub const DEFAULT_MAX_CREDENTIALS_LEN: usize = 64 * 1024;

/// Limits on the variable-length fields of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLimits {
    /// Maximum credentials payload in bytes
    pub max_credentials_len: usize,
}

impl Default for WireLimits {
    fn default() -> Self {
        Self {
            max_credentials_len: DEFAULT_MAX_CREDENTIALS_LEN,
        }
    }
}

/// Encode a client request.
pub fn encode_request(
    request: &HandshakeRequest,
    limits: &WireLimits,
) -> Result<Bytes, EncodingError> {
    let credentials = request.credentials().map(Credentials::as_bytes).unwrap_or(&[]);
    let max = limits.max_credentials_len.min(u32::MAX as usize);
    if credentials.len() > max {
        return Err(EncodingError::CredentialsTooLarge {
            size: credentials.len(),
            max,
        });
    }

    let mut buf = BytesMut::with_capacity(REQUEST_HEADER_LEN + credentials.len());
    buf.put_u8(HANDSHAKE_MESSAGE_TYPE);
    buf.put_slice(&request.version().to_bytes());
    buf.put_u8(request.client_type().as_u8());
    buf.put_u32(credentials.len() as u32);
    buf.put_slice(credentials);
    Ok(buf.freeze())
}

/// Decode a client request (server side).
pub fn decode_request(data: &[u8], limits: &WireLimits) -> Result<HandshakeRequest, DecodingError> {
    if data.len() < REQUEST_HEADER_LEN {
        return Err(DecodingError::Truncated {
            what: "request header",
            needed: REQUEST_HEADER_LEN,
            available: data.len(),
        });
    }

    let mut buf = data;
    let message_type = buf.get_u8();
    if message_type != HANDSHAKE_MESSAGE_TYPE {
        return Err(DecodingError::UnexpectedMessageType(message_type));
    }

    let version = read_version(&mut buf);
    let client_type = ClientType::from_u8(buf.get_u8())?;

    let credentials_len = buf.get_u32() as usize;
    if credentials_len > limits.max_credentials_len {
        return Err(DecodingError::LimitExceeded {
            field: "credentials",
            claimed: credentials_len,
            max: limits.max_credentials_len,
        });
    }
    if buf.remaining() < credentials_len {
        return Err(DecodingError::LengthOverflow {
            field: "credentials",
            claimed: credentials_len,
            available: buf.remaining(),
        });
    }
    let credentials = Credentials::new(Bytes::copy_from_slice(&buf[..credentials_len]));
    buf.advance(credentials_len);

    if buf.has_remaining() {
        return Err(DecodingError::TrailingBytes(buf.remaining()));
    }

    Ok(HandshakeRequest::builder()
        .with_version(version)
        .with_client_type(client_type)
        .with_credentials(credentials)
        .build())
}

/// Encode a server response.
pub fn encode_response(response: &HandshakeResponse) -> Result<Bytes, EncodingError> {
    match response {
        HandshakeResponse::Accepted => Ok(Bytes::from_static(&[FLAG_ACCEPTED])),
        HandshakeResponse::Rejected {
            status_code,
            message,
            server_version,
        } => {
            let max = u16::MAX as usize;
            if message.len() > max {
                return Err(EncodingError::MessageTooLarge {
                    size: message.len(),
                    max,
                });
            }

            let mut buf = BytesMut::with_capacity(
                REJECTION_HEADER_LEN + message.len() + ProtocolVersion::ENCODED_LEN,
            );
            buf.put_u8(FLAG_REJECTED);
            buf.put_u8(*status_code);
            buf.put_u16(message.len() as u16);
            buf.put_slice(message.as_bytes());
            buf.put_slice(&server_version.to_bytes());
            Ok(buf.freeze())
        }
    }
}

/// Decode a complete server response.
///
/// Unknown status bytes are not an error.
pub fn decode_response(data: &[u8]) -> Result<HandshakeResponse, DecodingError> {
    let mut buf = data;
    if !buf.has_remaining() {
        return Err(DecodingError::Truncated {
            what: "response flag",
            needed: 1,
            available: 0,
        });
    }

    match buf.get_u8() {
        FLAG_ACCEPTED => {
            if buf.has_remaining() {
                return Err(DecodingError::TrailingBytes(buf.remaining()));
            }
            Ok(HandshakeResponse::Accepted)
        }
        FLAG_REJECTED => {
            if data.len() < REJECTION_HEADER_LEN {
                return Err(DecodingError::Truncated {
                    what: "rejection header",
                    needed: REJECTION_HEADER_LEN,
                    available: data.len(),
                });
            }
            let status_code = buf.get_u8();
            let message_len = buf.get_u16() as usize;
            if buf.remaining() < message_len {
                return Err(DecodingError::LengthOverflow {
                    field: "message",
                    claimed: message_len,
                    available: buf.remaining(),
                });
            }
            let message = std::str::from_utf8(&buf[..message_len])
                .map_err(|_| DecodingError::InvalidUtf8)?
                .to_owned();
            buf.advance(message_len);

            if buf.remaining() < ProtocolVersion::ENCODED_LEN {
                return Err(DecodingError::Truncated {
                    what: "server version",
                    needed: ProtocolVersion::ENCODED_LEN,
                    available: buf.remaining(),
                });
            }
            let server_version = read_version(&mut buf);

            if buf.has_remaining() {
                return Err(DecodingError::TrailingBytes(buf.remaining()));
            }

            Ok(HandshakeResponse::Rejected {
                status_code,
                message,
                server_version,
            })
        }
        other => Err(DecodingError::InvalidFlag(other)),
    }
}

fn read_version(buf: &mut &[u8]) -> ProtocolVersion {
    let mut bytes = [0u8; ProtocolVersion::ENCODED_LEN];
    buf.copy_to_slice(&mut bytes);
    ProtocolVersion::from_bytes(bytes)
}

/// Incremental framing of a server response.
///
/// The response length is only known once its header has arrived, so a
/// reader alternates between asking how many bytes are still missing and
/// reading exactly that many.
pub struct ResponseFraming;

impl ResponseFraming {
    /// Bytes still needed after `prefix` before the response (or the next
    /// length field) is complete. Zero means `prefix` holds a full response.
    pub fn remaining(prefix: &[u8]) -> Result<usize, DecodingError> {
        let Some(&flag) = prefix.first() else {
            return Ok(1);
        };

        match flag {
            FLAG_ACCEPTED => Ok(0),
            FLAG_REJECTED => {
                if prefix.len() < REJECTION_HEADER_LEN {
                    return Ok(REJECTION_HEADER_LEN - prefix.len());
                }
                let message_len = u16::from_be_bytes([prefix[2], prefix[3]]) as usize;
                let total = REJECTION_HEADER_LEN + message_len + ProtocolVersion::ENCODED_LEN;
                Ok(total.saturating_sub(prefix.len()))
            }
            other => Err(DecodingError::InvalidFlag(other)),
        }
    }
}

/// Server-side codec: decodes requests, encodes responses.
#[derive(Debug, Default)]
pub struct ServerCodec {
    limits: WireLimits,
}

impl ServerCodec {
    /// Create a codec with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with custom limits.
    pub fn with_limits(limits: WireLimits) -> Self {
        Self { limits }
    }
}

impl Decoder for ServerCodec {
    type Item = HandshakeRequest;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Fail fast on a peer that is not speaking the protocol
        if let Some(&message_type) = src.first() {
            if message_type != HANDSHAKE_MESSAGE_TYPE {
                return Err(DecodingError::UnexpectedMessageType(message_type).into());
            }
        }

        if src.len() < REQUEST_HEADER_LEN {
            return Ok(None);
        }

        let credentials_len =
            u32::from_be_bytes([src[8], src[9], src[10], src[11]]) as usize;
        if credentials_len > self.limits.max_credentials_len {
            return Err(DecodingError::LimitExceeded {
                field: "credentials",
                claimed: credentials_len,
                max: self.limits.max_credentials_len,
            }
            .into());
        }

        let frame_len = REQUEST_HEADER_LEN + credentials_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len);
        Ok(Some(decode_request(&frame, &self.limits)?))
    }
}

impl Encoder<HandshakeResponse> for ServerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: HandshakeResponse, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let encoded = encode_response(&item)?;
        dst.extend_from_slice(&encoded);
        Ok(())
    }
}
