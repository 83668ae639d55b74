//! Handshake status byte registry.
//!
//! A rejected handshake carries one status byte. The registry maps every
//! possible byte to exactly one [`StatusKind`]; bytes with no entry classify
//! as [`StatusKind::Unrecognized`]. Classification never fails.

use std::fmt;

/// Handshake status byte constants.
///
/// Standard codes of the current protocol version. Other protocol versions
/// may assign different bytes; build a custom [`StatusRegistry`] for those.
pub struct StatusCode;

impl StatusCode {
    /// Client and server protocol versions are incompatible
    pub const VERSION_MISMATCH: u8 = 1;
    /// Credentials missing or wrong
    pub const AUTHENTICATION_FAILED: u8 = 2;
    /// Authenticated, but not allowed to connect with this client type
    pub const AUTHORIZATION_FAILED: u8 = 3;
    /// Node is starting up or shutting down
    pub const SERVER_NOT_READY: u8 = 4;
    /// Node refuses new connections due to load
    pub const THROTTLED: u8 = 5;
}

/// Semantic outcome of a handshake status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Protocol versions are incompatible
    VersionMismatch,
    /// Credentials rejected
    AuthenticationFailed,
    /// Client not permitted
    AuthorizationFailed,
    /// Server is not accepting sessions yet
    ServerNotReady,
    /// Server is overloaded
    Throttled,
    /// Byte with no registry entry, preserved as received
    Unrecognized(u8),
}

/// What a caller should do after a failed handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryAdvice {
    /// Retrying against the same peer will fail the same way
    DoNotRetry,
    /// The condition is transient; retry later with backoff
    RetryWithBackoff,
    /// Open a new channel and retry
    Reconnect,
}

impl StatusKind {
    /// Retry policy for a rejection of this kind.
    pub fn retry_advice(self) -> RetryAdvice {
        match self {
            StatusKind::ServerNotReady | StatusKind::Throttled => RetryAdvice::RetryWithBackoff,
            StatusKind::VersionMismatch
            | StatusKind::AuthenticationFailed
            | StatusKind::AuthorizationFailed
            | StatusKind::Unrecognized(_) => RetryAdvice::DoNotRetry,
        }
    }

    /// Check if a retry against the same peer may succeed.
    pub fn is_retryable(self) -> bool {
        self.retry_advice() != RetryAdvice::DoNotRetry
    }

    /// Standard status byte for this kind.
    pub fn code(self) -> u8 {
        match self {
            StatusKind::VersionMismatch => StatusCode::VERSION_MISMATCH,
            StatusKind::AuthenticationFailed => StatusCode::AUTHENTICATION_FAILED,
            StatusKind::AuthorizationFailed => StatusCode::AUTHORIZATION_FAILED,
            StatusKind::ServerNotReady => StatusCode::SERVER_NOT_READY,
            StatusKind::Throttled => StatusCode::THROTTLED,
            StatusKind::Unrecognized(code) => code,
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::VersionMismatch => write!(f, "version mismatch"),
            StatusKind::AuthenticationFailed => write!(f, "authentication failed"),
            StatusKind::AuthorizationFailed => write!(f, "authorization failed"),
            StatusKind::ServerNotReady => write!(f, "server not ready"),
            StatusKind::Throttled => write!(f, "throttled"),
            StatusKind::Unrecognized(code) => write!(f, "unrecognized status 0x{:02X}", code),
        }
    }
}

/// Lookup table from status byte to [`StatusKind`].
///
/// Immutable after construction, so one instance can be shared by any number
/// of concurrent handshakes without locking.
#[derive(Clone, PartialEq, Eq)]
pub struct StatusRegistry {
    table: [Option<StatusKind>; 256],
}

/// Registry with the standard status codes.
pub static STANDARD_REGISTRY: StatusRegistry = StatusRegistry::standard();

impl StatusRegistry {
    /// Registry in which every byte is unrecognized.
    pub const fn empty() -> Self {
        Self { table: [None; 256] }
    }

    /// Registry with the codes from [`StatusCode`].
    pub const fn standard() -> Self {
        let mut table = [None; 256];
        table[StatusCode::VERSION_MISMATCH as usize] = Some(StatusKind::VersionMismatch);
        table[StatusCode::AUTHENTICATION_FAILED as usize] = Some(StatusKind::AuthenticationFailed);
        table[StatusCode::AUTHORIZATION_FAILED as usize] = Some(StatusKind::AuthorizationFailed);
        table[StatusCode::SERVER_NOT_READY as usize] = Some(StatusKind::ServerNotReady);
        table[StatusCode::THROTTLED as usize] = Some(StatusKind::Throttled);
        Self { table }
    }

    /// Assign `kind` to `code`, replacing any previous entry.
    ///
    /// Assigning [`StatusKind::Unrecognized`] removes the entry.
    pub fn with_code(mut self, code: u8, kind: StatusKind) -> Self {
        self.table[code as usize] = match kind {
            StatusKind::Unrecognized(_) => None,
            known => Some(known),
        };
        self
    }

    /// Classify a raw status byte.
    pub fn classify(&self, code: u8) -> StatusKind {
        self.table[code as usize].unwrap_or(StatusKind::Unrecognized(code))
    }

    /// First byte mapped to `kind`, if any.
    pub fn code_for(&self, kind: StatusKind) -> Option<u8> {
        if let StatusKind::Unrecognized(code) = kind {
            return Some(code);
        }
        self.table
            .iter()
            .position(|entry| *entry == Some(kind))
            .map(|idx| idx as u8)
    }

    /// Number of bytes with a registry entry.
    pub fn len(&self) -> usize {
        self.table.iter().filter(|entry| entry.is_some()).count()
    }

    /// Check if no byte has an entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for StatusRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.table
                    .iter()
                    .enumerate()
                    .filter_map(|(code, kind)| kind.map(|k| (code, k))),
            )
            .finish()
    }
}

/// Classify a status byte with the standard registry.
pub fn classify(code: u8) -> StatusKind {
    STANDARD_REGISTRY.classify(code)
}
