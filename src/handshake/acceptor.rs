//! Server-side handshake handling.
//!
//! The acceptor validates a decoded request and decides the response:
//! 1. Server state (starting → `ServerNotReady`, overloaded → `Throttled`)
//! 2. Protocol version (`VersionMismatch`)
//! 3. Credentials (`AuthenticationFailed`)
//! 4. Client type (`AuthorizationFailed`)

use std::collections::HashMap;
use std::sync::Arc;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::protocol::{
    ClientType, CodecError, Credentials, HandshakeRequest, HandshakeResponse, ProtocolVersion,
    ServerCodec, StatusKind, StatusRegistry, WireLimits,
};

/// Verifies credentials presented in a handshake.
pub trait Authenticator: Send + Sync {
    /// Return the principal name for valid credentials.
    fn authenticate(&self, credentials: Option<&Credentials>) -> Option<String>;

    /// Check if `principal` may connect as `client_type`.
    fn authorize(&self, principal: &str, client_type: ClientType) -> bool {
        let _ = (principal, client_type);
        true
    }
}

#[derive(Debug, Clone)]
struct UserEntry {
    password: String,
    client_types: Vec<ClientType>,
}

/// In-memory user table for [`Credentials::basic`] payloads.
#[derive(Debug, Default)]
pub struct StaticAuthenticator {
    users: RwLock<HashMap<String, UserEntry>>,
}

impl StaticAuthenticator {
    /// Empty user table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user allowed to connect with any client type.
    pub fn add_user(&self, username: impl Into<String>, password: impl Into<String>) {
        self.add_user_with_client_types(username, password, &ClientType::ALL);
    }

    /// Add or replace a user restricted to `client_types`.
    pub fn add_user_with_client_types(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
        client_types: &[ClientType],
    ) {
        self.users.write().insert(
            username.into(),
            UserEntry {
                password: password.into(),
                client_types: client_types.to_vec(),
            },
        );
    }

    /// Remove a user. Returns whether it existed.
    pub fn remove_user(&self, username: &str) -> bool {
        self.users.write().remove(username).is_some()
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self, credentials: Option<&Credentials>) -> Option<String> {
        let (username, password) = credentials?.parse_basic()?;
        let users = self.users.read();
        let entry = users.get(&username)?;
        (entry.password == password).then_some(username)
    }

    fn authorize(&self, principal: &str, client_type: ClientType) -> bool {
        self.users
            .read()
            .get(principal)
            .map(|entry| entry.client_types.contains(&client_type))
            .unwrap_or(false)
    }
}

/// Whether the node accepts new sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    /// Accepting sessions
    #[default]
    Ready,
    /// Starting up or shutting down
    Starting,
    /// Refusing new sessions due to load
    Overloaded,
}

/// Server-side handshake failures.
#[derive(Error, Debug)]
pub enum AcceptError {
    /// Peer closed the connection before sending a complete request
    #[error("Connection closed before handshake request")]
    ConnectionClosed,

    /// Malformed request or transport failure
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The request was refused and the client was told so
    #[error("Handshake refused ({kind}): {message}")]
    Refused {
        /// Why the request was refused
        kind: StatusKind,
        /// Message sent to the client
        message: String,
    },
}

/// Result of an accepted handshake.
#[derive(Debug)]
pub struct AcceptedSession<S> {
    /// Underlying stream, positioned after the handshake
    pub stream: S,
    /// Bytes the client sent after its request, already read off the stream
    pub buffered: BytesMut,
    /// Accepted request
    pub request: HandshakeRequest,
    /// Authenticated principal, if an authenticator is configured
    pub principal: Option<String>,
}

/// Server-side handshake handler.
pub struct HandshakeAcceptor {
    /// Version reported to clients and used for compatibility checks
    server_version: ProtocolVersion,
    /// Oldest client version still served
    min_version: ProtocolVersion,
    /// Client types allowed regardless of principal
    client_types: Vec<ClientType>,
    authenticator: Option<Arc<dyn Authenticator>>,
    registry: StatusRegistry,
    limits: WireLimits,
    state: RwLock<ServerState>,
}

impl HandshakeAcceptor {
    /// Acceptor for the current protocol version with no authentication.
    pub fn new() -> Self {
        Self {
            server_version: ProtocolVersion::CURRENT,
            min_version: ProtocolVersion::V1_0_0,
            client_types: ClientType::ALL.to_vec(),
            authenticator: None,
            registry: StatusRegistry::standard(),
            limits: WireLimits::default(),
            state: RwLock::new(ServerState::Ready),
        }
    }

    /// Serve clients from `min_version` up to `server_version`.
    pub fn with_versions(
        mut self,
        min_version: ProtocolVersion,
        server_version: ProtocolVersion,
    ) -> Self {
        self.min_version = min_version;
        self.server_version = server_version;
        self
    }

    /// Restrict allowed client types.
    pub fn with_client_types(mut self, client_types: &[ClientType]) -> Self {
        self.client_types = client_types.to_vec();
        self
    }

    /// Require credentials checked by `authenticator`.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Use a custom status registry for outgoing codes.
    pub fn with_registry(mut self, registry: StatusRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set wire limits for incoming requests.
    pub fn with_limits(mut self, limits: WireLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Change the server state.
    pub fn set_state(&self, state: ServerState) {
        *self.state.write() = state;
    }

    /// Current server state.
    pub fn state(&self) -> ServerState {
        *self.state.read()
    }

    /// Decide the response to a request.
    pub fn process(&self, request: &HandshakeRequest) -> HandshakeResponse {
        match self.decide(request) {
            Ok(_) => HandshakeResponse::Accepted,
            Err((kind, message)) => self.rejection(kind, message),
        }
    }

    fn decide(&self, request: &HandshakeRequest) -> Result<Option<String>, (StatusKind, String)> {
        match self.state() {
            ServerState::Ready => {}
            ServerState::Starting => {
                return Err((StatusKind::ServerNotReady, "Node is not ready".to_string()));
            }
            ServerState::Overloaded => {
                return Err((
                    StatusKind::Throttled,
                    "Node refuses new connections, retry later".to_string(),
                ));
            }
        }

        let version = request.version();
        if version < self.min_version || !self.server_version.is_compatible_with(version) {
            return Err((
                StatusKind::VersionMismatch,
                format!(
                    "Unsupported protocol version {} (supported: {} to {})",
                    version, self.min_version, self.server_version
                ),
            ));
        }

        let principal = match &self.authenticator {
            Some(authenticator) => {
                let principal = authenticator
                    .authenticate(request.credentials())
                    .ok_or_else(|| {
                        (
                            StatusKind::AuthenticationFailed,
                            "Authentication failed".to_string(),
                        )
                    })?;
                Some(principal)
            }
            None => None,
        };

        let client_type = request.client_type();
        let allowed = self.client_types.contains(&client_type)
            && match (&self.authenticator, &principal) {
                (Some(authenticator), Some(principal)) => {
                    authenticator.authorize(principal, client_type)
                }
                _ => true,
            };
        if !allowed {
            return Err((
                StatusKind::AuthorizationFailed,
                format!("Client type {} is not allowed", client_type),
            ));
        }

        Ok(principal)
    }

    fn rejection(&self, kind: StatusKind, message: String) -> HandshakeResponse {
        let status_code = self.registry.code_for(kind).unwrap_or_else(|| kind.code());
        HandshakeResponse::rejected(status_code, message, self.server_version)
    }

    /// Read one request from `stream`, answer it, and hand the stream back on
    /// acceptance.
    pub async fn accept<S>(&self, stream: S) -> Result<AcceptedSession<S>, AcceptError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, ServerCodec::with_limits(self.limits));

        let request = match framed.next().await {
            Some(request) => request?,
            None => return Err(AcceptError::ConnectionClosed),
        };
        debug!(
            version = %request.version(),
            client_type = %request.client_type(),
            "received handshake request"
        );

        match self.decide(&request) {
            Ok(principal) => {
                framed.send(HandshakeResponse::Accepted).await?;
                let parts = framed.into_parts();
                Ok(AcceptedSession {
                    stream: parts.io,
                    buffered: parts.read_buf,
                    request,
                    principal,
                })
            }
            Err((kind, message)) => {
                warn!(kind = %kind, "refusing handshake: {}", message);
                framed.send(self.rejection(kind, message.clone())).await?;
                Err(AcceptError::Refused { kind, message })
            }
        }
    }
}

impl Default for HandshakeAcceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandshakeAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeAcceptor")
            .field("server_version", &self.server_version)
            .field("min_version", &self.min_version)
            .field("client_types", &self.client_types)
            .field("authenticated", &self.authenticator.is_some())
            .field("state", &self.state())
            .finish()
    }
}
