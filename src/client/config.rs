//! Client configuration.

use std::time::Duration;

use crate::protocol::{ClientType, Credentials, HandshakeRequest, ProtocolVersion, WireLimits};

use super::error::{ClientError, ClientResult};

/// Default server port.
pub const DEFAULT_PORT: u16 = 10800;

// ============================================================================
// ClientConfig
// ============================================================================

/// Client connection settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (`host:port`)
    pub address: String,
    /// Protocol version to request
    pub version: ProtocolVersion,
    /// Client type to announce
    pub client_type: ClientType,
    /// Credentials, if the server requires authentication
    pub credentials: Option<Credentials>,
    /// TCP connect timeout
    pub connection_timeout: Duration,
    /// Handshake timeout, measured from the first write
    pub handshake_timeout: Duration,
    /// Wire limits
    pub limits: WireLimits,
}

impl ClientConfig {
    /// Create a configuration for `address`.
    ///
    /// Accepts `host`, `host:port`, or `[v6addr]:port`. The default port is
    /// added when missing.
    pub fn new(address: &str) -> ClientResult<Self> {
        Ok(Self {
            address: normalize_address(address)?,
            ..Self::default()
        })
    }

    /// Start a builder.
    pub fn builder(address: &str) -> ClientResult<ClientConfigBuilder> {
        let config = Self::new(address)?;
        Ok(ClientConfigBuilder { config })
    }

    /// Build a fresh handshake request from this configuration.
    pub fn handshake_request(&self) -> HandshakeRequest {
        let builder = HandshakeRequest::builder()
            .with_version(self.version)
            .with_client_type(self.client_type);
        match &self.credentials {
            Some(credentials) => builder.with_credentials(credentials.clone()).build(),
            None => builder.build(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("localhost:{}", DEFAULT_PORT),
            version: ProtocolVersion::CURRENT,
            client_type: ClientType::Thin,
            credentials: None,
            connection_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            limits: WireLimits::default(),
        }
    }
}

fn normalize_address(address: &str) -> ClientResult<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ClientError::configuration("Address is empty"));
    }

    // Bracketed IPv6, with or without port
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| ClientError::configuration(format!("Invalid address: {}", address)))?;
        if host.is_empty() {
            return Err(ClientError::configuration(format!("Invalid address: {}", address)));
        }
        return match tail {
            "" => Ok(format!("[{}]:{}", host, DEFAULT_PORT)),
            _ => {
                let port = tail.strip_prefix(':').ok_or_else(|| {
                    ClientError::configuration(format!("Invalid address: {}", address))
                })?;
                parse_port(port)?;
                Ok(address.to_string())
            }
        };
    }

    match address.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() || host.contains(':') {
                return Err(ClientError::configuration(format!("Invalid address: {}", address)));
            }
            parse_port(port)?;
            Ok(address.to_string())
        }
        None => Ok(format!("{}:{}", address, DEFAULT_PORT)),
    }
}

fn parse_port(port: &str) -> ClientResult<u16> {
    port.parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ClientError::configuration(format!("Invalid port: {}", port)))
}

// ============================================================================
// ClientConfigBuilder
// ============================================================================

/// Builder for [`ClientConfig`]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the protocol version
    pub fn with_version(mut self, version: ProtocolVersion) -> Self {
        self.config.version = version;
        self
    }

    /// Set the client type
    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.config.client_type = client_type;
        self
    }

    /// Set credentials
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    /// Set username/password credentials
    ///
    /// Fails if either part is longer than `u16::MAX` bytes.
    pub fn with_basic_auth(self, username: &str, password: &str) -> ClientResult<Self> {
        let credentials = Credentials::basic(username, password)
            .map_err(|e| ClientError::configuration(e.to_string()))?;
        Ok(self.with_credentials(credentials))
    }

    /// Set the TCP connect timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Set the handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set wire limits
    pub fn with_limits(mut self, limits: WireLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Build
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
