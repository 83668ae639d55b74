//! Client connection.
//!
//! Opens a TCP connection and performs the handshake. Only a connection that
//! reached the established state is ever handed to the caller.

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::handshake::{HandshakeMachine, SessionParams};

use super::config::ClientConfig;
use super::error::{ClientError, ClientResult};

/// Established client connection.
pub struct Connection {
    /// TCP stream, positioned after the handshake
    stream: TcpStream,
    /// Negotiated session
    session: SessionParams,
    /// Server address
    address: String,
}

impl Connection {
    /// Connect to a server and complete the handshake.
    pub async fn connect(config: &ClientConfig) -> ClientResult<Self> {
        Self::connect_with_cancel(config, &CancellationToken::new()).await
    }

    /// Like [`connect`](Self::connect), but abandons the handshake when
    /// `cancel` fires.
    pub async fn connect_with_cancel(
        config: &ClientConfig,
        cancel: &CancellationToken,
    ) -> ClientResult<Self> {
        let address = config.address.clone();

        let mut stream = timeout(config.connection_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| ClientError::ConnectTimeout {
                address: address.clone(),
                timeout: config.connection_timeout,
            })?
            .map_err(|source| ClientError::Connect {
                address: address.clone(),
                source,
            })?;

        // Enable TCP nodelay for lower latency
        stream.set_nodelay(true).ok();

        let request = config.handshake_request();
        let deadline = Instant::now() + config.handshake_timeout;
        let session = HandshakeMachine::new()
            .with_limits(config.limits)
            .perform_cancellable(&mut stream, &request, deadline, cancel)
            .await?;

        debug!(address = %address, version = %session.version, "connected");

        Ok(Self {
            stream,
            session,
            address,
        })
    }

    /// Negotiated session.
    pub fn session(&self) -> &SessionParams {
        &self.session
    }

    /// Server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Stream for post-handshake traffic.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Take the stream.
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }

    /// Close the connection gracefully.
    pub async fn close(mut self) -> ClientResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use crate::handshake::HandshakeFailure;

    async fn bind() -> (TcpListener, ClientConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let config = ClientConfig::builder(&address)
            .unwrap()
            .with_handshake_timeout(Duration::from_millis(200))
            .build();
        (listener, config)
    }

    #[tokio::test]
    async fn test_connect_accepted() {
        let (listener, config) = bind().await;
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 12];
            socket.read_exact(&mut header).await.unwrap();
            socket.write_all(&[1]).await.unwrap();
            socket
        });

        let connection = Connection::connect(&config).await.unwrap();
        assert_eq!(connection.address(), config.address);
        assert!(!connection.session().credentials_presented);
        let _socket = server.await.unwrap();
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_handshake_timeout() {
        let (listener, config) = bind().await;
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Never answer; wait for the client to give up
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf.len()
        });

        let err = Connection::connect(&config).await.unwrap_err();
        assert!(matches!(err, ClientError::Handshake(HandshakeFailure::TimedOut)));
        assert!(err.is_retryable());

        // Client closed its side after timing out
        assert_eq!(server.await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, config) = bind().await;
        drop(listener);

        let err = Connection::connect(&config).await.unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
    }
}
