//! Client-side handshake driver.

use std::time::Duration;

use bytes::BytesMut;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::status::{StatusRegistry, STANDARD_REGISTRY};
use crate::protocol::{
    decode_response, encode_request, ClientType, HandshakeRequest, HandshakeResponse,
    ProtocolVersion, ResponseFraming, WireLimits,
};

use super::channel::{HandshakeChannel, ReadError};
use super::failure::{ChannelBrokenCause, HandshakeError, HandshakeFailure};
use super::state::HandshakeState;

/// Upper bound on closing an abandoned channel.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(100);

/// Parameters of an established session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Protocol version the session speaks
    pub version: ProtocolVersion,
    /// Client type the server accepted
    pub client_type: ClientType,
    /// Whether the request carried credentials
    pub credentials_presented: bool,
    /// Time from first write to accepted response
    pub elapsed: Duration,
}

/// Drives one handshake attempt over one channel.
///
/// A machine is consumed by the attempt. Build a new one, with a new
/// request, for every retry.
#[derive(Debug)]
pub struct HandshakeMachine<'r> {
    registry: &'r StatusRegistry,
    limits: WireLimits,
    state: HandshakeState,
}

impl HandshakeMachine<'static> {
    /// Machine using the standard status registry.
    pub fn new() -> Self {
        Self::with_registry(&STANDARD_REGISTRY)
    }
}

impl Default for HandshakeMachine<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> HandshakeMachine<'r> {
    /// Machine classifying rejections with `registry`.
    pub fn with_registry(registry: &'r StatusRegistry) -> Self {
        Self {
            registry,
            limits: WireLimits::default(),
            state: HandshakeState::Idle,
        }
    }

    /// Set wire limits.
    pub fn with_limits(mut self, limits: WireLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Run the handshake until a terminal state or `deadline`.
    pub async fn perform<C>(
        mut self,
        channel: &mut C,
        request: &HandshakeRequest,
        deadline: Instant,
    ) -> Result<SessionParams, HandshakeFailure>
    where
        C: HandshakeChannel,
    {
        let result = self.exchange(channel, request, deadline).await;
        self.finish(channel, result).await
    }

    /// Like [`perform`](Self::perform), but gives up as soon as `cancel`
    /// fires. A cancelled attempt closes the channel and ends in
    /// [`HandshakeState::ChannelBroken`].
    ///
    /// Once the exchange has reached a terminal state, a later cancellation
    /// does not change the outcome.
    pub async fn perform_cancellable<C>(
        mut self,
        channel: &mut C,
        request: &HandshakeRequest,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<SessionParams, HandshakeFailure>
    where
        C: HandshakeChannel,
    {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.exchange(channel, request, deadline) => Some(result),
        };

        let result = match outcome {
            Some(result) => result,
            None => {
                debug!(state = %self.state, "handshake cancelled");
                Err(self.abandon(ChannelBrokenCause::Cancelled))
            }
        };
        self.finish(channel, result).await
    }

    /// Close the channel after a timeout or break. The outcome is already fixed.
    async fn finish<C: HandshakeChannel>(
        &self,
        channel: &mut C,
        result: Result<SessionParams, HandshakeFailure>,
    ) -> Result<SessionParams, HandshakeFailure> {
        if matches!(self.state, HandshakeState::TimedOut | HandshakeState::ChannelBroken) {
            close_quietly(channel).await;
        }
        result
    }

    async fn exchange<C>(
        &mut self,
        channel: &mut C,
        request: &HandshakeRequest,
        deadline: Instant,
    ) -> Result<SessionParams, HandshakeFailure>
    where
        C: HandshakeChannel,
    {
        let encoded = encode_request(request, &self.limits)?;
        let started = Instant::now();

        debug!(
            version = %request.version(),
            client_type = %request.client_type(),
            len = encoded.len(),
            "sending handshake request"
        );

        match timeout_at(deadline, channel.write_bytes(&encoded)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.abandon(e.into())),
            Err(_) => return Err(self.time_out()),
        }
        self.advance(HandshakeState::RequestSent);
        self.advance(HandshakeState::AwaitingResponse);

        let mut buf = BytesMut::new();
        loop {
            let needed = match ResponseFraming::remaining(&buf) {
                Ok(needed) => needed,
                Err(e) => return Err(self.abandon(e.into())),
            };
            if needed == 0 {
                break;
            }

            match channel.read_exactly(needed, deadline).await {
                Ok(chunk) => buf.extend_from_slice(&chunk),
                Err(ReadError::TimedOut) => return Err(self.time_out()),
                Err(ReadError::Io(e)) => return Err(self.abandon(e.into())),
            }
        }

        let response = match decode_response(&buf) {
            Ok(response) => response,
            Err(e) => return Err(self.abandon(e.into())),
        };

        match response {
            HandshakeResponse::Accepted => {
                self.advance(HandshakeState::Established);
                let params = SessionParams {
                    version: request.version(),
                    client_type: request.client_type(),
                    credentials_presented: request.credentials().is_some(),
                    elapsed: started.elapsed(),
                };
                debug!(
                    version = %params.version,
                    elapsed = ?params.elapsed,
                    "handshake established"
                );
                Ok(params)
            }
            HandshakeResponse::Rejected {
                status_code,
                message,
                server_version,
            } => {
                self.advance(HandshakeState::Rejected);
                let error = HandshakeError::classified(status_code, message, self.registry)
                    .with_server_version(server_version);
                warn!(
                    status = error.status_code(),
                    kind = %error.kind(),
                    server_version = %server_version,
                    "handshake rejected: {}",
                    error.message()
                );
                Err(HandshakeFailure::Rejected(error))
            }
        }
    }

    // Synchronous: the exchange returns in the same poll that reaches a
    // terminal state.
    fn time_out(&mut self) -> HandshakeFailure {
        warn!(state = %self.state, "handshake timed out");
        self.advance(HandshakeState::TimedOut);
        HandshakeFailure::TimedOut
    }

    fn abandon(&mut self, cause: ChannelBrokenCause) -> HandshakeFailure {
        warn!(state = %self.state, "handshake channel broken: {}", cause);
        self.advance(HandshakeState::ChannelBroken);
        HandshakeFailure::ChannelBroken(cause)
    }

    fn advance(&mut self, next: HandshakeState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal handshake transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "handshake transition");
        self.state = next;
    }
}

async fn close_quietly<C: HandshakeChannel>(channel: &mut C) {
    match timeout(CLOSE_TIMEOUT, channel.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("closing handshake channel failed: {}", e),
        Err(_) => debug!("closing handshake channel timed out"),
    }
}

/// Run a handshake with the standard registry and default limits.
pub async fn perform_handshake<C>(
    channel: &mut C,
    request: &HandshakeRequest,
    deadline: Instant,
) -> Result<SessionParams, HandshakeFailure>
where
    C: HandshakeChannel,
{
    HandshakeMachine::new().perform(channel, request, deadline).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_response, Credentials, StatusKind};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

    fn request() -> HandshakeRequest {
        HandshakeRequest::builder()
            .with_version(ProtocolVersion::V1_2_0)
            .with_client_type(ClientType::Thin)
            .with_credentials(Credentials::basic("grid", "pwd").unwrap())
            .build()
    }

    async fn read_request(server: &mut DuplexStream) -> Vec<u8> {
        let expected = encode_request(&request(), &WireLimits::default()).unwrap();
        let mut buf = vec![0u8; expected.len()];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, expected.to_vec());
        buf
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_established() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let peer = tokio::spawn(async move {
            read_request(&mut server).await;
            server.write_all(&[1]).await.unwrap();
            server
        });

        let params = perform_handshake(&mut client, &request(), deadline())
            .await
            .unwrap();
        assert_eq!(params.version, ProtocolVersion::V1_2_0);
        assert_eq!(params.client_type, ClientType::Thin);
        assert!(params.credentials_presented);
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_with_custom_registry() {
        let registry = StatusRegistry::empty().with_code(0x42, StatusKind::Throttled);
        let (mut client, mut server) = tokio::io::duplex(1024);
        let peer = tokio::spawn(async move {
            read_request(&mut server).await;
            let response = HandshakeResponse::rejected(0x42, "slow down", ProtocolVersion::V1_2_0);
            server
                .write_all(&encode_response(&response).unwrap())
                .await
                .unwrap();
            server
        });

        let failure = HandshakeMachine::with_registry(&registry)
            .perform(&mut client, &request(), deadline())
            .await
            .unwrap_err();
        let error = failure.rejection().unwrap();
        assert_eq!(error.kind(), StatusKind::Throttled);
        assert_eq!(error.message(), "slow down");
        assert_eq!(error.server_version(), Some(ProtocolVersion::V1_2_0));
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_flag_breaks_channel() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let peer = tokio::spawn(async move {
            read_request(&mut server).await;
            server.write_all(b"HTTP/1.1 400").await.unwrap();
            server
        });

        let failure = perform_handshake(&mut client, &request(), deadline())
            .await
            .unwrap_err();
        assert!(matches!(
            failure,
            HandshakeFailure::ChannelBroken(ChannelBrokenCause::Decoding(_))
        ));
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_encoding_error_sends_nothing() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let limits = WireLimits {
            max_credentials_len: 2,
        };

        let failure = HandshakeMachine::new()
            .with_limits(limits)
            .perform(&mut client, &request(), deadline())
            .await
            .unwrap_err();
        assert!(matches!(failure, HandshakeFailure::Encoding(_)));
        assert_eq!(failure.state(), HandshakeState::Idle);

        drop(client);
        let mut buf = Vec::new();
        server.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let failure = HandshakeMachine::new()
            .perform_cancellable(&mut client, &request(), deadline(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            failure,
            HandshakeFailure::ChannelBroken(ChannelBrokenCause::Cancelled)
        ));

        // Request was written, then the write side was closed
        let mut buf = Vec::new();
        server.read_to_end(&mut buf).await.unwrap();
        let expected = encode_request(&request(), &WireLimits::default()).unwrap();
        assert_eq!(buf, expected.to_vec());
    }

    /// Stream whose shutdown never completes.
    struct StuckShutdown(DuplexStream);

    impl AsyncRead for StuckShutdown {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for StuckShutdown {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.0).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_closing_keeps_timeout() {
        let (client, _server) = tokio::io::duplex(1024);
        let mut client = StuckShutdown(client);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let deadline = started + Duration::from_millis(50);
        let failure = HandshakeMachine::new()
            .perform_cancellable(&mut client, &request(), deadline, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(failure, HandshakeFailure::TimedOut));
        assert_eq!(failure.state(), HandshakeState::TimedOut);
        // Deadline plus the bounded close
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_after_rejection_keeps_rejection() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let cancel = CancellationToken::new();
        let peer = tokio::spawn(async move {
            read_request(&mut server).await;
            let response = HandshakeResponse::rejected(2, "bad pwd", ProtocolVersion::V1_2_0);
            server
                .write_all(&encode_response(&response).unwrap())
                .await
                .unwrap();
            server
        });

        let failure = HandshakeMachine::new()
            .perform_cancellable(&mut client, &request(), deadline(), &cancel)
            .await
            .unwrap_err();
        cancel.cancel();

        assert_eq!(failure.state(), HandshakeState::Rejected);
        assert_eq!(failure.rejection().map(|e| e.status_code()), Some(2));
        peer.await.unwrap();
    }

    #[test]
    fn test_new_machine_is_idle() {
        assert_eq!(HandshakeMachine::new().state(), HandshakeState::Idle);
    }
}
