//! Client handshake against scripted peers.

use std::time::Duration;

use gridlink_client::handshake::ChannelBrokenCause;
use gridlink_client::protocol::{encode_request, encode_response, WireLimits};
use gridlink_client::{
    perform_handshake, ClientType, Credentials, HandshakeError, HandshakeFailure,
    HandshakeRequest, HandshakeResponse, HandshakeState, ProtocolVersion, StatusCode, StatusKind,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(3);

fn request() -> HandshakeRequest {
    HandshakeRequest::builder()
        .with_version(ProtocolVersion::V1_2_0)
        .with_client_type(ClientType::Thin)
        .with_credentials(Credentials::basic("grid", "pwd").unwrap())
        .build()
}

fn request_len() -> usize {
    encode_request(&request(), &WireLimits::default())
        .unwrap()
        .len()
}

/// Peer behaviors a handshake must survive.
#[derive(Debug, Clone)]
enum Peer {
    /// Send these bytes after reading the request, then keep the channel open
    Reply(Vec<u8>),
    /// Send these bytes after reading the request, then hang up
    ReplyAndHangUp(Vec<u8>),
    /// Read the request and never answer
    Silent,
    /// Hang up without reading anything
    Gone,
}

async fn run_peer(mut server: DuplexStream, peer: Peer) {
    if let Peer::Gone = peer {
        drop(server);
        return;
    }

    let mut buf = vec![0u8; request_len()];
    if server.read_exact(&mut buf).await.is_err() {
        return;
    }

    match peer {
        Peer::Reply(bytes) => {
            let _ = server.write_all(&bytes).await;
            // Keep the stream alive until the client is done with it
            let mut sink = Vec::new();
            let _ = server.read_to_end(&mut sink).await;
        }
        Peer::ReplyAndHangUp(bytes) => {
            let _ = server.write_all(&bytes).await;
        }
        Peer::Silent => {
            let mut sink = Vec::new();
            let _ = server.read_to_end(&mut sink).await;
        }
        Peer::Gone => unreachable!(),
    }
}

async fn handshake_with(peer: Peer) -> Result<gridlink_client::SessionParams, HandshakeFailure> {
    let (mut client, server) = tokio::io::duplex(4096);
    let peer_task = tokio::spawn(run_peer(server, peer));

    let deadline = Instant::now() + TIMEOUT;
    let result = perform_handshake(&mut client, &request(), deadline).await;

    drop(client);
    peer_task.await.unwrap();
    result
}

fn rejection(status: u8, message: &str) -> Vec<u8> {
    encode_response(&HandshakeResponse::rejected(
        status,
        message,
        ProtocolVersion::new(1, 0, 0),
    ))
    .unwrap()
    .to_vec()
}

#[tokio::test]
async fn accepted_peer_establishes_session() {
    let params = handshake_with(Peer::Reply(vec![1])).await.unwrap();

    assert_eq!(params.version, ProtocolVersion::V1_2_0);
    assert_eq!(params.client_type, ClientType::Thin);
    assert!(params.credentials_presented);
}

#[tokio::test]
async fn bad_password_is_rejected_verbatim() {
    let mut reply = vec![0, 2, 0, 7];
    reply.extend_from_slice(b"bad pwd");
    reply.extend_from_slice(&[0, 1, 0, 0, 0, 0]);

    let failure = handshake_with(Peer::Reply(reply)).await.unwrap_err();
    assert_eq!(failure.state(), HandshakeState::Rejected);

    let error = failure.rejection().expect("rejection");
    assert_eq!(*error, HandshakeError::new(2, "bad pwd"));
    assert_eq!(error.kind(), StatusKind::AuthenticationFailed);
    assert_eq!(error.server_version(), Some(ProtocolVersion::new(1, 0, 0)));
}

#[tokio::test]
async fn unmapped_status_is_unrecognized() {
    let failure = handshake_with(Peer::Reply(rejection(200, "mystery")))
        .await
        .unwrap_err();

    let error = failure.rejection().expect("rejection");
    assert_eq!(error.status_code(), 200);
    assert_eq!(error.message(), "mystery");
    assert_eq!(error.kind(), StatusKind::Unrecognized(200));
    assert!(!failure.is_retryable());
}

#[tokio::test]
async fn every_known_status_is_rejected_with_its_kind() {
    let cases = [
        (StatusCode::VERSION_MISMATCH, StatusKind::VersionMismatch, false),
        (StatusCode::AUTHENTICATION_FAILED, StatusKind::AuthenticationFailed, false),
        (StatusCode::AUTHORIZATION_FAILED, StatusKind::AuthorizationFailed, false),
        (StatusCode::SERVER_NOT_READY, StatusKind::ServerNotReady, true),
        (StatusCode::THROTTLED, StatusKind::Throttled, true),
    ];

    for (code, kind, retryable) in cases {
        let failure = handshake_with(Peer::Reply(rejection(code, "refused")))
            .await
            .unwrap_err();
        let error = failure.rejection().expect("rejection");
        assert_eq!(error.kind(), kind);
        assert_eq!(failure.is_retryable(), retryable, "{:?}", kind);
    }
}

#[tokio::test(start_paused = true)]
async fn silent_peer_times_out() {
    let started = Instant::now();
    let failure = handshake_with(Peer::Silent).await.unwrap_err();

    assert!(matches!(failure, HandshakeFailure::TimedOut));
    assert!(failure.rejection().is_none());
    assert!(started.elapsed() >= TIMEOUT);
}

#[tokio::test]
async fn disconnect_mid_response_breaks_channel() {
    // Header promises a 7-byte message, then the peer hangs up
    let failure = handshake_with(Peer::ReplyAndHangUp(vec![0, 2, 0, 7, b'b', b'a']))
        .await
        .unwrap_err();

    assert_eq!(failure.state(), HandshakeState::ChannelBroken);
    match failure {
        HandshakeFailure::ChannelBroken(ChannelBrokenCause::Io(e)) => {
            assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof);
        }
        other => panic!("expected broken channel, got {:?}", other),
    }
}

#[tokio::test]
async fn vanished_peer_breaks_channel() {
    let failure = handshake_with(Peer::Gone).await.unwrap_err();
    assert!(matches!(
        failure,
        HandshakeFailure::ChannelBroken(ChannelBrokenCause::Io(_))
    ));
}

#[tokio::test]
async fn malformed_response_breaks_channel() {
    let mut reply = rejection(2, "bad pwd");
    reply[4] = 0xFF; // not UTF-8

    let failure = handshake_with(Peer::Reply(reply)).await.unwrap_err();
    assert!(matches!(
        failure,
        HandshakeFailure::ChannelBroken(ChannelBrokenCause::Decoding(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn every_peer_behavior_terminates_within_deadline() {
    let behaviors = vec![
        Peer::Reply(vec![1]),
        Peer::Reply(rejection(StatusCode::THROTTLED, "busy")),
        Peer::Reply(rejection(77, "odd")),
        Peer::Reply(vec![0, 2]),
        Peer::Reply(vec![9]),
        Peer::ReplyAndHangUp(vec![0, 1, 0, 3, b'x']),
        Peer::ReplyAndHangUp(Vec::new()),
        Peer::Silent,
        Peer::Gone,
    ];
    let slack = Duration::from_millis(200);

    for peer in behaviors {
        let started = Instant::now();
        let result = handshake_with(peer.clone()).await;
        let elapsed = started.elapsed();

        let state = match &result {
            Ok(_) => HandshakeState::Established,
            Err(failure) => failure.state(),
        };
        assert!(state.is_terminal(), "{:?} ended in {}", peer, state);
        assert!(elapsed <= TIMEOUT + slack, "{:?} took {:?}", peer, elapsed);
    }
}
