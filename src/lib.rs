//! # gridlink-client
//!
//! Connection handshake for thin clients of a grid server node.
//!
//! Before any request/response traffic, every client connection completes
//! one handshake: the client announces its protocol version, client type and
//! credentials; the server either accepts or rejects with a one-byte status
//! code and a message.
//!
//! ## Features
//!
//! - **Wire codec** - Bit-exact request/response encoding with length limits
//! - **Status registry** - Total mapping of status bytes to failure kinds
//! - **State machine** - Deadline-bounded exchange with exactly one outcome
//! - **Acceptor** - Server-side validation for tests and embedded servers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridlink_client::{ClientConfig, Connection};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder("node1:10800")?
//!         .with_basic_auth("grid", "secret")?
//!         .with_handshake_timeout(Duration::from_secs(5))
//!         .build();
//!
//!     let connection = Connection::connect(&config).await?;
//!     println!("session: {:?}", connection.session());
//!     connection.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Handling Failures
//!
//! A refused handshake keeps the server's status byte and message verbatim:
//!
//! ```rust,no_run
//! # use gridlink_client::{ClientConfig, ClientError, Connection, StatusKind};
//! # async fn example(config: ClientConfig) {
//! match Connection::connect(&config).await {
//!     Ok(connection) => println!("connected to {}", connection.address()),
//!     Err(err) => match err.rejection() {
//!         Some(rejection) if rejection.kind() == StatusKind::VersionMismatch => {
//!             eprintln!("upgrade needed: {}", rejection.message());
//!         }
//!         Some(rejection) => {
//!             eprintln!("refused ({}): {}", rejection.status_code(), rejection.message())
//!         }
//!         None if err.is_retryable() => eprintln!("transient: {}", err),
//!         None => eprintln!("fatal: {}", err),
//!     },
//! }
//! # }
//! ```
//!
//! ## Custom Channels
//!
//! [`perform_handshake`] runs over anything implementing
//! [`HandshakeChannel`], which covers every tokio `AsyncRead + AsyncWrite`
//! stream:
//!
//! ```rust
//! use gridlink_client::{perform_handshake, HandshakeRequest};
//! use std::time::Duration;
//! use tokio::io::AsyncWriteExt;
//! use tokio::time::Instant;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut client, mut server) = tokio::io::duplex(64);
//! server.write_all(&[1]).await.unwrap(); // accepted
//!
//! let request = HandshakeRequest::builder().build();
//! let deadline = Instant::now() + Duration::from_secs(1);
//! let session = perform_handshake(&mut client, &request, deadline).await.unwrap();
//! assert!(!session.credentials_presented);
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Messages, codec and status registry
//! - [`handshake`] - Client state machine and server acceptor
//! - [`client`] - TCP connection and configuration

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod handshake;
pub mod protocol;

// Re-exports for convenience
pub use client::{ClientConfig, ClientConfigBuilder, ClientError, ClientResult, Connection};

pub use handshake::{
    perform_handshake, ChannelBrokenCause, HandshakeAcceptor, HandshakeChannel, HandshakeError,
    HandshakeFailure, HandshakeMachine, HandshakeState, SessionParams,
};

pub use protocol::{
    ClientType, Credentials, HandshakeRequest, HandshakeResponse, ProtocolVersion, RetryAdvice,
    StatusCode, StatusKind, StatusRegistry,
};
