//! Connection handshake.
//!
//! The client side is a small state machine driven by
//! [`perform_handshake`] / [`HandshakeMachine`]. Every attempt ends in
//! exactly one terminal state:
//!
//! | outcome | result |
//! |---------|--------|
//! | peer accepted | `Ok(SessionParams)` |
//! | peer refused | `Err(HandshakeFailure::Rejected(HandshakeError))` |
//! | no answer before the deadline | `Err(HandshakeFailure::TimedOut)` |
//! | I/O failure, garbage, cancellation | `Err(HandshakeFailure::ChannelBroken(_))` |
//!
//! The machine never retries. [`HandshakeFailure::retry_advice`] tells the
//! caller what a retry could achieve.
//!
//! The server side lives in [`acceptor`].

pub mod acceptor;
pub mod channel;
pub mod failure;
pub mod machine;
pub mod state;

pub use acceptor::{
    AcceptError, AcceptedSession, Authenticator, HandshakeAcceptor, ServerState,
    StaticAuthenticator,
};
pub use channel::{HandshakeChannel, ReadError};
pub use failure::{ChannelBrokenCause, HandshakeError, HandshakeFailure};
pub use machine::{perform_handshake, HandshakeMachine, SessionParams};
pub use state::HandshakeState;
