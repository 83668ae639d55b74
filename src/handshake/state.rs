//! Handshake state machine states.

use std::fmt;

/// State of a single handshake attempt.
///
/// ```text
/// Idle -> RequestSent -> AwaitingResponse -> Established
///                                         -> Rejected
///   (any non-terminal) -> TimedOut | ChannelBroken
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// Nothing sent yet
    Idle,
    /// Request fully written to the channel
    RequestSent,
    /// Waiting for the peer's response
    AwaitingResponse,
    /// Peer accepted the handshake
    Established,
    /// Peer refused the handshake
    Rejected,
    /// No complete response before the deadline
    TimedOut,
    /// Channel failed, peer spoke garbage, or the attempt was cancelled
    ChannelBroken,
}

impl HandshakeState {
    /// Check if no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HandshakeState::Established
                | HandshakeState::Rejected
                | HandshakeState::TimedOut
                | HandshakeState::ChannelBroken
        )
    }

    /// Check if `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: HandshakeState) -> bool {
        use HandshakeState::*;

        if self.is_terminal() {
            return false;
        }

        match next {
            TimedOut | ChannelBroken => true,
            RequestSent => self == Idle,
            AwaitingResponse => self == RequestSent,
            Established | Rejected => self == AwaitingResponse,
            Idle => false,
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Idle => "idle",
            HandshakeState::RequestSent => "request-sent",
            HandshakeState::AwaitingResponse => "awaiting-response",
            HandshakeState::Established => "established",
            HandshakeState::Rejected => "rejected",
            HandshakeState::TimedOut => "timed-out",
            HandshakeState::ChannelBroken => "channel-broken",
        };
        f.write_str(name)
    }
}
