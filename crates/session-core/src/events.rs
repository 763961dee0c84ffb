//! Session and engine event types.
//!
//! Observation is pub/sub: every session carries a broadcast channel that
//! any number of subscribers can tap via [`ImsSession::subscribe`], and
//! the engine has one more for lifecycle events that concern no single
//! session (new incoming sessions, sessions leaving the registry).
//! Broadcast semantics apply: a subscriber that falls behind loses the
//! oldest events, never blocks the session task.
//!
//! [`ImsSession::subscribe`]: crate::session::ImsSession::subscribe

use std::sync::Arc;

use crate::delivery::{ChatMessage, DeliveryOutcome};
use crate::error::SessionErrorKind;
use crate::session::{ImsSession, SessionId};
use crate::state::SessionState;

/// Why a session ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// We sent the BYE.
    LocalBye,
    /// The peer sent the BYE.
    RemoteBye,
    /// The INVITE was cancelled before the session established.
    Cancelled,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::LocalBye => "local-bye",
            Self::RemoteBye => "remote-bye",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Events published by one session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session moved between states.
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// Signaling and media are both up; the session is usable.
    Established,
    /// A chat message arrived from the peer.
    MessageReceived { message: ChatMessage },
    /// A delivery receipt arrived for an earlier outgoing message.
    DeliveryUpdate {
        message_id: String,
        outcome: DeliveryOutcome,
        contact: String,
    },
    /// The session ended normally. Emitted exactly once, and only for
    /// sessions that end without a fault.
    Ended { reason: EndReason },
    /// The session ended with a fault. Emitted exactly once.
    Failed {
        kind: SessionErrorKind,
        reason: String,
    },
}

/// Engine-level lifecycle events.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A remote party opened a session toward us; the session is already
    /// running and registered.
    IncomingSession { session: Arc<ImsSession> },
    /// A session left the registry in the given terminal state.
    SessionEnded {
        id: SessionId,
        state: SessionState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_reason_display() {
        assert_eq!(EndReason::LocalBye.to_string(), "local-bye");
        assert_eq!(EndReason::RemoteBye.to_string(), "remote-bye");
        assert_eq!(EndReason::Cancelled.to_string(), "cancelled");
    }
}
