//! Session lifecycle state machine.
//!
//! A session moves through two setup milestones, signaling and media, which
//! may complete in either order depending on who dials the media connection:
//!
//! ```text
//!                    ┌──> SignalingEstablished ──┐
//!   Initiating ──────┤                           ├──> Established ──> Terminating ──> Terminated
//!                    └──> MediaOpen ─────────────┘
//! ```
//!
//! `SignalingEstablished` means the dialog is confirmed but media is not yet
//! open; `MediaOpen` is the reverse. `Cancelled` is reachable only before
//! `Established`; `Failed` is reachable from every non-terminal state.
//! Terminal states absorb: no transition leaves them, which is what makes
//! end-of-session notifications one-shot.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Signaling is in flight; nothing is confirmed yet.
    Initiating,
    /// The dialog is confirmed; media is not yet open.
    SignalingEstablished,
    /// Media is open; the dialog is not yet confirmed.
    MediaOpen,
    /// Both signaling and media are up; the session is usable.
    Established,
    /// A local BYE is in flight.
    Terminating,
    /// The session ended in an orderly way.
    Terminated,
    /// The session was called off before it was established.
    Cancelled,
    /// The session ended abnormally.
    Failed,
}

impl SessionState {
    /// Whether this state ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Cancelled | Self::Failed)
    }

    /// Whether the session can carry chat traffic.
    pub fn is_established(&self) -> bool {
        matches!(self, Self::Established)
    }

    /// Whether moving to `next` is legal from this state.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }
        match self {
            Initiating => matches!(next, SignalingEstablished | MediaOpen | Cancelled),
            SignalingEstablished => matches!(next, Established | Terminating | Cancelled),
            MediaOpen => matches!(next, Established | Cancelled),
            Established => matches!(next, Terminating),
            Terminating => matches!(next, Terminated),
            Terminated | Cancelled | Failed => false,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initiating => "initiating",
            Self::SignalingEstablished => "signaling-established",
            Self::MediaOpen => "media-open",
            Self::Established => "established",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn test_setup_milestones_commute() {
        // Signaling first, then media.
        assert!(Initiating.can_transition_to(SignalingEstablished));
        assert!(SignalingEstablished.can_transition_to(Established));

        // Media first, then signaling.
        assert!(Initiating.can_transition_to(MediaOpen));
        assert!(MediaOpen.can_transition_to(Established));
    }

    #[test]
    fn test_cancelled_only_before_established() {
        assert!(Initiating.can_transition_to(Cancelled));
        assert!(SignalingEstablished.can_transition_to(Cancelled));
        assert!(MediaOpen.can_transition_to(Cancelled));
        assert!(!Established.can_transition_to(Cancelled));
        assert!(!Terminating.can_transition_to(Cancelled));
    }

    #[test]
    fn test_failed_from_any_live_state() {
        for state in [
            Initiating,
            SignalingEstablished,
            MediaOpen,
            Established,
            Terminating,
        ] {
            assert!(state.can_transition_to(Failed), "{state} -> failed");
        }
    }

    #[test]
    fn test_terminal_states_absorb() {
        for terminal in [Terminated, Cancelled, Failed] {
            assert!(terminal.is_terminal());
            for next in [
                Initiating,
                SignalingEstablished,
                MediaOpen,
                Established,
                Terminating,
                Terminated,
                Cancelled,
                Failed,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_orderly_teardown_path() {
        assert!(Established.can_transition_to(Terminating));
        assert!(Terminating.can_transition_to(Terminated));
        assert!(!Established.can_transition_to(Terminated));
    }
}
