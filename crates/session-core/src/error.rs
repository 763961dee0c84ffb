//! Session-level error taxonomy.
//!
//! Every way a session can fail collapses into one [`SessionError`]: a
//! [`SessionErrorKind`] naming the failure class and a human-readable
//! reason. The kind is what listeners get in the failure notification, so it
//! stays coarse on purpose; the reason carries the detail.

use rims_dialog_core::DialogError;
use rims_msrp_core::MsrpError;
use thiserror::Error;

/// Classes of session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SessionErrorKind {
    /// The session never got past signaling setup.
    SessionInitiationFailed,
    /// The peer's SDP could not be understood or answered.
    MediaNegotiation,
    /// The media connection failed to open or died.
    MediaTransport,
    /// Something did not happen in time.
    Timeout,
    /// The session was cancelled before it was established.
    Cancelled,
    /// The peer tore the session down during setup.
    TerminatedByRemote,
    /// No media activity within the configured window.
    Inactivity,
    /// An internal invariant was violated.
    UnexpectedFault,
}

impl SessionErrorKind {
    /// Stable string form used in logs and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionInitiationFailed => "session-initiation-failed",
            Self::MediaNegotiation => "media-negotiation",
            Self::MediaTransport => "media-transport",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::TerminatedByRemote => "terminated-by-remote",
            Self::Inactivity => "inactivity",
            Self::UnexpectedFault => "unexpected-fault",
        }
    }
}

impl std::fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session failure: a kind plus the detail behind it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {reason}")]
pub struct SessionError {
    /// Failure class, as reported to listeners.
    pub kind: SessionErrorKind,
    /// Human-readable detail.
    pub reason: String,
}

impl SessionError {
    /// Create an error of the given kind.
    pub fn new(kind: SessionErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// Signaling setup failure.
    pub fn initiation(reason: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::SessionInitiationFailed, reason)
    }

    /// SDP negotiation failure.
    pub fn negotiation(reason: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::MediaNegotiation, reason)
    }

    /// Media plane failure.
    pub fn media(reason: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::MediaTransport, reason)
    }

    /// Timeout failure.
    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Timeout, reason)
    }

    /// Cancellation before establishment.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Cancelled, reason)
    }

    /// Peer-initiated teardown during setup.
    pub fn terminated_by_remote(reason: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::TerminatedByRemote, reason)
    }

    /// Inactivity expiry.
    pub fn inactivity(reason: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Inactivity, reason)
    }

    /// Internal fault.
    pub fn unexpected(reason: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::UnexpectedFault, reason)
    }
}

impl From<MsrpError> for SessionError {
    fn from(err: MsrpError) -> Self {
        let kind = match &err {
            MsrpError::Aborted => SessionErrorKind::Cancelled,
            MsrpError::Timeout { .. } => SessionErrorKind::Timeout,
            _ => SessionErrorKind::MediaTransport,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<DialogError> for SessionError {
    fn from(err: DialogError) -> Self {
        let kind = match &err {
            DialogError::Timeout { .. } => SessionErrorKind::Timeout,
            _ => SessionErrorKind::UnexpectedFault,
        };
        Self::new(kind, err.to_string())
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::inactivity("no data for 300s");
        assert_eq!(err.to_string(), "inactivity: no data for 300s");
    }

    #[test]
    fn test_msrp_error_mapping() {
        let err: SessionError = MsrpError::Aborted.into();
        assert_eq!(err.kind, SessionErrorKind::Cancelled);

        let err: SessionError = MsrpError::Closed.into();
        assert_eq!(err.kind, SessionErrorKind::MediaTransport);

        let err: SessionError = MsrpError::timeout("waiting").into();
        assert_eq!(err.kind, SessionErrorKind::Timeout);
    }

    #[test]
    fn test_dialog_error_mapping() {
        let err: SessionError = DialogError::timeout("no ACK").into();
        assert_eq!(err.kind, SessionErrorKind::Timeout);

        let err: SessionError = DialogError::internal("oops").into();
        assert_eq!(err.kind, SessionErrorKind::UnexpectedFault);
    }
}
