//! Error types for dialog and transaction handling.

use rims_sip_transport::TransportError;
use thiserror::Error;

/// Errors produced by the dialog layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogError {
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A transaction with the same key is already pending.
    #[error("duplicate transaction: {message}")]
    DuplicateTransaction {
        /// Description of the colliding key
        message: String,
    },

    /// A transaction expired without an answer.
    #[error("transaction timed out: {message}")]
    Timeout {
        /// What was being waited for
        message: String,
    },

    /// A message could not be used in its dialog context.
    #[error("invalid message: {message}")]
    InvalidMessage {
        /// Description of the problem
        message: String,
    },

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the problem
        message: String,
    },
}

impl DialogError {
    /// Create a duplicate-transaction error.
    pub fn duplicate_transaction(message: impl Into<String>) -> Self {
        Self::DuplicateTransaction {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create an invalid-message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for dialog operations.
pub type Result<T> = std::result::Result<T, DialogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DialogError::duplicate_transaction("INVITE 1 already pending");
        assert_eq!(
            err.to_string(),
            "duplicate transaction: INVITE 1 already pending"
        );
    }

    #[test]
    fn test_transport_error_converts() {
        let err: DialogError = TransportError::Closed.into();
        assert_eq!(err.to_string(), "transport error: transport is closed");
    }
}
