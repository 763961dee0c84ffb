//! Error types for MSRP media handling.

use thiserror::Error;

/// Errors produced by the MSRP layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MsrpError {
    /// An outbound connection could not be established.
    #[error("failed to connect to {host}:{port}: {message}")]
    Connect {
        /// Peer host
        host: String,
        /// Peer port
        port: u16,
        /// Description of the failure
        message: String,
    },

    /// An inbound connection could not be accepted.
    #[error("failed to accept on port {port}: {message}")]
    Accept {
        /// Local listening port
        port: u16,
        /// Description of the failure
        message: String,
    },

    /// The media stream is closed.
    #[error("media stream closed")]
    Closed,

    /// A chunk could not be encoded or decoded.
    #[error("chunk codec error: {message}")]
    Codec {
        /// Description of the failure
        message: String,
    },

    /// Media setup was aborted before it completed.
    #[error("media setup aborted")]
    Aborted,

    /// Media setup did not complete in time.
    #[error("media setup timed out: {message}")]
    Timeout {
        /// What was being waited for
        message: String,
    },
}

impl MsrpError {
    /// Create a connect error.
    pub fn connect(host: impl Into<String>, port: u16, message: impl Into<String>) -> Self {
        Self::Connect {
            host: host.into(),
            port,
            message: message.into(),
        }
    }

    /// Create an accept error.
    pub fn accept(port: u16, message: impl Into<String>) -> Self {
        Self::Accept {
            port,
            message: message.into(),
        }
    }

    /// Create a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }
}

/// Result type for MSRP operations.
pub type Result<T> = std::result::Result<T, MsrpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MsrpError::connect("10.0.0.2", 2855, "connection refused");
        assert_eq!(
            err.to_string(),
            "failed to connect to 10.0.0.2:2855: connection refused"
        );
        assert_eq!(MsrpError::Aborted.to_string(), "media setup aborted");
    }
}
