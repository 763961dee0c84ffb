//! Error types for the transport layer.
//!
//! Transport failures fall into a small number of buckets: the send path
//! failed, the transport was already closed, the in-process channel backing a
//! [`ChannelTransport`](crate::channel::ChannelTransport) went away, or the
//! caller handed us a destination the transport cannot reach.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors produced by the transport layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// A message could not be handed to the wire.
    #[error("failed to send message: {message}")]
    SendFailed {
        /// Description of the failure
        message: String,
    },

    /// The transport was closed before or during the operation.
    #[error("transport is closed")]
    Closed,

    /// The channel backing an in-memory transport was dropped.
    #[error("transport channel closed: {message}")]
    ChannelClosed {
        /// Description of the failure
        message: String,
    },

    /// The destination address is not reachable through this transport.
    #[error("invalid destination {destination}: {message}")]
    InvalidDestination {
        /// The offending address
        destination: SocketAddr,
        /// Why it was rejected
        message: String,
    },
}

impl TransportError {
    /// Create a send failure error.
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::SendFailed {
            message: message.into(),
        }
    }

    /// Create a channel-closed error.
    pub fn channel_closed(message: impl Into<String>) -> Self {
        Self::ChannelClosed {
            message: message.into(),
        }
    }

    /// Create an invalid-destination error.
    pub fn invalid_destination(destination: SocketAddr, message: impl Into<String>) -> Self {
        Self::InvalidDestination {
            destination,
            message: message.into(),
        }
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::send_failed("peer went away");
        assert_eq!(err.to_string(), "failed to send message: peer went away");

        assert_eq!(TransportError::Closed.to_string(), "transport is closed");
    }

    #[test]
    fn test_invalid_destination_display() {
        let addr: SocketAddr = "192.0.2.7:5060".parse().unwrap();
        let err = TransportError::invalid_destination(addr, "not the connected peer");
        assert_eq!(
            err.to_string(),
            "invalid destination 192.0.2.7:5060: not the connected peer"
        );
    }
}
