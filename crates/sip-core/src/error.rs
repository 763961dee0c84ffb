//! Error types for SIP and SDP handling.

use thiserror::Error;

/// Result type for sip-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while parsing or building SIP messages and SDP bodies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed message that could not be parsed at all
    #[error("parse error: {message}")]
    Parser { message: String },

    /// A header was present but its value could not be interpreted
    #[error("invalid {name} header: {message}")]
    InvalidHeader { name: String, message: String },

    /// A header required by the message model was absent
    #[error("missing required header: {name}")]
    MissingHeader { name: String },

    /// Malformed URI
    #[error("invalid URI: {message}")]
    InvalidUri { message: String },

    /// Malformed SDP body
    #[error("SDP parse error: {message}")]
    SdpParse { message: String },
}

impl Error {
    /// Create a generic parse error
    pub fn parser(message: impl Into<String>) -> Self {
        Self::Parser { message: message.into() }
    }

    /// Create an invalid-header error for the named header
    pub fn invalid_header(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidHeader { name: name.into(), message: message.into() }
    }

    /// Create a missing-header error for the named header
    pub fn missing_header(name: impl Into<String>) -> Self {
        Self::MissingHeader { name: name.into() }
    }

    /// Create an invalid-URI error
    pub fn invalid_uri(message: impl Into<String>) -> Self {
        Self::InvalidUri { message: message.into() }
    }

    /// Create an SDP parse error
    pub fn sdp_parse(message: impl Into<String>) -> Self {
        Self::SdpParse { message: message.into() }
    }
}
