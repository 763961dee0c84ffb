//! Chat payload formats: CPIM envelopes and IMDN disposition documents.
//!
//! Chat sessions do not put bare text on the wire. Outgoing messages are
//! wrapped in a CPIM envelope ([`cpim`]) carrying the end-to-end message
//! id and, when receipts are requested, an IMDN disposition-notification
//! header. Receipts come back as IMDN XML documents ([`imdn`]) wrapped in
//! CPIM envelopes of their own.
//!
//! Parsers here are strict about structure but lenient about content:
//! callers log and drop payloads that fail to parse rather than tearing
//! the session down.

use thiserror::Error;

pub mod cpim;
pub mod imdn;

pub use cpim::CpimMessage;
pub use imdn::{ImdnDocument, ImdnStatus};

/// CPIM envelope content type.
pub const CPIM_CONTENT_TYPE: &str = "message/cpim";

/// IMDN disposition document content type.
pub const IMDN_CONTENT_TYPE: &str = "message/imdn+xml";

/// Payload that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("malformed CPIM: {message}")]
    Cpim { message: String },

    #[error("malformed IMDN: {message}")]
    Imdn { message: String },
}

impl PayloadError {
    pub fn cpim(message: impl Into<String>) -> Self {
        Self::Cpim {
            message: message.into(),
        }
    }

    pub fn imdn(message: impl Into<String>) -> Self {
        Self::Imdn {
            message: message.into(),
        }
    }
}
