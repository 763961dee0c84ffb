//! # rims-sip-core
//!
//! SIP-style message model and SDP handling for the RIMS session core.
//!
//! This crate is the protocol vocabulary the rest of the stack speaks:
//!
//! - [`types`]: requests, responses, methods, status codes, URIs,
//!   name-addr values and the typed headers the dialog layer keys on
//! - [`parser`]: wire-format parsing built on `nom`
//! - [`sdp`]: session descriptions for MSRP offer/answer negotiation
//!
//! Messages serialize through `Display` and parse through
//! [`types::SipMessage::parse`]; both directions are covered by tests in
//! the modules that own them.
//!
//! ## Example
//!
//! ```rust
//! use rims_sip_core::prelude::*;
//!
//! let request = SipRequest::new(
//!     Method::Message,
//!     SipUri::new("bob", "example.com"),
//!     NameAddr::new(SipUri::new("alice", "example.com")).with_tag("abc"),
//!     NameAddr::new(SipUri::new("bob", "example.com")),
//!     "id123@10.0.0.1".into(),
//!     1,
//! );
//! let parsed = SipMessage::parse(&request.to_string().into_bytes()).unwrap();
//! assert_eq!(parsed.method(), Some(&Method::Message));
//! ```

pub mod error;
pub mod parser;
#[cfg(feature = "sdp")]
pub mod sdp;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    CSeq, CallId, Headers, Method, NameAddr, SipMessage, SipRequest, SipResponse, SipUri,
    StatusCode, Via,
};

/// Convenience glob import for downstream crates
pub mod prelude {
    pub use crate::error::{Error, Result};
    #[cfg(feature = "sdp")]
    pub use crate::sdp::{
        ntp_timestamp, parse_sdp, MediaDescription, SdpAttribute, SdpConnection, SdpSession,
    };
    pub use crate::types::ids::{generate_branch, generate_call_id, generate_tag};
    pub use crate::types::{
        CSeq, CallId, Headers, Method, NameAddr, SipMessage, SipRequest, SipResponse, SipUri,
        StatusCode, Via,
    };
}
