//! # SIP Message
//!
//! [`SipMessage`] is the request/response sum type the transport and
//! dialog layers pass around. Accessors cover the fields both kinds
//! share so dispatch code rarely needs to match.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::parser;
use crate::types::address::NameAddr;
use crate::types::headers::{CSeq, CallId};
use crate::types::method::Method;
use crate::types::request::SipRequest;
use crate::types::response::SipResponse;
use crate::types::status::StatusCode;

/// Either a SIP request or a SIP response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SipMessage {
    /// A request
    Request(SipRequest),
    /// A response
    Response(SipResponse),
}

impl SipMessage {
    /// Parse a message from its wire form
    pub fn parse(input: &[u8]) -> Result<Self> {
        parser::parse_message(input)
    }

    /// Whether this is a request
    pub fn is_request(&self) -> bool {
        matches!(self, SipMessage::Request(_))
    }

    /// Whether this is a response
    pub fn is_response(&self) -> bool {
        matches!(self, SipMessage::Response(_))
    }

    /// Whether this is an ACK request
    pub fn is_ack(&self) -> bool {
        matches!(self, SipMessage::Request(req) if req.is_ack())
    }

    /// The request method, if this is a request
    pub fn method(&self) -> Option<&Method> {
        match self {
            SipMessage::Request(req) => Some(&req.method),
            SipMessage::Response(_) => None,
        }
    }

    /// The status code, if this is a response
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SipMessage::Request(_) => None,
            SipMessage::Response(resp) => Some(resp.status),
        }
    }

    /// Call-ID header
    pub fn call_id(&self) -> &CallId {
        match self {
            SipMessage::Request(req) => &req.call_id,
            SipMessage::Response(resp) => &resp.call_id,
        }
    }

    /// CSeq header
    pub fn cseq(&self) -> &CSeq {
        match self {
            SipMessage::Request(req) => &req.cseq,
            SipMessage::Response(resp) => &resp.cseq,
        }
    }

    /// From header
    pub fn from(&self) -> &NameAddr {
        match self {
            SipMessage::Request(req) => &req.from,
            SipMessage::Response(resp) => &resp.from,
        }
    }

    /// To header
    pub fn to(&self) -> &NameAddr {
        match self {
            SipMessage::Request(req) => &req.to,
            SipMessage::Response(resp) => &resp.to,
        }
    }

    /// Borrow as a request, if it is one
    pub fn as_request(&self) -> Option<&SipRequest> {
        match self {
            SipMessage::Request(req) => Some(req),
            SipMessage::Response(_) => None,
        }
    }

    /// Borrow as a response, if it is one
    pub fn as_response(&self) -> Option<&SipResponse> {
        match self {
            SipMessage::Request(_) => None,
            SipMessage::Response(resp) => Some(resp),
        }
    }

    /// Consume into a request, if it is one
    pub fn into_request(self) -> Option<SipRequest> {
        match self {
            SipMessage::Request(req) => Some(req),
            SipMessage::Response(_) => None,
        }
    }

    /// Consume into a response, if it is one
    pub fn into_response(self) -> Option<SipResponse> {
        match self {
            SipMessage::Request(_) => None,
            SipMessage::Response(resp) => Some(resp),
        }
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for SipMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SipMessage::Request(req) => req.fmt(f),
            SipMessage::Response(resp) => resp.fmt(f),
        }
    }
}

impl From<SipRequest> for SipMessage {
    fn from(request: SipRequest) -> Self {
        SipMessage::Request(request)
    }
}

impl From<SipResponse> for SipMessage {
    fn from(response: SipResponse) -> Self {
        SipMessage::Response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::uri::SipUri;

    fn bye() -> SipRequest {
        SipRequest::new(
            Method::Bye,
            SipUri::new("bob", "biloxi.com"),
            NameAddr::new(SipUri::new("alice", "atlanta.com")).with_tag("aa"),
            NameAddr::new(SipUri::new("bob", "biloxi.com")).with_tag("bb"),
            "callid@host".into(),
            2,
        )
    }

    #[test]
    fn test_shared_accessors() {
        let msg: SipMessage = bye().into();
        assert!(msg.is_request());
        assert!(!msg.is_ack());
        assert_eq!(msg.method(), Some(&Method::Bye));
        assert_eq!(msg.call_id().as_str(), "callid@host");
        assert_eq!(msg.cseq().seq, 2);
        assert_eq!(msg.from().tag(), Some("aa"));
    }

    #[test]
    fn test_response_accessors() {
        let resp = SipResponse::from_request(StatusCode::Ok, &bye());
        let msg: SipMessage = resp.into();
        assert!(msg.is_response());
        assert_eq!(msg.status(), Some(StatusCode::Ok));
        assert_eq!(msg.method(), None);
    }

    #[test]
    fn test_wire_roundtrip() {
        let msg: SipMessage = bye().into();
        let parsed = SipMessage::parse(&msg.to_bytes()).unwrap();
        assert_eq!(parsed, msg);
    }
}
