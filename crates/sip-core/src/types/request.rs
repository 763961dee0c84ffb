//! # SIP Request Message
//!
//! A request is a start line (method + target URI), the typed headers the
//! transaction and dialog layers key on, any further headers verbatim, and
//! an optional body.
//!
//! ## Examples
//!
//! ```rust
//! use rims_sip_core::types::{Method, NameAddr, SipRequest, SipUri};
//!
//! let request = SipRequest::new(
//!     Method::Invite,
//!     SipUri::new("bob", "biloxi.com"),
//!     NameAddr::new(SipUri::new("alice", "atlanta.com")).with_tag("1928301774"),
//!     NameAddr::new(SipUri::new("bob", "biloxi.com")),
//!     "a84b4c76e66710@10.0.0.1".into(),
//!     1,
//! )
//! .with_content_type("application/sdp")
//! .with_body("v=0\r\n");
//!
//! assert!(request.to_string().starts_with("INVITE sip:bob@biloxi.com SIP/2.0\r\n"));
//! ```

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::address::NameAddr;
use crate::types::headers::{CSeq, CallId, Headers, Via};
use crate::types::method::Method;
use crate::types::uri::SipUri;

/// A SIP request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipRequest {
    /// Request method
    pub method: Method,
    /// Request target URI
    pub uri: SipUri,
    /// Via entries, topmost first
    pub via: Vec<Via>,
    /// Route set entries, in traversal order
    pub route: Vec<String>,
    /// From header (carries the sender's tag)
    pub from: NameAddr,
    /// To header (carries the recipient's tag once the dialog exists)
    pub to: NameAddr,
    /// Call-ID header
    pub call_id: CallId,
    /// CSeq header
    pub cseq: CSeq,
    /// Contact header, if any
    pub contact: Option<NameAddr>,
    /// Content-Type header, if a body is carried
    pub content_type: Option<String>,
    /// Headers without a dedicated field, in order
    pub headers: Headers,
    /// Message body (may be empty)
    pub body: Bytes,
}

impl SipRequest {
    /// Create a request with the identity headers every request needs.
    /// The CSeq method is taken from `method`.
    pub fn new(
        method: Method,
        uri: SipUri,
        from: NameAddr,
        to: NameAddr,
        call_id: CallId,
        cseq: u32,
    ) -> Self {
        let cseq = CSeq::new(cseq, method.clone());
        Self {
            method,
            uri,
            via: Vec::new(),
            route: Vec::new(),
            from,
            to,
            call_id,
            cseq,
            contact: None,
            content_type: None,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Append a Via entry
    pub fn with_via(mut self, via: Via) -> Self {
        self.via.push(via);
        self
    }

    /// Append a Route entry
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route.push(route.into());
        self
    }

    /// Set the Contact header
    pub fn with_contact(mut self, contact: NameAddr) -> Self {
        self.contact = Some(contact);
        self
    }

    /// Set the Content-Type header
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Append an extension header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    /// Whether this request is an ACK
    pub fn is_ack(&self) -> bool {
        self.method.is_ack()
    }

    /// Whether this request is an INVITE
    pub fn is_invite(&self) -> bool {
        self.method == Method::Invite
    }

    /// Body interpreted as UTF-8, if possible
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

impl fmt::Display for SipRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} SIP/2.0\r\n", self.method, self.uri)?;
        for via in &self.via {
            write!(f, "Via: {}\r\n", via)?;
        }
        for route in &self.route {
            write!(f, "Route: {}\r\n", route)?;
        }
        write!(f, "From: {}\r\n", self.from)?;
        write!(f, "To: {}\r\n", self.to)?;
        write!(f, "Call-ID: {}\r\n", self.call_id)?;
        write!(f, "CSeq: {}\r\n", self.cseq)?;
        if let Some(contact) = &self.contact {
            write!(f, "Contact: {}\r\n", contact)?;
        }
        if let Some(content_type) = &self.content_type {
            write!(f, "Content-Type: {}\r\n", content_type)?;
        }
        for (name, value) in self.headers.iter() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        write!(f, "Content-Length: {}\r\n\r\n", self.body.len())?;
        if !self.body.is_empty() {
            // Body is written as UTF-8; binary payloads go through Bytes
            // accessors, not Display
            f.write_str(&String::from_utf8_lossy(&self.body))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SipRequest {
        SipRequest::new(
            Method::Invite,
            SipUri::new("bob", "biloxi.com"),
            NameAddr::new(SipUri::new("alice", "atlanta.com")).with_tag("1928301774"),
            NameAddr::new(SipUri::new("bob", "biloxi.com")),
            "a84b4c76e66710@10.0.0.1".into(),
            1,
        )
    }

    #[test]
    fn test_cseq_method_matches_request_method() {
        let req = request();
        assert_eq!(req.cseq.seq, 1);
        assert_eq!(req.cseq.method, Method::Invite);
    }

    #[test]
    fn test_serialized_shape() {
        let req = request()
            .with_via(Via::new("TCP", "10.0.0.1:5060").with_branch("z9hG4bKabc"))
            .with_content_type("application/sdp")
            .with_body("v=0\r\n");
        let wire = req.to_string();
        assert!(wire.starts_with("INVITE sip:bob@biloxi.com SIP/2.0\r\n"));
        assert!(wire.contains("Via: SIP/2.0/TCP 10.0.0.1:5060;branch=z9hG4bKabc\r\n"));
        assert!(wire.contains("From: <sip:alice@atlanta.com>;tag=1928301774\r\n"));
        assert!(wire.contains("Content-Length: 6\r\n\r\nv=0\r\n"));
    }

    #[test]
    fn test_empty_body_has_zero_length() {
        let wire = request().to_string();
        assert!(wire.ends_with("Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn test_route_entries_in_order() {
        let req = request()
            .with_route("<sip:proxy1.example.com;lr>")
            .with_route("<sip:proxy2.example.com;lr>");
        let wire = req.to_string();
        let first = wire.find("proxy1").unwrap();
        let second = wire.find("proxy2").unwrap();
        assert!(first < second);
    }
}
