//! # SIP Response Message
//!
//! Responses echo the identity headers of the request they answer; the
//! usual way to build one is [`SipResponse::from_request`], which copies
//! Via/From/To/Call-ID/CSeq the way a user agent server must.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::address::NameAddr;
use crate::types::headers::{CSeq, CallId, Headers, Via};
use crate::types::request::SipRequest;
use crate::types::status::StatusCode;

/// A SIP response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipResponse {
    /// Status code
    pub status: StatusCode,
    /// Reason phrase as sent on the wire
    pub reason: String,
    /// Via entries copied from the request, topmost first
    pub via: Vec<Via>,
    /// From header, echoed from the request
    pub from: NameAddr,
    /// To header; gains the local tag on dialog-forming responses
    pub to: NameAddr,
    /// Call-ID header
    pub call_id: CallId,
    /// CSeq header, echoed from the request
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

impl SipResponse {
    /// Build a response answering `request`, echoing its identity headers
    pub fn from_request(status: StatusCode, request: &SipRequest) -> Self {
        Self {
            status,
            reason: status.reason_phrase().to_string(),
            via: request.via.clone(),
            from: request.from.clone(),
            to: request.to.clone(),
            call_id: request.call_id.clone(),
            cseq: request.cseq.clone(),
            contact: None,
            content_type: None,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Set the To tag (dialog-forming responses carry the local tag)
    pub fn with_to_tag(mut self, tag: impl Into<String>) -> Self {
        self.to.set_tag(tag);
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

    /// `1xx`
    pub fn is_provisional(&self) -> bool {
        self.status.is_provisional()
    }

    /// `>= 200`
    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }

    /// `2xx`
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body interpreted as UTF-8, if possible
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

impl fmt::Display for SipResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0 {} {}\r\n", self.status.as_u16(), self.reason)?;
        for via in &self.via {
            write!(f, "Via: {}\r\n", via)?;
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
            f.write_str(&String::from_utf8_lossy(&self.body))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::method::Method;
    use crate::types::uri::SipUri;

    fn invite() -> SipRequest {
        SipRequest::new(
            Method::Invite,
            SipUri::new("bob", "biloxi.com"),
            NameAddr::new(SipUri::new("alice", "atlanta.com")).with_tag("1928301774"),
            NameAddr::new(SipUri::new("bob", "biloxi.com")),
            "a84b4c76e66710@10.0.0.1".into(),
            7,
        )
        .with_via(Via::new("TCP", "10.0.0.1:5060").with_branch("z9hG4bKabc"))
    }

    #[test]
    fn test_from_request_echoes_identity() {
        let req = invite();
        let resp = SipResponse::from_request(StatusCode::Ok, &req);
        assert_eq!(resp.call_id, req.call_id);
        assert_eq!(resp.cseq, req.cseq);
        assert_eq!(resp.from.tag(), Some("1928301774"));
        assert_eq!(resp.to.tag(), None);
        assert_eq!(resp.via, req.via);
        assert_eq!(resp.reason, "OK");
    }

    #[test]
    fn test_to_tag_applied() {
        let resp = SipResponse::from_request(StatusCode::Ok, &invite()).with_to_tag("314159");
        assert_eq!(resp.to.tag(), Some("314159"));
    }

    #[test]
    fn test_serialized_status_line() {
        let resp = SipResponse::from_request(StatusCode::Ringing, &invite());
        assert!(resp.to_string().starts_with("SIP/2.0 180 Ringing\r\n"));
        assert!(resp.is_provisional());
        assert!(!resp.is_final());
    }
}
