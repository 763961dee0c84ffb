//! Transaction identification.
//!
//! A [`TransactionKey`] ties a request to the response (or ACK) that answers
//! it. The key is derived from the method, Call-ID, CSeq number and From-tag,
//! so it can be computed identically from either side of the exchange:
//! responses carry the original method in their CSeq header, and an ACK is
//! normalized to the INVITE it acknowledges so a server transaction waiting
//! for the ACK is matched.

use std::fmt;

use rims_sip_core::types::{Method, SipMessage, SipRequest, SipResponse};

/// Key identifying one pending transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    method: Method,
    call_id: String,
    cseq: u32,
    from_tag: Option<String>,
}

impl TransactionKey {
    /// Create a key. `Method::Ack` is normalized to `Method::Invite`.
    pub fn new(method: Method, call_id: &str, cseq: u32, from_tag: Option<&str>) -> Self {
        let method = if method == Method::Ack {
            Method::Invite
        } else {
            method
        };
        Self {
            method,
            call_id: call_id.to_string(),
            cseq,
            from_tag: from_tag.map(str::to_string),
        }
    }

    /// Derive the key for a request.
    pub fn from_request(request: &SipRequest) -> Self {
        Self::new(
            request.method.clone(),
            request.call_id.as_str(),
            request.cseq.seq,
            request.from.tag(),
        )
    }

    /// Derive the key for a response. The method comes from the CSeq header,
    /// which echoes the request's method.
    pub fn from_response(response: &SipResponse) -> Self {
        Self::new(
            response.cseq.method.clone(),
            response.call_id.as_str(),
            response.cseq.seq,
            response.from.tag(),
        )
    }

    /// Derive the key for either kind of message.
    pub fn from_message(message: &SipMessage) -> Self {
        match message {
            SipMessage::Request(request) => Self::from_request(request),
            SipMessage::Response(response) => Self::from_response(response),
        }
    }

    /// The (normalized) method this transaction was created for.
    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cseq={} call-id={} from-tag={}",
            self.method,
            self.cseq,
            self.call_id,
            self.from_tag.as_deref().unwrap_or("-")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rims_sip_core::types::{CSeq, CallId, NameAddr, SipUri, StatusCode};

    fn invite() -> SipRequest {
        SipRequest::new(
            Method::Invite,
            SipUri::new("bob", "example.com"),
            NameAddr::new(SipUri::new("alice", "example.com")).with_tag("a-tag"),
            NameAddr::new(SipUri::new("bob", "example.com")),
            CallId::from("key-test@example.com"),
            7,
        )
    }

    #[test]
    fn test_ack_normalizes_to_invite() {
        let invite = invite();
        let mut ack = invite.clone();
        ack.method = Method::Ack;
        ack.cseq = CSeq::new(7, Method::Ack);

        assert_eq!(
            TransactionKey::from_request(&ack),
            TransactionKey::from_request(&invite)
        );
        assert_eq!(
            *TransactionKey::from_request(&ack).method(),
            Method::Invite
        );
    }

    #[test]
    fn test_response_key_matches_request_key() {
        let invite = invite();
        let response = SipResponse::from_request(StatusCode::Ok, &invite);
        assert_eq!(
            TransactionKey::from_response(&response),
            TransactionKey::from_request(&invite)
        );
    }

    #[test]
    fn test_from_tag_distinguishes_transactions() {
        let a = TransactionKey::new(Method::Invite, "c1", 1, Some("tag-a"));
        let b = TransactionKey::new(Method::Invite, "c1", 1, Some("tag-b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_display() {
        let key = TransactionKey::new(Method::Bye, "c1@host", 3, Some("t"));
        assert_eq!(key.to_string(), "BYE cseq=3 call-id=c1@host from-tag=t");
    }
}
