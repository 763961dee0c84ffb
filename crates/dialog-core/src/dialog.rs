//! Dialog state.
//!
//! A [`DialogPath`] is the SIP-level identity of one session: Call-ID, the
//! two parties with their tags, the CSeq counter for locally built requests,
//! and the remote target in-dialog requests are routed to. It also keeps the
//! initial INVITE, which CANCEL construction needs verbatim.
//!
//! A dialog is owned by exactly one session task, so identity and
//! sequencing are plain mutable state with no interior locking. The
//! lifecycle flags are atomic latches instead: teardown paths that only
//! hold a shared borrow can still record them. The remote tag is learned
//! once and never overwritten: later writes with a different value are
//! ignored, which makes response retransmissions harmless.

use std::sync::atomic::{AtomicBool, Ordering};

use rims_sip_core::types::{CallId, NameAddr, SipRequest, SipResponse, SipUri};
use rims_sip_core::types::ids::{generate_call_id, generate_tag};
use tracing::debug;

/// SIP dialog identity and sequencing for one session.
#[derive(Debug)]
pub struct DialogPath {
    call_id: CallId,
    /// Local party, always tagged.
    local: NameAddr,
    /// Remote party; tag filled in once learned.
    remote: NameAddr,
    /// Where in-dialog requests are sent (peer Contact, or its URI).
    remote_target: SipUri,
    /// `sent-by` value for Via headers on locally built requests.
    local_via: String,
    route_set: Vec<String>,
    cseq: u32,
    invite_cseq: Option<u32>,
    invite: Option<SipRequest>,
    /// Committed session descriptions, ours and the peer's.
    local_sdp: Option<String>,
    remote_sdp: Option<String>,
    // Lifecycle latches: set once, never cleared.
    signaling_established: AtomicBool,
    session_established: AtomicBool,
    cancelled: AtomicBool,
    terminated: AtomicBool,
}

impl DialogPath {
    /// Create the dialog for a session we originate.
    ///
    /// Generates the Call-ID and the local tag; the remote tag arrives with
    /// the first response.
    pub fn originating(local: NameAddr, remote: NameAddr, local_via: impl Into<String>) -> Self {
        let local_via = local_via.into();
        let host = local_via
            .split_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&local_via);
        let remote_target = remote.uri.clone();
        Self {
            call_id: CallId::new(generate_call_id(host)),
            local: local.with_tag(generate_tag()),
            remote,
            remote_target,
            local_via,
            route_set: Vec::new(),
            cseq: 1,
            invite_cseq: None,
            invite: None,
            local_sdp: None,
            remote_sdp: None,
            signaling_established: AtomicBool::new(false),
            session_established: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
        }
    }

    /// Create the dialog for a session the peer originated, from its INVITE.
    ///
    /// The peer's From becomes our remote party; its To becomes our local
    /// party, tagged here if the peer left it untagged. The remote target is
    /// the INVITE's Contact when present, otherwise its From URI.
    pub fn terminating(invite: &SipRequest, local_via: impl Into<String>) -> Self {
        let local = if invite.to.tag().is_some() {
            invite.to.clone()
        } else {
            invite.to.clone().with_tag(generate_tag())
        };
        let remote_target = invite
            .contact
            .as_ref()
            .map(|contact| contact.uri.clone())
            .unwrap_or_else(|| invite.from.uri.clone());
        Self {
            call_id: invite.call_id.clone(),
            local,
            remote: invite.from.clone(),
            remote_target,
            local_via: local_via.into(),
            route_set: invite.route.clone(),
            cseq: 1,
            invite_cseq: Some(invite.cseq.seq),
            invite: Some(invite.clone()),
            local_sdp: None,
            remote_sdp: None,
            signaling_established: AtomicBool::new(false),
            session_established: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
        }
    }

    /// Call-ID shared by everything in this dialog.
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    /// Local party, including its tag.
    pub fn local(&self) -> &NameAddr {
        &self.local
    }

    /// Remote party; carries the remote tag once learned.
    pub fn remote(&self) -> &NameAddr {
        &self.remote
    }

    /// Our tag.
    pub fn local_tag(&self) -> Option<&str> {
        self.local.tag()
    }

    /// The peer's tag, if learned.
    pub fn remote_tag(&self) -> Option<&str> {
        self.remote.tag()
    }

    /// Learn the remote tag. First write wins; later writes with a
    /// different value are ignored.
    pub fn set_remote_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        match self.remote.tag() {
            None => self.remote.set_tag(tag),
            Some(existing) if existing != tag => {
                debug!(existing, ignored = %tag, "remote tag already set, ignoring");
            }
            Some(_) => {}
        }
    }

    /// Where in-dialog requests are routed.
    pub fn remote_target(&self) -> &SipUri {
        &self.remote_target
    }

    /// Update the remote target (e.g. from a 2xx Contact).
    pub fn set_remote_target(&mut self, target: SipUri) {
        self.remote_target = target;
    }

    /// `sent-by` value for Via headers.
    pub fn local_via(&self) -> &str {
        &self.local_via
    }

    /// Route set for in-dialog requests.
    pub fn route_set(&self) -> &[String] {
        &self.route_set
    }

    /// Replace the route set.
    pub fn set_route_set(&mut self, routes: Vec<String>) {
        self.route_set = routes;
    }

    /// The local session description committed to this dialog, if any.
    pub fn local_sdp(&self) -> Option<&str> {
        self.local_sdp.as_deref()
    }

    /// Commit the local session description (our offer or answer).
    pub fn set_local_sdp(&mut self, sdp: impl Into<String>) {
        self.local_sdp = Some(sdp.into());
    }

    /// The remote session description committed to this dialog, if any.
    pub fn remote_sdp(&self) -> Option<&str> {
        self.remote_sdp.as_deref()
    }

    /// Commit the peer's session description.
    pub fn set_remote_sdp(&mut self, sdp: impl Into<String>) {
        self.remote_sdp = Some(sdp.into());
    }

    /// Next CSeq number for a locally built request.
    pub fn next_cseq(&mut self) -> u32 {
        let seq = self.cseq;
        self.cseq += 1;
        seq
    }

    /// CSeq number the INVITE used, if one was sent or received.
    pub fn invite_cseq(&self) -> Option<u32> {
        self.invite_cseq
    }

    /// The initial INVITE of this dialog, if recorded.
    pub fn initial_invite(&self) -> Option<&SipRequest> {
        self.invite.as_ref()
    }

    /// Record the initial INVITE and its CSeq number.
    pub fn set_initial_invite(&mut self, invite: SipRequest) {
        self.invite_cseq = Some(invite.cseq.seq);
        self.invite = Some(invite);
    }

    /// Record that signaling is established: a provisional has been
    /// exchanged and our description committed. Latches; marking again is
    /// a no-op, as for the other three lifecycle flags.
    pub fn mark_signaling_established(&self) {
        self.signaling_established.store(true, Ordering::Relaxed);
    }

    pub fn is_signaling_established(&self) -> bool {
        self.signaling_established.load(Ordering::Relaxed)
    }

    /// Record that the final response was acknowledged.
    pub fn mark_session_established(&self) {
        self.session_established.store(true, Ordering::Relaxed);
    }

    pub fn is_session_established(&self) -> bool {
        self.session_established.load(Ordering::Relaxed)
    }

    /// Record that the session was called off before establishment.
    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Record that an explicit close was sent or received.
    pub fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::Relaxed);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Relaxed)
    }

    /// Absorb dialog-forming data from a response: the remote tag from its
    /// To header and, when present, the remote target from its Contact.
    pub fn apply_response(&mut self, response: &SipResponse) {
        if let Some(tag) = response.to.tag() {
            self.set_remote_tag(tag.to_string());
        }
        if let Some(contact) = &response.contact {
            self.remote_target = contact.uri.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rims_sip_core::types::{Method, StatusCode};

    fn parties() -> (NameAddr, NameAddr) {
        (
            NameAddr::new(SipUri::new("alice", "10.0.0.1")),
            NameAddr::new(SipUri::new("bob", "10.0.0.2")),
        )
    }

    #[test]
    fn test_originating_dialog() {
        let (local, remote) = parties();
        let mut dialog = DialogPath::originating(local, remote, "10.0.0.1:5060");

        assert!(dialog.local_tag().is_some());
        assert!(dialog.remote_tag().is_none());
        assert!(dialog.call_id().as_str().ends_with("@10.0.0.1"));
        assert_eq!(dialog.next_cseq(), 1);
        assert_eq!(dialog.next_cseq(), 2);
    }

    #[test]
    fn test_remote_tag_first_write_wins() {
        let (local, remote) = parties();
        let mut dialog = DialogPath::originating(local, remote, "10.0.0.1:5060");

        dialog.set_remote_tag("b-one");
        dialog.set_remote_tag("b-two");
        assert_eq!(dialog.remote_tag(), Some("b-one"));

        // Re-asserting the same value is fine.
        dialog.set_remote_tag("b-one");
        assert_eq!(dialog.remote_tag(), Some("b-one"));
    }

    #[test]
    fn test_terminating_dialog_from_invite() {
        let (alice, bob) = parties();
        let invite = SipRequest::new(
            Method::Invite,
            SipUri::new("bob", "10.0.0.2"),
            alice.with_tag("a-tag"),
            bob,
            CallId::from("dlg@10.0.0.1"),
            4,
        )
        .with_contact(NameAddr::new(SipUri::new("alice", "10.0.0.1").with_port(5062)));

        let dialog = DialogPath::terminating(&invite, "10.0.0.2:5060");

        assert_eq!(dialog.remote_tag(), Some("a-tag"));
        assert!(dialog.local_tag().is_some());
        assert_eq!(dialog.call_id().as_str(), "dlg@10.0.0.1");
        assert_eq!(dialog.invite_cseq(), Some(4));
        assert_eq!(dialog.remote_target().port, Some(5062));
        assert!(dialog.initial_invite().is_some());
    }

    #[test]
    fn test_lifecycle_flags_latch() {
        let (local, remote) = parties();
        let dialog = DialogPath::originating(local, remote, "10.0.0.1:5060");

        assert!(!dialog.is_signaling_established());
        assert!(!dialog.is_session_established());
        assert!(!dialog.is_cancelled());
        assert!(!dialog.is_terminated());

        dialog.mark_signaling_established();
        dialog.mark_signaling_established();
        assert!(dialog.is_signaling_established());

        dialog.mark_session_established();
        dialog.mark_terminated();
        dialog.mark_terminated();
        assert!(dialog.is_session_established());
        assert!(dialog.is_terminated());
        assert!(!dialog.is_cancelled());
    }

    #[test]
    fn test_committed_descriptions() {
        let (local, remote) = parties();
        let mut dialog = DialogPath::originating(local, remote, "10.0.0.1:5060");

        assert!(dialog.local_sdp().is_none());
        assert!(dialog.remote_sdp().is_none());

        dialog.set_local_sdp("v=0\r\ns=offer\r\n");
        dialog.set_remote_sdp("v=0\r\ns=answer\r\n");
        assert_eq!(dialog.local_sdp(), Some("v=0\r\ns=offer\r\n"));
        assert_eq!(dialog.remote_sdp(), Some("v=0\r\ns=answer\r\n"));
    }

    #[test]
    fn test_apply_response() {
        let (local, remote) = parties();
        let mut dialog = DialogPath::originating(local, remote, "10.0.0.1:5060");
        let invite = SipRequest::new(
            Method::Invite,
            dialog.remote().uri.clone(),
            dialog.local().clone(),
            dialog.remote().clone(),
            dialog.call_id().clone(),
            1,
        );

        let response = SipResponse::from_request(StatusCode::Ok, &invite)
            .with_to_tag("b-tag")
            .with_contact(NameAddr::new(SipUri::new("bob", "10.0.0.2").with_port(5070)));
        dialog.apply_response(&response);

        assert_eq!(dialog.remote_tag(), Some("b-tag"));
        assert_eq!(dialog.remote_target().port, Some(5070));
    }
}
