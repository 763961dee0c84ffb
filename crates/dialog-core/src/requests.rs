//! Request and response factories.
//!
//! Everything the engine sends is built here from a [`DialogPath`], so CSeq
//! sequencing, tags and Via branches stay consistent. CANCEL is the one
//! special case: it must replay the INVITE's Via branch and CSeq number to
//! match the transaction it cancels, which is why the dialog keeps the
//! initial INVITE around.

use bytes::Bytes;

use rims_sip_core::types::ids::{generate_branch, generate_tag};
use rims_sip_core::types::{Method, NameAddr, SipRequest, SipResponse, StatusCode, Via};

use crate::dialog::DialogPath;
use crate::error::{DialogError, Result};

/// Transport token used in Via headers. The engine signals over a
/// connection-oriented transport.
const VIA_TRANSPORT: &str = "TCP";

fn local_via(dialog: &DialogPath) -> Via {
    Via::new(VIA_TRANSPORT, dialog.local_via()).with_branch(generate_branch())
}

/// Build the INVITE opening a session, with an SDP offer as its body.
///
/// Advances the dialog's CSeq and records the request as the dialog's
/// initial INVITE.
pub fn invite(
    dialog: &mut DialogPath,
    contact: NameAddr,
    content_type: &str,
    body: impl Into<Bytes>,
) -> SipRequest {
    let cseq = dialog.next_cseq();
    let mut request = SipRequest::new(
        Method::Invite,
        dialog.remote_target().clone(),
        dialog.local().clone(),
        dialog.remote().clone(),
        dialog.call_id().clone(),
        cseq,
    )
    .with_via(local_via(dialog))
    .with_contact(contact)
    .with_content_type(content_type)
    .with_body(body);

    for route in dialog.route_set() {
        request = request.with_route(route.clone());
    }

    dialog.set_initial_invite(request.clone());
    request
}

/// Build a 180 Ringing for a received INVITE, carrying our dialog tag.
pub fn ringing(dialog: &DialogPath, invite: &SipRequest) -> SipResponse {
    let response = SipResponse::from_request(StatusCode::Ringing, invite);
    match dialog.local_tag() {
        Some(tag) => response.with_to_tag(tag),
        None => response,
    }
}

/// Build a 200 OK with a body (typically the SDP answer) for a received
/// request.
pub fn ok_with_body(
    dialog: &DialogPath,
    request: &SipRequest,
    contact: NameAddr,
    content_type: &str,
    body: impl Into<Bytes>,
) -> SipResponse {
    let response = SipResponse::from_request(StatusCode::Ok, request)
        .with_contact(contact)
        .with_content_type(content_type)
        .with_body(body);
    match dialog.local_tag() {
        Some(tag) => response.with_to_tag(tag),
        None => response,
    }
}

/// Build a bodiless 200 OK for a received request (BYE, CANCEL, OPTIONS).
pub fn ok(dialog: &DialogPath, request: &SipRequest) -> SipResponse {
    let response = SipResponse::from_request(StatusCode::Ok, request);
    match dialog.local_tag() {
        Some(tag) if request.to.tag().is_none() => response.with_to_tag(tag),
        _ => response,
    }
}

/// Build the ACK for a 2xx response to our INVITE.
///
/// Uses the INVITE's CSeq number with method ACK and a fresh Via branch, per
/// the 2xx ACK rules. Call [`DialogPath::apply_response`] first so the
/// remote tag and target are in place.
pub fn ack(dialog: &DialogPath, response: &SipResponse) -> Result<SipRequest> {
    let cseq = dialog
        .invite_cseq()
        .ok_or_else(|| DialogError::internal("cannot ACK: dialog has no INVITE"))?;
    Ok(SipRequest::new(
        Method::Ack,
        dialog.remote_target().clone(),
        response.from.clone(),
        response.to.clone(),
        dialog.call_id().clone(),
        cseq,
    )
    .with_via(local_via(dialog)))
}

/// Build a CANCEL for our pending INVITE.
///
/// CANCEL replays the INVITE's Via branch, CSeq number and untagged To so it
/// matches the INVITE transaction at the peer.
pub fn cancel(dialog: &DialogPath) -> Result<SipRequest> {
    let invite = dialog
        .initial_invite()
        .ok_or_else(|| DialogError::internal("cannot CANCEL: dialog has no INVITE"))?;

    let mut request = SipRequest::new(
        Method::Cancel,
        invite.uri.clone(),
        invite.from.clone(),
        invite.to.clone(),
        invite.call_id.clone(),
        invite.cseq.seq,
    );
    for via in &invite.via {
        request = request.with_via(via.clone());
    }
    for route in &invite.route {
        request = request.with_route(route.clone());
    }
    Ok(request)
}

/// Build a BYE terminating the dialog. Advances the dialog's CSeq.
pub fn bye(dialog: &mut DialogPath) -> SipRequest {
    let cseq = dialog.next_cseq();
    SipRequest::new(
        Method::Bye,
        dialog.remote_target().clone(),
        dialog.local().clone(),
        dialog.remote().clone(),
        dialog.call_id().clone(),
        cseq,
    )
    .with_via(local_via(dialog))
}

/// Build an error response for a request, tagging the To header if the
/// request left it untagged.
pub fn error_response(request: &SipRequest, status: StatusCode) -> SipResponse {
    let response = SipResponse::from_request(status, request);
    if request.to.tag().is_none() {
        response.with_to_tag(generate_tag())
    } else {
        response
    }
}
