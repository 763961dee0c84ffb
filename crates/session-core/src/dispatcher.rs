//! Inbound request routing.
//!
//! The dispatcher is the engine's listener on the SIP manager. A new INVITE
//! becomes a terminating session; BYE and CANCEL are routed to the session
//! owning their dialog. Anything the dispatcher does not claim falls back
//! to the manager, which declines it.

use std::net::SocketAddr;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use rims_dialog_core::{requests, DialogPath, SipRequestListener};
use rims_sip_core::sdp::parser::parse_sdp;
use rims_sip_core::types::{Method, SipRequest, StatusCode};

use crate::engine::EngineShared;
use crate::events::EngineEvent;
use crate::media::MediaOffer;
use crate::session::task::SessionStart;
use crate::session::{SessionCommand, SessionKind};

/// Routes inbound requests to sessions, spawning one for each new INVITE.
pub(crate) struct SessionDispatcher {
    shared: EngineShared,
}

impl SessionDispatcher {
    pub(crate) fn new(shared: EngineShared) -> Self {
        Self { shared }
    }

    async fn on_invite(&self, invite: SipRequest, source: SocketAddr) -> bool {
        if self.shared.cancel.is_cancelled() {
            self.decline(&invite, StatusCode::TemporarilyUnavailable, source)
                .await;
            return true;
        }
        if self
            .shared
            .registry
            .find_by_call_id(invite.call_id.as_str())
            .is_some()
        {
            // One session per dialog; re-INVITEs are not supported.
            debug!(call_id = %invite.call_id, "INVITE for an existing dialog");
            self.decline(&invite, StatusCode::BusyHere, source).await;
            return true;
        }

        let offer = match Self::offer_from(&invite) {
            Ok(offer) => offer,
            Err(reason) => {
                warn!(call_id = %invite.call_id, %reason, "rejecting INVITE");
                self.decline(&invite, StatusCode::NotAcceptableHere, source)
                    .await;
                return true;
            }
        };

        let kind = SessionKind::from_offer(&offer);
        let Some(handler) = self.shared.handlers.get(kind) else {
            warn!(%kind, "no handler registered; rejecting INVITE");
            self.decline(&invite, StatusCode::NotAcceptableHere, source)
                .await;
            return true;
        };

        let dialog = DialogPath::terminating(&invite, self.shared.config.local_via());
        let remote_party = invite.from.uri.to_string();
        info!(
            call_id = %invite.call_id,
            %kind,
            peer = %remote_party,
            "incoming session"
        );

        let session = self.shared.spawn_session(
            kind,
            remote_party,
            dialog,
            source,
            handler,
            SessionStart::Terminating { invite, offer },
        );
        let _ = self
            .shared
            .events
            .send(EngineEvent::IncomingSession { session });
        true
    }

    fn offer_from(invite: &SipRequest) -> Result<MediaOffer, String> {
        let body = invite
            .body_str()
            .ok_or_else(|| "offer body is not UTF-8".to_string())?;
        let sdp = parse_sdp(body).map_err(|e| e.to_string())?;
        MediaOffer::from_sdp(&sdp).map_err(|e| e.to_string())
    }

    async fn decline(&self, request: &SipRequest, status: StatusCode, source: SocketAddr) {
        let response = requests::error_response(request, status);
        if let Err(e) = self.shared.sip.send(response, source).await {
            warn!(error = %e, "could not decline request");
        }
    }
}

#[async_trait]
impl SipRequestListener for SessionDispatcher {
    async fn on_request(&self, request: SipRequest, source: SocketAddr) -> bool {
        match request.method {
            Method::Invite => self.on_invite(request, source).await,
            Method::Bye => {
                let Some(session) = self
                    .shared
                    .registry
                    .find_by_call_id(request.call_id.as_str())
                else {
                    return false;
                };
                debug!(session = %session.id(), "routing BYE");
                session
                    .route(SessionCommand::RemoteBye { request, source })
                    .await
            }
            Method::Cancel => {
                let Some(session) = self
                    .shared
                    .registry
                    .find_by_call_id(request.call_id.as_str())
                else {
                    return false;
                };
                debug!(session = %session.id(), "routing CANCEL");
                session
                    .route(SessionCommand::RemoteCancel { request, source })
                    .await
            }
            _ => false,
        }
    }
}
