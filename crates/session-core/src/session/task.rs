//! The per-session task.
//!
//! One task owns everything mutable about a session: the dialog, the media
//! connection and the state machine. The handle and the dispatcher only
//! ever talk to it through its command channel, so there is no locking
//! anywhere on the session path; a session is a sequential program.
//!
//! Both flavors of session converge on [`SessionTask::run_established`]
//! once signaling and media are up, and every exit path funnels through
//! [`SessionTask::finish`], which is the only place a session leaves the
//! registry. Terminal states absorb all further transitions, which is what
//! makes the end notification one-shot.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rims_dialog_core::{requests, DialogPath, SipManager, TransactionHandle, TransactionOutcome};
use rims_msrp_core::{MsrpManager, MsrpRole, MsrpSession};
use rims_sip_core::sdp::parser::parse_sdp;
use rims_sip_core::sdp::SdpSession;
use rims_sip_core::types::{SipRequest, SipResponse, StatusCode};

use crate::activity::ActivityMonitor;
use crate::chat::cpim::{DISPOSITION_DISPLAY, DISPOSITION_POSITIVE_DELIVERY};
use crate::chat::{CpimMessage, CPIM_CONTENT_TYPE};
use crate::config::EngineConfig;
use crate::delivery::MessageLog;
use crate::error::{Result, SessionError, SessionErrorKind};
use crate::events::{EndReason, EngineEvent, SessionEvent};
use crate::handlers::SessionHandler;
use crate::media::{self, LocalMedia, MediaOffer, NegotiatedMedia};
use crate::registry::SessionRegistry;
use crate::session::{SessionCommand, SessionContext, SessionId, SessionKind};
use crate::state::SessionState;

/// How long teardown signaling waits for its answer before giving up.
const TEARDOWN_WAIT: Duration = Duration::from_secs(5);

/// How a session task begins.
pub(crate) enum SessionStart {
    /// We send the INVITE.
    Originating,
    /// We received `invite` carrying `offer`.
    Terminating {
        invite: SipRequest,
        offer: MediaOffer,
    },
}

/// Why the session is over.
enum Outcome {
    Ended(EndReason),
    Failed(SessionError),
}

/// What is left to clean up when a flow exits.
struct Teardown {
    outcome: Outcome,
    media: Option<MsrpSession>,
    ctx: Option<SessionContext>,
}

impl Teardown {
    /// An exit before media ever opened.
    fn signaling(outcome: Outcome) -> Self {
        Self {
            outcome,
            media: None,
            ctx: None,
        }
    }
}

/// Everything a running session owns.
pub(crate) struct SessionTask {
    pub(crate) id: SessionId,
    pub(crate) kind: SessionKind,
    pub(crate) remote_party: String,
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) sip: Arc<SipManager>,
    pub(crate) msrp: MsrpManager,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) log: Arc<dyn MessageLog>,
    pub(crate) handler: Arc<dyn SessionHandler>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
    pub(crate) engine_events: broadcast::Sender<EngineEvent>,
    pub(crate) state: watch::Sender<SessionState>,
    pub(crate) commands: mpsc::Receiver<SessionCommand>,
    pub(crate) cancel: CancellationToken,
    pub(crate) dialog: DialogPath,
    /// Where this session's signaling goes.
    pub(crate) peer: SocketAddr,
}

impl SessionTask {
    pub(crate) async fn run(mut self, start: SessionStart) {
        info!(
            session = %self.id,
            kind = %self.kind,
            peer = %self.remote_party,
            "session starting"
        );
        let teardown = match start {
            SessionStart::Originating => self.originate().await,
            SessionStart::Terminating { invite, offer } => self.answer(invite, offer).await,
        };
        self.finish(teardown).await;
    }

    // ---- originating flow ------------------------------------------------

    async fn originate(&mut self) -> Teardown {
        let local_media = self.local_media();
        let offer = media::build_offer(&local_media, self.config.setup_offer).to_string();
        self.dialog.set_local_sdp(offer.clone());

        let invite = requests::invite(
            &mut self.dialog,
            self.config.contact(),
            "application/sdp",
            offer,
        );
        let handle = match self.sip.send_with_context(invite, self.peer).await {
            Ok(handle) => handle,
            Err(e) => {
                return Teardown::signaling(Outcome::Failed(SessionError::initiation(
                    e.to_string(),
                )))
            }
        };

        let wait = handle.wait(self.config.manager.transaction_timeout);
        tokio::pin!(wait);
        let outcome = loop {
            tokio::select! {
                outcome = &mut wait => break outcome,
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Terminate) | None => {
                        return self.cancel_invite(wait).await;
                    }
                    Some(command) => {
                        warn!(session = %self.id, ?command, "dropping command before establishment");
                    }
                },
                _ = self.cancel.cancelled() => {
                    return self.cancel_invite(wait).await;
                }
            }
        };

        let response = match outcome {
            TransactionOutcome::Response(response) => response,
            TransactionOutcome::Timeout => {
                return Teardown::signaling(Outcome::Failed(SessionError::timeout(
                    "no answer to INVITE",
                )))
            }
            TransactionOutcome::Ack(_) => {
                return Teardown::signaling(Outcome::Failed(SessionError::unexpected(
                    "ACK completed an INVITE transaction",
                )))
            }
        };

        if !response.is_success() {
            debug!(session = %self.id, status = %response.status, "invite rejected");
            self.dialog.apply_response(&response);
            if let Ok(ack) = requests::ack(&self.dialog, &response) {
                let _ = self.sip.send(ack, self.peer).await;
            }
            return Teardown::signaling(Outcome::Failed(SessionError::initiation(format!(
                "invite rejected: {}",
                response.status
            ))));
        }

        // 200 OK: acknowledge, then digest the answer.
        self.dialog.apply_response(&response);
        let ack = match requests::ack(&self.dialog, &response) {
            Ok(ack) => ack,
            Err(e) => {
                return Teardown::signaling(Outcome::Failed(SessionError::unexpected(
                    e.to_string(),
                )))
            }
        };
        if let Err(e) = self.sip.send(ack, self.peer).await {
            return Teardown::signaling(Outcome::Failed(SessionError::initiation(e.to_string())));
        }
        self.dialog.mark_signaling_established();
        self.transition(SessionState::SignalingEstablished);

        let negotiated = match self.digest_answer(&response, &local_media) {
            Ok(negotiated) => negotiated,
            Err(e) => {
                warn!(session = %self.id, error = %e, "unusable answer");
                self.send_bye().await;
                return Teardown::signaling(Outcome::Failed(e));
            }
        };
        self.dialog
            .set_remote_sdp(String::from_utf8_lossy(&response.body).into_owned());

        self.open_media_and_run(negotiated).await
    }

    /// Abort a pending INVITE with a CANCEL.
    ///
    /// The INVITE transaction still completes, normally with a 487. If our
    /// CANCEL lost the race to the peer's 200, close the young dialog with
    /// an ACK and a BYE instead of leaving it half-open.
    async fn cancel_invite<F>(&mut self, wait: F) -> Teardown
    where
        F: Future<Output = TransactionOutcome>,
    {
        info!(session = %self.id, "cancelling pending invite");
        match requests::cancel(&self.dialog) {
            Ok(cancel) => {
                if let Err(e) = self.sip.send(cancel, self.peer).await {
                    warn!(session = %self.id, error = %e, "could not send CANCEL");
                }
            }
            Err(e) => warn!(session = %self.id, error = %e, "could not build CANCEL"),
        }

        if let Ok(TransactionOutcome::Response(response)) =
            tokio::time::timeout(TEARDOWN_WAIT, wait).await
        {
            if response.is_success() {
                self.dialog.apply_response(&response);
                if let Ok(ack) = requests::ack(&self.dialog, &response) {
                    let _ = self.sip.send(ack, self.peer).await;
                }
                self.send_bye().await;
            }
        }
        Teardown::signaling(Outcome::Ended(EndReason::Cancelled))
    }

    fn digest_answer(
        &self,
        response: &SipResponse,
        local_media: &LocalMedia,
    ) -> Result<NegotiatedMedia> {
        let body = response
            .body_str()
            .ok_or_else(|| SessionError::negotiation("answer body is not UTF-8"))?;
        let sdp = parse_sdp(body)
            .map_err(|e| SessionError::negotiation(format!("unparseable answer: {e}")))?;
        let answer = MediaOffer::from_sdp(&sdp)?;
        Ok(media::apply_answer(&answer, local_media))
    }

    // ---- terminating flow ------------------------------------------------

    async fn answer(&mut self, invite: SipRequest, offer: MediaOffer) -> Teardown {
        // Alert immediately; the answer follows after the configured delay.
        let ringing = requests::ringing(&self.dialog, &invite);
        if let Err(e) = self.sip.send(ringing, self.peer).await {
            return Teardown::signaling(Outcome::Failed(SessionError::initiation(e.to_string())));
        }

        if let Some(teardown) = self.alerting_window(&invite).await {
            return teardown;
        }

        let local_media = self.local_media();
        let (answer_sdp, negotiated) = match media::build_answer(&offer, &local_media) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(session = %self.id, error = %e, "cannot answer offer");
                self.reject(&invite, StatusCode::NotAcceptableHere).await;
                return Teardown::signaling(Outcome::Failed(e));
            }
        };
        self.dialog
            .set_remote_sdp(String::from_utf8_lossy(&invite.body).into_owned());
        self.dialog.set_local_sdp(answer_sdp.to_string());
        self.dialog.mark_signaling_established();

        match negotiated.endpoint.role {
            MsrpRole::Active => self.answer_active(invite, answer_sdp, negotiated).await,
            MsrpRole::Passive => self.answer_passive(invite, answer_sdp, negotiated).await,
        }
    }

    /// Wait out the answer delay. `Some` means the session is over before
    /// we ever answered.
    async fn alerting_window(&mut self, invite: &SipRequest) -> Option<Teardown> {
        let delay = tokio::time::sleep(self.config.answer_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => return None,
                command = self.commands.recv() => match command {
                    Some(SessionCommand::RemoteCancel { request, source }) => {
                        return Some(self.cancelled_by_peer(invite, &request, source).await);
                    }
                    Some(SessionCommand::Terminate) | None => {
                        info!(session = %self.id, "declining incoming session");
                        self.reject(invite, StatusCode::BusyHere).await;
                        return Some(Teardown::signaling(Outcome::Ended(EndReason::Cancelled)));
                    }
                    Some(command) => {
                        warn!(session = %self.id, ?command, "dropping command before establishment");
                    }
                },
                _ = self.cancel.cancelled() => {
                    self.reject(invite, StatusCode::TemporarilyUnavailable).await;
                    return Some(Teardown::signaling(Outcome::Ended(EndReason::Cancelled)));
                }
            }
        }
    }

    async fn cancelled_by_peer(
        &self,
        invite: &SipRequest,
        cancel: &SipRequest,
        source: SocketAddr,
    ) -> Teardown {
        info!(session = %self.id, "peer cancelled before answer");
        let ok = requests::ok(&self.dialog, cancel);
        if let Err(e) = self.sip.send(ok, source).await {
            warn!(session = %self.id, error = %e, "could not answer CANCEL");
        }
        self.reject(invite, StatusCode::RequestTerminated).await;
        Teardown::signaling(Outcome::Ended(EndReason::Cancelled))
    }

    /// Passive answer: say 200, wait for the ACK, then listen for the peer.
    async fn answer_passive(
        &mut self,
        invite: SipRequest,
        answer: SdpSession,
        negotiated: NegotiatedMedia,
    ) -> Teardown {
        let ok = requests::ok_with_body(
            &self.dialog,
            &invite,
            self.config.contact(),
            "application/sdp",
            answer.to_string(),
        );
        let handle = match self.sip.send_with_context(ok, self.peer).await {
            Ok(handle) => handle,
            Err(e) => {
                return Teardown::signaling(Outcome::Failed(SessionError::initiation(
                    e.to_string(),
                )))
            }
        };
        if let Some(teardown) = self.await_ack(handle).await {
            return teardown;
        }
        self.transition(SessionState::SignalingEstablished);
        self.open_media_and_run(negotiated).await
    }

    /// Active answer: media comes up before the 200 goes out.
    async fn answer_active(
        &mut self,
        invite: SipRequest,
        answer: SdpSession,
        negotiated: NegotiatedMedia,
    ) -> Teardown {
        let opened = {
            let open = self.msrp.open(&negotiated.endpoint, &self.cancel);
            tokio::pin!(open);
            loop {
                tokio::select! {
                    result = &mut open => break result,
                    command = self.commands.recv() => match command {
                        Some(SessionCommand::RemoteCancel { request, source }) => {
                            return self.cancelled_by_peer(&invite, &request, source).await;
                        }
                        Some(SessionCommand::Terminate) | None => {
                            self.cancel.cancel();
                        }
                        Some(command) => {
                            warn!(session = %self.id, ?command, "dropping command before establishment");
                        }
                    },
                }
            }
        };
        let media = match opened {
            Ok(media) => media,
            Err(e) => {
                let error = SessionError::from(e);
                if error.kind == SessionErrorKind::Cancelled {
                    self.reject(&invite, StatusCode::TemporarilyUnavailable).await;
                    return Teardown::signaling(Outcome::Ended(EndReason::Cancelled));
                }
                warn!(session = %self.id, error = %error, "could not open media");
                self.reject(&invite, StatusCode::NotAcceptableHere).await;
                return Teardown::signaling(Outcome::Failed(error));
            }
        };
        self.transition(SessionState::MediaOpen);

        let ok = requests::ok_with_body(
            &self.dialog,
            &invite,
            self.config.contact(),
            "application/sdp",
            answer.to_string(),
        );
        let handle = match self.sip.send_with_context(ok, self.peer).await {
            Ok(handle) => handle,
            Err(e) => {
                return Teardown {
                    outcome: Outcome::Failed(SessionError::initiation(e.to_string())),
                    media: Some(media),
                    ctx: None,
                }
            }
        };
        if let Some(mut teardown) = self.await_ack(handle).await {
            teardown.media = Some(media);
            return teardown;
        }
        self.run_established(media, negotiated).await
    }

    /// Wait for the ACK that answers our 200. `None` means it arrived.
    async fn await_ack(&mut self, handle: TransactionHandle) -> Option<Teardown> {
        let wait = handle.wait(self.config.manager.transaction_timeout);
        tokio::pin!(wait);
        loop {
            tokio::select! {
                outcome = &mut wait => match outcome {
                    TransactionOutcome::Ack(_) => return None,
                    TransactionOutcome::Timeout => {
                        warn!(session = %self.id, "no ACK for our answer");
                        self.send_bye().await;
                        return Some(Teardown::signaling(Outcome::Failed(
                            SessionError::timeout("no ACK for our answer"),
                        )));
                    }
                    TransactionOutcome::Response(_) => {
                        return Some(Teardown::signaling(Outcome::Failed(
                            SessionError::unexpected("response completed an ACK wait"),
                        )));
                    }
                },
                command = self.commands.recv() => match command {
                    Some(SessionCommand::RemoteCancel { request, source }) => {
                        // Crossed with our answer; acknowledge and keep waiting.
                        debug!(session = %self.id, "CANCEL crossed our answer");
                        let ok = requests::ok(&self.dialog, &request);
                        let _ = self.sip.send(ok, source).await;
                    }
                    Some(SessionCommand::RemoteBye { request, source }) => {
                        self.answer_bye(&request, source).await;
                        return Some(Teardown::signaling(Outcome::Failed(
                            SessionError::terminated_by_remote("BYE before session established"),
                        )));
                    }
                    Some(SessionCommand::Terminate) | None => {
                        self.send_bye().await;
                        return Some(Teardown::signaling(Outcome::Ended(EndReason::Cancelled)));
                    }
                    Some(command) => {
                        warn!(session = %self.id, ?command, "dropping command before establishment");
                    }
                },
                _ = self.cancel.cancelled() => {
                    self.send_bye().await;
                    return Some(Teardown::signaling(Outcome::Ended(EndReason::Cancelled)));
                }
            }
        }
    }

    // ---- shared establishment and steady state ---------------------------

    /// Open media per the negotiated roles, then run the session.
    async fn open_media_and_run(&mut self, negotiated: NegotiatedMedia) -> Teardown {
        let mut remote_bye = false;
        let opened = {
            let open = self.msrp.open(&negotiated.endpoint, &self.cancel);
            tokio::pin!(open);
            loop {
                tokio::select! {
                    result = &mut open => break result,
                    command = self.commands.recv() => match command {
                        Some(SessionCommand::Terminate) | None => {
                            debug!(session = %self.id, "terminate requested while opening media");
                            self.cancel.cancel();
                        }
                        Some(SessionCommand::RemoteBye { request, source }) => {
                            self.answer_bye(&request, source).await;
                            remote_bye = true;
                            self.cancel.cancel();
                        }
                        Some(command) => {
                            warn!(session = %self.id, ?command, "dropping command before establishment");
                        }
                    },
                }
            }
        };
        match opened {
            Ok(media) => self.run_established(media, negotiated).await,
            Err(e) => {
                let error = SessionError::from(e);
                if remote_bye {
                    return Teardown::signaling(Outcome::Ended(EndReason::RemoteBye));
                }
                self.send_bye().await;
                Teardown::signaling(match error.kind {
                    // Abort before establishment is a cancel, even though the
                    // confirmed dialog still needs its BYE.
                    SessionErrorKind::Cancelled => Outcome::Ended(EndReason::Cancelled),
                    _ => Outcome::Failed(error),
                })
            }
        }
    }

    async fn run_established(
        &mut self,
        mut media: MsrpSession,
        negotiated: NegotiatedMedia,
    ) -> Teardown {
        let (outbox_tx, mut outbox) = mpsc::channel(self.config.channel_capacity);
        let ctx = SessionContext::new(
            self.id.clone(),
            self.kind,
            self.config.local_uri().to_string(),
            self.remote_party.clone(),
            negotiated.endpoint.local_path.clone(),
            negotiated.endpoint.remote_path.clone(),
            self.events.clone(),
            outbox_tx,
            self.log.clone(),
        );

        self.dialog.mark_session_established();
        self.transition(SessionState::Established);
        info!(session = %self.id, peer = %self.remote_party, "session established");
        self.handler.on_established(&ctx).await;

        let activity = ActivityMonitor::new(self.config.inactivity_timeout);
        let outcome = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::SendMessage { message_id, content_type, body }) => {
                        match self.send_chat(&mut media, &message_id, &content_type, &body).await {
                            Ok(()) => activity.touch(),
                            Err(e) => {
                                warn!(session = %self.id, error = %e, "send failed");
                                self.send_bye().await;
                                break Outcome::Failed(e);
                            }
                        }
                    }
                    Some(SessionCommand::Terminate) | None => {
                        self.send_bye().await;
                        break Outcome::Ended(EndReason::LocalBye);
                    }
                    Some(SessionCommand::RemoteBye { request, source }) => {
                        info!(session = %self.id, "peer ended the session");
                        self.answer_bye(&request, source).await;
                        break Outcome::Ended(EndReason::RemoteBye);
                    }
                    Some(SessionCommand::RemoteCancel { request, source }) => {
                        // Too late to cancel; acknowledge and carry on.
                        debug!(session = %self.id, "CANCEL after establishment");
                        let ok = requests::ok(&self.dialog, &request);
                        if let Err(e) = self.sip.send(ok, source).await {
                            warn!(session = %self.id, error = %e, "could not answer CANCEL");
                        }
                    }
                },
                incoming = media.recv() => match incoming {
                    Ok(Some(chunk)) => {
                        activity.touch();
                        self.handler.on_payload(&ctx, chunk).await;
                    }
                    Ok(None) => {
                        warn!(session = %self.id, "media connection closed by peer");
                        self.send_bye().await;
                        break Outcome::Failed(SessionError::media(
                            "media connection closed by peer",
                        ));
                    }
                    Err(e) => {
                        self.send_bye().await;
                        break Outcome::Failed(SessionError::from(e));
                    }
                },
                Some(chunk) = outbox.recv() => {
                    match media.send_chunk(&chunk).await {
                        Ok(()) => activity.touch(),
                        Err(e) => {
                            self.send_bye().await;
                            break Outcome::Failed(SessionError::from(e));
                        }
                    }
                }
                _ = activity.expired() => {
                    info!(
                        session = %self.id,
                        timeout = ?activity.timeout(),
                        "closing idle session"
                    );
                    self.send_bye().await;
                    break Outcome::Failed(SessionError::inactivity(format!(
                        "no media activity for {:?}",
                        activity.timeout()
                    )));
                }
                _ = self.cancel.cancelled() => {
                    info!(session = %self.id, "session aborted");
                    self.send_bye().await;
                    break Outcome::Ended(EndReason::LocalBye);
                }
            }
        };

        Teardown {
            outcome,
            media: Some(media),
            ctx: Some(ctx),
        }
    }

    /// Wrap `body` in a CPIM envelope asking for receipts and put it on
    /// the wire.
    async fn send_chat(
        &mut self,
        media: &mut MsrpSession,
        message_id: &str,
        content_type: &str,
        body: &str,
    ) -> Result<()> {
        let envelope = CpimMessage::new(content_type, body)
            .with_from(self.config.local_uri().to_string())
            .with_to(self.remote_party.clone())
            .with_message_id(message_id)
            .with_disposition_notification(&[DISPOSITION_POSITIVE_DELIVERY, DISPOSITION_DISPLAY]);
        media
            .send_message(message_id, CPIM_CONTENT_TYPE, envelope.encode())
            .await?;
        self.log
            .record_outgoing(&self.remote_party, message_id, body);
        debug!(session = %self.id, message_id, "message sent");
        Ok(())
    }

    // ---- teardown helpers ------------------------------------------------

    async fn send_bye(&mut self) {
        self.dialog.mark_terminated();
        let bye = requests::bye(&mut self.dialog);
        match self.sip.send_with_context(bye, self.peer).await {
            Ok(handle) => {
                // Collect the 200 so teardown leaves no dangling transaction.
                let outcome = handle.wait(TEARDOWN_WAIT).await;
                debug!(session = %self.id, ?outcome, "BYE transaction finished");
            }
            Err(e) => warn!(session = %self.id, error = %e, "could not send BYE"),
        }
    }

    async fn answer_bye(&self, request: &SipRequest, source: SocketAddr) {
        self.dialog.mark_terminated();
        let ok = requests::ok(&self.dialog, request);
        if let Err(e) = self.sip.send(ok, source).await {
            warn!(session = %self.id, error = %e, "could not answer BYE");
        }
    }

    /// Send a non-2xx final for the INVITE, carrying our dialog tag.
    async fn reject(&self, invite: &SipRequest, status: StatusCode) {
        let mut response = SipResponse::from_request(status, invite);
        if let Some(tag) = self.dialog.local_tag() {
            response = response.with_to_tag(tag);
        }
        if let Err(e) = self.sip.send(response, self.peer).await {
            warn!(session = %self.id, error = %e, "could not send final response");
        }
    }

    /// Close out the session: final state, end notification, media close,
    /// registry removal. The sole exit path for every session.
    async fn finish(&mut self, teardown: Teardown) {
        let Teardown {
            outcome,
            media,
            ctx,
        } = teardown;

        let (state, event) = match &outcome {
            Outcome::Ended(reason) => {
                let state = match reason {
                    EndReason::Cancelled => SessionState::Cancelled,
                    EndReason::LocalBye | EndReason::RemoteBye => SessionState::Terminated,
                };
                (state, SessionEvent::Ended { reason: *reason })
            }
            Outcome::Failed(error) => (
                SessionState::Failed,
                SessionEvent::Failed {
                    kind: error.kind,
                    reason: error.reason.clone(),
                },
            ),
        };

        if state == SessionState::Cancelled {
            self.dialog.mark_cancelled();
        }
        if state == SessionState::Terminated {
            self.transition(SessionState::Terminating);
        }
        if self.transition(state) {
            self.emit(event);
            match &outcome {
                Outcome::Ended(reason) => {
                    info!(session = %self.id, %reason, "session ended")
                }
                Outcome::Failed(error) => {
                    warn!(session = %self.id, error = %error, "session failed")
                }
            }
        }

        if let Some(mut media) = media {
            if let Err(e) = media.close().await {
                debug!(session = %self.id, error = %e, "media close");
            }
        }
        if let Some(ctx) = &ctx {
            self.handler.on_closed(ctx, self.current_state()).await;
        }

        self.registry.remove(&self.id);
        let _ = self.engine_events.send(EngineEvent::SessionEnded {
            id: self.id.clone(),
            state: self.current_state(),
        });
    }

    // ---- small shared pieces ---------------------------------------------

    fn local_media(&self) -> LocalMedia {
        LocalMedia {
            host: self.config.local_host.clone(),
            port: self.config.msrp_port,
            session_id: Uuid::new_v4().simple().to_string(),
            accept_types: self.handler.accept_types(),
        }
    }

    /// Apply a state transition, returning whether it took effect.
    /// Terminal states absorb everything, which keeps end events one-shot.
    fn transition(&self, to: SessionState) -> bool {
        let mut from = None;
        self.state.send_if_modified(|current| {
            if *current != to && current.can_transition_to(to) {
                from = Some(*current);
                *current = to;
                true
            } else {
                false
            }
        });
        let Some(from) = from else {
            return false;
        };
        debug!(session = %self.id, %from, %to, "state changed");
        self.emit(SessionEvent::StateChanged { from, to });
        if to == SessionState::Established {
            self.emit(SessionEvent::Established);
        }
        true
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }
}
