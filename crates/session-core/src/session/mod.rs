//! Session handles, identifiers and the context handlers work against.
//!
//! An [`ImsSession`] is the application's grip on one running session: a
//! cheap cloneable handle that sends commands into the session task and
//! taps its event stream. The task itself lives in [`task`] and owns all
//! mutable session state; the handle never touches signaling or media
//! directly.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, watch};
use uuid::Uuid;

use rims_msrp_core::{generate_message_id, MsrpChunk};
use rims_sip_core::types::SipRequest;

use crate::delivery::MessageLog;
use crate::error::{Result, SessionError};
use crate::events::SessionEvent;
use crate::media::MediaOffer;
use crate::state::SessionState;

pub(crate) mod task;

/// Accept type announcing an HTTP file transfer push.
pub const FILE_TRANSFER_ACCEPT_TYPE: &str = "application/vnd.gsma.rcs-ft-http+xml";

/// Unique id for one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What flavor of session this is, deciding which handler runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// A chat session we opened toward a remote party.
    OriginatingChat,
    /// An incoming session delivering chat messages, possibly deferred
    /// ones pushed by a store-and-forward server.
    TerminatingStoreAndForward,
    /// An incoming session pushing an HTTP file transfer descriptor.
    HttpFileTransfer,
}

impl SessionKind {
    /// Classify an incoming offer by its accept types.
    pub fn from_offer(offer: &MediaOffer) -> Self {
        if offer
            .accept_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(FILE_TRANSFER_ACCEPT_TYPE))
        {
            Self::HttpFileTransfer
        } else {
            Self::TerminatingStoreAndForward
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OriginatingChat => "originating-chat",
            Self::TerminatingStoreAndForward => "terminating-store-and-forward",
            Self::HttpFileTransfer => "http-file-transfer",
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands a session task accepts from its handle and the dispatcher.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// Send a chat message to the peer.
    SendMessage {
        message_id: String,
        content_type: String,
        body: String,
    },
    /// Tear the session down locally.
    Terminate,
    /// The peer sent a BYE for this session's dialog.
    RemoteBye {
        request: SipRequest,
        source: SocketAddr,
    },
    /// The peer cancelled its pending INVITE.
    RemoteCancel {
        request: SipRequest,
        source: SocketAddr,
    },
}

/// Handle to a running session.
///
/// Clones all point at the same session task. Dropping handles does not
/// end the session; call [`terminate`](Self::terminate) for that.
#[derive(Clone)]
pub struct ImsSession {
    id: SessionId,
    kind: SessionKind,
    remote_party: String,
    call_id: String,
    state: watch::Receiver<SessionState>,
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
}

impl ImsSession {
    pub(crate) fn new(
        id: SessionId,
        kind: SessionKind,
        remote_party: String,
        call_id: String,
        state: watch::Receiver<SessionState>,
        commands: mpsc::Sender<SessionCommand>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            id,
            kind,
            remote_party,
            call_id,
            state,
            commands,
            events,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// URI of the remote party.
    pub fn remote_party(&self) -> &str {
        &self.remote_party
    }

    /// SIP Call-ID of the underlying dialog.
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Subscribe to this session's events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Wait until the session reaches `target` or any terminal state,
    /// returning the state that ended the wait.
    pub async fn wait_for_state(&self, target: SessionState) -> SessionState {
        let mut state = self.state.clone();
        let ended = match state
            .wait_for(|current| *current == target || current.is_terminal())
            .await
        {
            Ok(current) => *current,
            // Task gone; the last published state stands.
            Err(_) => self.state(),
        };
        ended
    }

    /// Send a chat message over the established session.
    ///
    /// Returns the end-to-end message id, which later delivery updates
    /// refer back to. The message is queued; delivery confirmation, if
    /// requested from the peer, arrives as a
    /// [`SessionEvent::DeliveryUpdate`].
    pub async fn send_message(&self, body: impl Into<String>) -> Result<String> {
        if self.state().is_terminal() {
            return Err(SessionError::unexpected("session has ended"));
        }
        let message_id = generate_message_id();
        self.commands
            .send(SessionCommand::SendMessage {
                message_id: message_id.clone(),
                content_type: "text/plain".to_string(),
                body: body.into(),
            })
            .await
            .map_err(|_| SessionError::unexpected("session is no longer running"))?;
        Ok(message_id)
    }

    /// Tear the session down.
    ///
    /// Pending sessions are cancelled, established ones closed with a BYE.
    /// Idempotent: terminating an already ended session is a no-op.
    pub async fn terminate(&self) {
        if self.state().is_terminal() {
            return;
        }
        // A task that already exited makes this a no-op as well.
        let _ = self.commands.send(SessionCommand::Terminate).await;
    }

    /// Route a command from the dispatcher. `false` means the task is gone.
    pub(crate) async fn route(&self, command: SessionCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }
}

impl std::fmt::Debug for ImsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImsSession")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("remote_party", &self.remote_party)
            .field("state", &self.state())
            .finish()
    }
}

/// What a handler sees of its session.
///
/// Created once media is open; everything a handler does flows through
/// here so handlers stay free of signaling and transport concerns.
pub struct SessionContext {
    pub id: SessionId,
    pub kind: SessionKind,
    /// Our URI, used as CPIM From.
    pub local_party: String,
    /// Peer URI, used as CPIM To and as the log contact.
    pub remote_party: String,
    /// Our MSRP path for chunks we build.
    pub local_msrp_path: String,
    /// Peer MSRP path for chunks we build.
    pub remote_msrp_path: String,
    events: broadcast::Sender<SessionEvent>,
    outbox: mpsc::Sender<MsrpChunk>,
    log: Arc<dyn MessageLog>,
}

impl SessionContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: SessionId,
        kind: SessionKind,
        local_party: String,
        remote_party: String,
        local_msrp_path: String,
        remote_msrp_path: String,
        events: broadcast::Sender<SessionEvent>,
        outbox: mpsc::Sender<MsrpChunk>,
        log: Arc<dyn MessageLog>,
    ) -> Self {
        Self {
            id,
            kind,
            local_party,
            remote_party,
            local_msrp_path,
            remote_msrp_path,
            events,
            outbox,
            log,
        }
    }

    /// Publish an event to this session's subscribers.
    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; events are observability, not control.
        let _ = self.events.send(event);
    }

    /// Queue an already built chunk toward the peer.
    pub async fn send_media(&self, chunk: MsrpChunk) -> Result<()> {
        self.outbox
            .send(chunk)
            .await
            .map_err(|_| SessionError::media("media channel closed"))
    }

    /// Queue `body` toward the peer as one complete SEND.
    pub async fn send_payload(&self, content_type: &str, body: impl Into<Bytes>) -> Result<()> {
        let chunk = MsrpChunk::send(
            &self.remote_msrp_path,
            &self.local_msrp_path,
            &generate_message_id(),
            content_type,
            body,
        );
        self.send_media(chunk).await
    }

    pub fn log(&self) -> &dyn MessageLog {
        self.log.as_ref()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("remote_party", &self.remote_party)
            .finish()
    }
}
