//! The engine: the one object an application holds.
//!
//! [`ImEngine`] ties the planes together: it owns the SIP manager, the MSRP
//! manager, the session registry and the handler set, and it spawns one
//! task per session. Sessions are reached through [`ImsSession`] handles;
//! the engine itself only originates, looks up and shuts down.
//!
//! The engine is deliberately transport-agnostic: it is constructed over a
//! [`SipTransport`] and an [`MsrpConnector`], so the same engine runs over
//! sockets in production and over in-memory channels in tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rims_dialog_core::{DialogPath, SipManager};
use rims_msrp_core::{MsrpConnector, MsrpManager};
use rims_sip_core::types::NameAddr;
use rims_sip_transport::{SipTransport, TransportEvent};

use crate::config::EngineConfig;
use crate::delivery::MessageLog;
use crate::dispatcher::SessionDispatcher;
use crate::error::{Result, SessionError};
use crate::events::EngineEvent;
use crate::handlers::{HandlerSet, SessionHandler};
use crate::registry::SessionRegistry;
use crate::session::task::{SessionStart, SessionTask};
use crate::session::{ImsSession, SessionId, SessionKind};
use crate::state::SessionState;

/// How long `shutdown` waits for sessions to finish their BYE handshakes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
const SHUTDOWN_POLL: Duration = Duration::from_millis(20);

/// Everything the engine, its dispatcher and its session tasks share.
///
/// A plain clone-struct rather than an `Arc<Engine>` so the dispatcher,
/// which the SIP manager holds, never keeps the engine itself alive.
#[derive(Clone)]
pub(crate) struct EngineShared {
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) sip: Arc<SipManager>,
    pub(crate) msrp: MsrpManager,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) log: Arc<dyn MessageLog>,
    pub(crate) handlers: Arc<HandlerSet>,
    pub(crate) events: broadcast::Sender<EngineEvent>,
    pub(crate) cancel: CancellationToken,
}

impl EngineShared {
    /// Create the plumbing for one session, register it, start its task.
    pub(crate) fn spawn_session(
        &self,
        kind: SessionKind,
        remote_party: String,
        dialog: DialogPath,
        peer: SocketAddr,
        handler: Arc<dyn SessionHandler>,
        start: SessionStart,
    ) -> Arc<ImsSession> {
        let id = SessionId::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Initiating);
        let (command_tx, command_rx) = mpsc::channel(self.config.channel_capacity);
        let (event_tx, _) = broadcast::channel(self.config.channel_capacity);

        let session = Arc::new(ImsSession::new(
            id.clone(),
            kind,
            remote_party.clone(),
            dialog.call_id().to_string(),
            state_rx,
            command_tx,
            event_tx.clone(),
        ));
        self.registry.insert(session.clone());

        let task = SessionTask {
            id,
            kind,
            remote_party,
            config: self.config.clone(),
            sip: self.sip.clone(),
            msrp: self.msrp.clone(),
            registry: self.registry.clone(),
            log: self.log.clone(),
            handler,
            events: event_tx,
            engine_events: self.events.clone(),
            state: state_tx,
            commands: command_rx,
            cancel: self.cancel.child_token(),
            dialog,
            peer,
        };
        tokio::spawn(task.run(start));
        session
    }
}

/// Client-side IMS messaging engine.
pub struct ImEngine {
    shared: EngineShared,
}

impl ImEngine {
    /// Build and start an engine with the stock handler set.
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn SipTransport>,
        transport_events: mpsc::Receiver<TransportEvent>,
        connector: Arc<dyn MsrpConnector>,
        log: Arc<dyn MessageLog>,
    ) -> Arc<Self> {
        Self::with_handlers(
            config,
            transport,
            transport_events,
            connector,
            log,
            HandlerSet::defaults(),
        )
    }

    /// Like [`ImEngine::new`], with a caller-supplied handler set.
    pub fn with_handlers(
        config: EngineConfig,
        transport: Arc<dyn SipTransport>,
        transport_events: mpsc::Receiver<TransportEvent>,
        connector: Arc<dyn MsrpConnector>,
        log: Arc<dyn MessageLog>,
        handlers: HandlerSet,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let sip = SipManager::new(transport, config.manager.clone());
        let msrp = MsrpManager::new(connector, config.msrp.clone());
        let (events, _) = broadcast::channel(config.channel_capacity);

        let shared = EngineShared {
            config,
            sip,
            msrp,
            registry: Arc::new(SessionRegistry::new()),
            log,
            handlers: Arc::new(handlers),
            events,
            cancel: CancellationToken::new(),
        };
        shared
            .sip
            .add_listener(Arc::new(SessionDispatcher::new(shared.clone())));
        shared.sip.start(transport_events);
        info!(local = %shared.config.local_uri(), "engine started");
        Arc::new(Self { shared })
    }

    /// Open an originating chat session toward `remote`.
    ///
    /// Returns as soon as the INVITE is on its way; establishment is
    /// observed through the returned handle, typically with
    /// [`ImsSession::wait_for_state`].
    pub fn start_chat(&self, remote: &str) -> Result<Arc<ImsSession>> {
        if self.shared.cancel.is_cancelled() {
            return Err(SessionError::unexpected("engine is shut down"));
        }
        let remote: NameAddr = remote
            .parse()
            .map_err(|e| SessionError::initiation(format!("invalid remote address: {e}")))?;

        let kind = SessionKind::OriginatingChat;
        let handler = self
            .shared
            .handlers
            .get(kind)
            .ok_or_else(|| SessionError::initiation("no chat handler registered"))?;

        let dialog = DialogPath::originating(
            self.shared.config.local_party(),
            remote.clone(),
            self.shared.config.local_via(),
        );
        info!(call_id = %dialog.call_id(), peer = %remote.uri, "starting chat");

        Ok(self.shared.spawn_session(
            kind,
            remote.uri.to_string(),
            dialog,
            self.shared.config.signaling_peer,
            handler,
            SessionStart::Originating,
        ))
    }

    /// Subscribe to engine lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Look up a live session by id.
    pub fn session(&self, id: &SessionId) -> Option<Arc<ImsSession>> {
        self.shared.registry.get(id)
    }

    /// The live session talking to `remote`, if there is one.
    pub fn find_by_remote(&self, remote: &str) -> Option<Arc<ImsSession>> {
        self.shared.registry.find_by_remote(remote)
    }

    /// All live sessions.
    pub fn sessions(&self) -> Vec<Arc<ImsSession>> {
        self.shared.registry.all()
    }

    /// Tear everything down: every session ends, then signaling stops.
    ///
    /// Sessions get [`SHUTDOWN_GRACE`] to complete their BYE or CANCEL
    /// handshakes; whatever is still alive after that goes down with the
    /// transport.
    pub async fn shutdown(&self) {
        info!(sessions = self.shared.registry.len(), "engine shutting down");
        self.shared.cancel.cancel();

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while !self.shared.registry.is_empty() {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    remaining = self.shared.registry.len(),
                    "shutdown grace expired with sessions still alive"
                );
                break;
            }
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }
        self.shared.sip.shutdown().await;
    }
}

impl std::fmt::Debug for ImEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImEngine")
            .field("local", &self.shared.config.local_uri())
            .field("sessions", &self.shared.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::InMemoryMessageLog;
    use crate::error::SessionErrorKind;
    use rims_msrp_core::ChannelMsrpNetwork;
    use rims_sip_transport::ChannelTransport;

    type PeerEnd = (ChannelTransport, mpsc::Receiver<TransportEvent>);

    fn engine() -> (Arc<ImEngine>, PeerEnd) {
        let alice = "10.0.0.1:5060".parse().unwrap();
        let bob = "10.0.0.2:5060".parse().unwrap();
        let ((transport, events), peer) = ChannelTransport::pair(alice, bob);

        let network = ChannelMsrpNetwork::new();
        let connector = Arc::new(network.connector("10.0.0.1"));

        let engine = ImEngine::new(
            EngineConfig::new("alice", "10.0.0.1", bob),
            Arc::new(transport),
            events,
            connector,
            Arc::new(InMemoryMessageLog::new()),
        );
        (engine, peer)
    }

    #[tokio::test]
    async fn test_invalid_remote_rejected() {
        let (engine, _peer) = engine();
        let err = engine.start_chat("not a sip uri").unwrap_err();
        assert_eq!(err.kind, SessionErrorKind::SessionInitiationFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_session() {
        let (engine, _peer) = engine();
        let session = engine.start_chat("sip:bob@10.0.0.2").unwrap();
        assert_eq!(session.kind(), SessionKind::OriginatingChat);
        assert_eq!(session.state(), SessionState::Initiating);
        assert!(engine.session(session.id()).is_some());
        assert!(engine.find_by_remote("sip:bob@10.0.0.2").is_some());

        // Nobody answers the INVITE; shutdown cancels it and drains the
        // registry before stopping signaling.
        engine.shutdown().await;
        assert!(engine.session(session.id()).is_none());
        assert!(session.state().is_terminal());
    }
}
