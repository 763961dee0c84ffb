//! SIP manager: the single front door to the signaling transport.
//!
//! [`SipManager`] owns the transport's event stream and splits inbound
//! traffic two ways:
//!
//! - Responses and ACKs complete pending transactions in the
//!   [`TransactionRegistry`]. Provisional responses are observed and logged
//!   but complete nothing; a final response or ACK with no matching entry is
//!   ignored as a retransmission.
//! - Other requests fan out to registered [`SipRequestListener`]s in
//!   registration order; every listener sees the request, and exactly one is
//!   expected to claim it. Unclaimed requests are answered with 480
//!   Temporarily Unavailable.
//!
//! Sending follows the register-then-send discipline:
//! [`send_with_context`](SipManager::send_with_context) registers the
//! transaction before the message leaves, so the answer cannot race the
//! registration, and returns a [`TransactionHandle`] to wait on.
//! [`send_and_wait`](SipManager::send_and_wait) composes the two steps with
//! the configured timeout.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use rims_sip_core::types::{SipMessage, SipRequest, StatusCode};
use rims_sip_transport::{SipTransport, TransportEvent};

use crate::config::ManagerConfig;
use crate::error::Result;
use crate::requests;
use crate::transaction::{
    TransactionHandle, TransactionKey, TransactionOutcome, TransactionRegistry,
};

/// Receiver for requests the transaction layer does not consume.
///
/// Listeners are notified in registration order and all of them see the
/// request; returning `true` claims it, which suppresses the automatic 480.
/// Listeners must classify quickly and hand real work to their own tasks:
/// the dispatch loop awaits each notification.
#[async_trait]
pub trait SipRequestListener: Send + Sync {
    /// Handle a request. Return `true` if this listener claimed it.
    async fn on_request(&self, request: SipRequest, source: SocketAddr) -> bool;
}

/// Front door to the signaling transport.
pub struct SipManager {
    transport: Arc<dyn SipTransport>,
    registry: Arc<TransactionRegistry>,
    listeners: RwLock<Vec<Arc<dyn SipRequestListener>>>,
    config: ManagerConfig,
    cancel: CancellationToken,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl SipManager {
    /// Create a manager over `transport`. Call [`start`](Self::start) with
    /// the transport's event receiver to begin processing.
    pub fn new(transport: Arc<dyn SipTransport>, config: ManagerConfig) -> Arc<Self> {
        Arc::new(Self {
            transport,
            registry: Arc::new(TransactionRegistry::new()),
            listeners: RwLock::new(Vec::new()),
            config,
            cancel: CancellationToken::new(),
            event_loop: Mutex::new(None),
        })
    }

    /// Start consuming transport events. A no-op if already started.
    pub fn start(self: &Arc<Self>, events: mpsc::Receiver<TransportEvent>) {
        let mut guard = self.event_loop.lock();
        if guard.is_some() {
            debug!("sip manager already started");
            return;
        }
        *guard = Some(spawn_event_loop(self.clone(), events));
    }

    /// Stop the event loop and close the transport.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.event_loop.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "transport close during shutdown");
        }
        info!("sip manager shut down");
    }

    /// Register a request listener.
    pub fn add_listener(&self, listener: Arc<dyn SipRequestListener>) {
        self.listeners.write().push(listener);
    }

    /// The manager's configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The transport messages are sent through.
    pub fn transport(&self) -> Arc<dyn SipTransport> {
        self.transport.clone()
    }

    /// Number of transactions currently awaiting an answer.
    pub fn pending_transactions(&self) -> usize {
        self.registry.len()
    }

    /// Send a message that expects no answer (responses, ACK).
    pub async fn send(
        &self,
        message: impl Into<SipMessage>,
        destination: SocketAddr,
    ) -> Result<()> {
        let message = self.stamp(message.into());
        self.transport.send_message(message, destination).await?;
        Ok(())
    }

    /// Register a transaction for `message`, then send it.
    ///
    /// Registration happens before the send so the answer cannot arrive
    /// ahead of the registry entry. If the send fails the entry is removed
    /// again.
    pub async fn send_with_context(
        &self,
        message: impl Into<SipMessage>,
        destination: SocketAddr,
    ) -> Result<TransactionHandle> {
        let message = self.stamp(message.into());
        let key = TransactionKey::from_message(&message);
        let receiver = self
            .registry
            .register(key.clone(), self.config.transaction_ttl)?;
        trace!(%key, "transaction registered");

        if let Err(e) = self.transport.send_message(message, destination).await {
            self.registry.remove(&key);
            return Err(e.into());
        }
        Ok(TransactionHandle::new(key, receiver, self.registry.clone()))
    }

    /// Send `message` and wait for its transaction to complete, up to the
    /// configured transaction timeout.
    pub async fn send_and_wait(
        &self,
        message: impl Into<SipMessage>,
        destination: SocketAddr,
    ) -> Result<TransactionOutcome> {
        let handle = self.send_with_context(message, destination).await?;
        Ok(handle.wait(self.config.transaction_timeout).await)
    }

    /// Stamp locally built requests with our User-Agent.
    fn stamp(&self, mut message: SipMessage) -> SipMessage {
        if let SipMessage::Request(request) = &mut message {
            if request.headers.get("User-Agent").is_none() {
                request
                    .headers
                    .set("User-Agent", self.config.user_agent.clone());
            }
        }
        message
    }

    async fn handle_event(self: &Arc<Self>, event: TransportEvent) {
        match event {
            TransportEvent::MessageReceived {
                message, source, ..
            } => match message {
                SipMessage::Response(response) => {
                    if response.is_provisional() {
                        debug!(
                            status = %response.status,
                            call_id = %response.call_id,
                            "provisional response"
                        );
                        return;
                    }
                    let key = TransactionKey::from_response(&response);
                    if !self
                        .registry
                        .complete(&key, TransactionOutcome::Response(response))
                    {
                        trace!(%key, "final response matches no transaction, dropping");
                    }
                }
                SipMessage::Request(request) if request.is_ack() => {
                    let key = TransactionKey::from_request(&request);
                    if !self.registry.complete(&key, TransactionOutcome::Ack(request)) {
                        trace!(%key, "ACK matches no transaction, dropping");
                    }
                }
                SipMessage::Request(request) => {
                    self.dispatch_request(request, source).await;
                }
            },
            TransportEvent::Error { error } => {
                warn!(error, "transport reported an error");
            }
            TransportEvent::Closed => {
                // The loop observes this through recv() returning the event;
                // nothing to do beyond logging.
                info!("transport closed");
            }
        }
    }

    async fn dispatch_request(self: &Arc<Self>, request: SipRequest, source: SocketAddr) {
        // Every listener sees the request; exactly one is expected to claim.
        let listeners: Vec<_> = self.listeners.read().iter().cloned().collect();
        let mut claimed = false;
        for listener in listeners {
            claimed |= listener.on_request(request.clone(), source).await;
        }
        if claimed {
            return;
        }

        debug!(
            method = %request.method,
            call_id = %request.call_id,
            "no listener claimed request, answering 480"
        );
        let response = requests::error_response(&request, StatusCode::TemporarilyUnavailable);
        if let Err(e) = self.send(response, source).await {
            warn!(error = %e, "failed to send 480 for unclaimed request");
        }
    }
}

impl std::fmt::Debug for SipManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SipManager")
            .field("pending_transactions", &self.registry.len())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

fn spawn_event_loop(
    manager: Arc<SipManager>,
    mut events: mpsc::Receiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = manager.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let stop = matches!(event, TransportEvent::Closed);
            manager.handle_event(event).await;
            if stop {
                break;
            }
        }
        debug!("sip manager event loop terminated");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::DialogPath;
    use rims_sip_core::types::{CallId, Method, NameAddr, SipResponse, SipUri};
    use rims_sip_transport::ChannelTransport;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn addrs() -> (SocketAddr, SocketAddr) {
        ("10.0.0.1:5060".parse().unwrap(), "10.0.0.2:5060".parse().unwrap())
    }

    struct Peer {
        transport: ChannelTransport,
        events: mpsc::Receiver<TransportEvent>,
        /// Address of the manager under test, as seen from the peer.
        remote: SocketAddr,
    }

    impl Peer {
        async fn recv_request(&mut self) -> SipRequest {
            loop {
                match self.events.recv().await.unwrap() {
                    TransportEvent::MessageReceived { message, .. } => {
                        if let SipMessage::Request(request) = message {
                            return request;
                        }
                    }
                    TransportEvent::Closed => panic!("peer transport closed"),
                    _ => {}
                }
            }
        }

        async fn recv_response(&mut self) -> SipResponse {
            loop {
                match self.events.recv().await.unwrap() {
                    TransportEvent::MessageReceived { message, .. } => {
                        if let SipMessage::Response(response) = message {
                            return response;
                        }
                    }
                    TransportEvent::Closed => panic!("peer transport closed"),
                    _ => {}
                }
            }
        }
    }

    fn setup(config: ManagerConfig) -> (Arc<SipManager>, Peer, SocketAddr) {
        let (local, remote) = addrs();
        let ((a, a_events), (b, b_events)) = ChannelTransport::pair(local, remote);
        let manager = SipManager::new(Arc::new(a), config);
        manager.start(a_events);
        (
            manager,
            Peer {
                transport: b,
                events: b_events,
                remote: local,
            },
            remote,
        )
    }

    fn originating_dialog() -> DialogPath {
        DialogPath::originating(
            NameAddr::new(SipUri::new("alice", "10.0.0.1")),
            NameAddr::new(SipUri::new("bob", "10.0.0.2")),
            "10.0.0.1:5060",
        )
    }

    fn contact(user: &str, host: &str) -> NameAddr {
        NameAddr::new(SipUri::new(user, host))
    }

    #[tokio::test]
    async fn test_send_and_wait_skips_provisionals() {
        let (manager, mut peer, peer_addr) = setup(ManagerConfig::default());
        let mut dialog = originating_dialog();
        let invite = requests::invite(
            &mut dialog,
            contact("alice", "10.0.0.1"),
            "application/sdp",
            "v=0\r\n",
        );

        let answerer = tokio::spawn(async move {
            let request = peer.recv_request().await;
            assert_eq!(request.method, Method::Invite);
            assert_eq!(
                request.headers.get("User-Agent").map(|ua| &ua[..5]),
                Some("rims/")
            );

            let ringing = SipResponse::from_request(StatusCode::Ringing, &request)
                .with_to_tag("b-tag");
            peer.transport
                .send_message(ringing.into(), peer.remote)
                .await
                .unwrap();

            let ok = SipResponse::from_request(StatusCode::Ok, &request).with_to_tag("b-tag");
            peer.transport.send_message(ok.into(), peer.remote).await.unwrap();
        });

        let outcome = manager.send_and_wait(invite, peer_addr).await.unwrap();
        let response = outcome.response().expect("final response");
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(manager.pending_transactions(), 0);

        answerer.await.unwrap();
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_transaction_times_out() {
        let (manager, _peer, peer_addr) = setup(ManagerConfig::default());
        let mut dialog = originating_dialog();
        let invite = requests::invite(
            &mut dialog,
            contact("alice", "10.0.0.1"),
            "application/sdp",
            "v=0\r\n",
        );

        let outcome = manager.send_and_wait(invite, peer_addr).await.unwrap();
        assert!(outcome.is_timeout());
        assert_eq!(manager.pending_transactions(), 0);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_transaction_rejected() {
        let (manager, _peer, peer_addr) = setup(ManagerConfig::default());
        let mut dialog = originating_dialog();
        let invite = requests::invite(
            &mut dialog,
            contact("alice", "10.0.0.1"),
            "application/sdp",
            "v=0\r\n",
        );

        let _handle = manager
            .send_with_context(invite.clone(), peer_addr)
            .await
            .unwrap();
        let err = manager.send_with_context(invite, peer_addr).await.unwrap_err();
        assert!(matches!(err, crate::error::DialogError::DuplicateTransaction { .. }));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_ack_completes_server_side_wait() {
        let (manager, mut peer, peer_addr) = setup(ManagerConfig::default());

        // Peer originates; we answer 200 and wait for its ACK.
        let mut peer_dialog = DialogPath::originating(
            NameAddr::new(SipUri::new("bob", "10.0.0.2")),
            NameAddr::new(SipUri::new("alice", "10.0.0.1")),
            "10.0.0.2:5060",
        );
        let invite = requests::invite(
            &mut peer_dialog,
            contact("bob", "10.0.0.2"),
            "application/sdp",
            "v=0\r\n",
        );

        let callee_dialog = DialogPath::terminating(&invite, "10.0.0.1:5060");
        let ok = requests::ok_with_body(
            &callee_dialog,
            &invite,
            contact("alice", "10.0.0.1"),
            "application/sdp",
            "v=0\r\n",
        );

        let handle = manager.send_with_context(ok, peer_addr).await.unwrap();

        let answer = peer.recv_response().await;
        assert_eq!(answer.status, StatusCode::Ok);
        peer_dialog.apply_response(&answer);
        let ack = requests::ack(&peer_dialog, &answer).unwrap();
        peer.transport.send_message(ack.into(), peer.remote).await.unwrap();

        let outcome = handle.wait(Duration::from_secs(5)).await;
        assert!(matches!(outcome, TransactionOutcome::Ack(_)));
        assert_eq!(manager.pending_transactions(), 0);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_unclaimed_request_answered_480() {
        let (manager, mut peer, _peer_addr) = setup(ManagerConfig::default());

        let message = SipRequest::new(
            Method::Message,
            SipUri::new("alice", "10.0.0.1"),
            NameAddr::new(SipUri::new("bob", "10.0.0.2")).with_tag("b1"),
            NameAddr::new(SipUri::new("alice", "10.0.0.1")),
            CallId::from("unclaimed@10.0.0.2"),
            1,
        );
        peer.transport
            .send_message(message.into(), peer.remote)
            .await
            .unwrap();

        let response = peer.recv_response().await;
        assert_eq!(response.status, StatusCode::TemporarilyUnavailable);
        assert!(response.to.tag().is_some());
        manager.shutdown().await;
    }

    struct ClaimingListener {
        seen: Mutex<Option<SipRequest>>,
        notify: Notify,
    }

    #[async_trait]
    impl SipRequestListener for ClaimingListener {
        async fn on_request(&self, request: SipRequest, _source: SocketAddr) -> bool {
            *self.seen.lock() = Some(request);
            self.notify.notify_one();
            true
        }
    }

    #[tokio::test]
    async fn test_listener_claims_request() {
        let (manager, mut peer, _peer_addr) = setup(ManagerConfig::default());
        let listener = Arc::new(ClaimingListener {
            seen: Mutex::new(None),
            notify: Notify::new(),
        });
        manager.add_listener(listener.clone());

        let message = SipRequest::new(
            Method::Message,
            SipUri::new("alice", "10.0.0.1"),
            NameAddr::new(SipUri::new("bob", "10.0.0.2")).with_tag("b1"),
            NameAddr::new(SipUri::new("alice", "10.0.0.1")),
            CallId::from("claimed@10.0.0.2"),
            1,
        );
        peer.transport
            .send_message(message.into(), peer.remote)
            .await
            .unwrap();

        listener.notify.notified().await;
        let seen = listener.seen.lock().take().unwrap();
        assert_eq!(seen.method, Method::Message);

        // Claimed requests get no automatic response.
        let quiet =
            tokio::time::timeout(Duration::from_millis(100), peer.events.recv()).await;
        assert!(quiet.is_err());
        manager.shutdown().await;
    }
}
