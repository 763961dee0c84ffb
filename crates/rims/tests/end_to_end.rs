//! End-to-end exercises over in-process transports.
//!
//! Two engines wired back to back: real SIP dialogs, SDP negotiation and
//! MSRP chunks flow between them, only the wire is replaced by channels.
//! A few tests drive one engine from a hand-rolled peer instead, to poke
//! at the refusal paths a well-behaved engine never triggers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use rims::msrp_core::MsrpChunk;
use rims::prelude::*;
use rims::session_core::{LogEntry, FILE_TRANSFER_ACCEPT_TYPE};
use rims::sip_core::types::ids::generate_branch;
use rims::sip_core::types::{
    Method, NameAddr, SipMessage, SipRequest, SipResponse, SipUri, StatusCode, Via,
};

const TEST_WAIT: Duration = Duration::from_secs(5);

const ALICE: &str = "sip:alice@10.0.0.1";
const BOB: &str = "sip:bob@10.0.0.2";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct BackToBack {
    alice: Arc<ImEngine>,
    bob: Arc<ImEngine>,
    alice_log: Arc<InMemoryMessageLog>,
    bob_log: Arc<InMemoryMessageLog>,
}

fn back_to_back() -> BackToBack {
    back_to_back_with(|_, _| {})
}

/// Two engines talking directly to each other, with a hook to adjust the
/// configs before anything starts.
fn back_to_back_with(tweak: impl FnOnce(&mut EngineConfig, &mut EngineConfig)) -> BackToBack {
    init_tracing();
    let alice_addr: SocketAddr = "10.0.0.1:5060".parse().unwrap();
    let bob_addr: SocketAddr = "10.0.0.2:5060".parse().unwrap();
    let ((alice_transport, alice_events), (bob_transport, bob_events)) =
        ChannelTransport::pair(alice_addr, bob_addr);
    let msrp = ChannelMsrpNetwork::new();

    let mut alice_config = EngineConfig::new("alice", "10.0.0.1", bob_addr);
    let mut bob_config = EngineConfig::new("bob", "10.0.0.2", alice_addr);
    tweak(&mut alice_config, &mut bob_config);

    let alice_log = Arc::new(InMemoryMessageLog::new());
    let bob_log = Arc::new(InMemoryMessageLog::new());

    let alice = ImEngine::new(
        alice_config,
        Arc::new(alice_transport),
        alice_events,
        Arc::new(msrp.connector("10.0.0.1")),
        alice_log.clone(),
    );
    let bob = ImEngine::new(
        bob_config,
        Arc::new(bob_transport),
        bob_events,
        Arc::new(msrp.connector("10.0.0.2")),
        bob_log.clone(),
    );

    BackToBack {
        alice,
        bob,
        alice_log,
        bob_log,
    }
}

async fn incoming_session(events: &mut broadcast::Receiver<EngineEvent>) -> Arc<ImsSession> {
    loop {
        let event = timeout(TEST_WAIT, events.recv())
            .await
            .expect("timed out waiting for an incoming session")
            .expect("engine event stream closed");
        if let EngineEvent::IncomingSession { session } = event {
            return session;
        }
    }
}

async fn session_gone(
    events: &mut broadcast::Receiver<EngineEvent>,
    id: &SessionId,
) -> SessionState {
    loop {
        let event = timeout(TEST_WAIT, events.recv())
            .await
            .expect("timed out waiting for the session to end")
            .expect("engine event stream closed");
        if let EngineEvent::SessionEnded { id: ended, state } = event {
            if ended == *id {
                return state;
            }
        }
    }
}

async fn next_message(events: &mut broadcast::Receiver<SessionEvent>) -> ChatMessage {
    loop {
        let event = timeout(TEST_WAIT, events.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("session event stream closed");
        if let SessionEvent::MessageReceived { message } = event {
            return message;
        }
    }
}

async fn next_delivery(
    events: &mut broadcast::Receiver<SessionEvent>,
) -> (String, DeliveryOutcome) {
    loop {
        let event = timeout(TEST_WAIT, events.recv())
            .await
            .expect("timed out waiting for a delivery update")
            .expect("session event stream closed");
        if let SessionEvent::DeliveryUpdate {
            message_id,
            outcome,
            ..
        } = event
        {
            return (message_id, outcome);
        }
    }
}

async fn next_end(events: &mut broadcast::Receiver<SessionEvent>) -> EndReason {
    loop {
        let event = timeout(TEST_WAIT, events.recv())
            .await
            .expect("timed out waiting for the end event")
            .expect("session event stream closed");
        if let SessionEvent::Ended { reason } = event {
            return reason;
        }
    }
}

async fn next_failure(events: &mut broadcast::Receiver<SessionEvent>) -> SessionErrorKind {
    loop {
        let event = timeout(TEST_WAIT, events.recv())
            .await
            .expect("timed out waiting for the failure event")
            .expect("session event stream closed");
        if let SessionEvent::Failed { kind, .. } = event {
            return kind;
        }
    }
}

#[tokio::test]
async fn test_chat_session_delivers_messages_and_receipts() {
    let net = back_to_back();
    let mut bob_engine_events = net.bob.subscribe();

    let session = net.alice.start_chat(BOB).unwrap();
    assert_eq!(session.kind(), SessionKind::OriginatingChat);
    assert_eq!(session.remote_party(), BOB);

    let incoming = incoming_session(&mut bob_engine_events).await;
    assert_eq!(incoming.kind(), SessionKind::TerminatingStoreAndForward);
    assert_eq!(incoming.remote_party(), ALICE);
    assert_eq!(incoming.call_id(), session.call_id());

    let mut to_alice = session.subscribe();
    let mut to_bob = incoming.subscribe();
    assert_eq!(
        session.wait_for_state(SessionState::Established).await,
        SessionState::Established
    );
    assert_eq!(
        incoming.wait_for_state(SessionState::Established).await,
        SessionState::Established
    );

    let message_id = session.send_message("hello bob").await.unwrap();

    let message = next_message(&mut to_bob).await;
    assert_eq!(message.message_id, message_id);
    assert_eq!(message.contact, ALICE);
    assert_eq!(message.content_type, "text/plain");
    assert_eq!(message.body, "hello bob");

    // Bob's store-and-forward handler answers the requested receipt.
    let (receipt_id, outcome) = next_delivery(&mut to_alice).await;
    assert_eq!(receipt_id, message_id);
    assert_eq!(outcome, DeliveryOutcome::DeliveredNotRead);

    assert!(net
        .bob_log
        .entries()
        .iter()
        .any(|e| matches!(e, LogEntry::Incoming(m) if m.message_id == message_id)));
    assert!(net
        .alice_log
        .entries()
        .iter()
        .any(|e| matches!(e, LogEntry::Outgoing { message_id: id, .. } if *id == message_id)));
    assert_eq!(
        net.alice_log.delivery_status(&message_id),
        Some(DeliveryOutcome::DeliveredNotRead)
    );

    net.alice.shutdown().await;
    net.bob.shutdown().await;
}

#[tokio::test]
async fn test_local_bye_closes_both_sides() {
    let net = back_to_back();
    let mut alice_engine_events = net.alice.subscribe();
    let mut bob_engine_events = net.bob.subscribe();

    let session = net.alice.start_chat(BOB).unwrap();
    let incoming = incoming_session(&mut bob_engine_events).await;
    session.wait_for_state(SessionState::Established).await;
    incoming.wait_for_state(SessionState::Established).await;

    let mut to_alice = session.subscribe();
    let mut to_bob = incoming.subscribe();
    session.terminate().await;

    assert_eq!(
        session.wait_for_state(SessionState::Terminated).await,
        SessionState::Terminated
    );
    assert_eq!(
        incoming.wait_for_state(SessionState::Terminated).await,
        SessionState::Terminated
    );
    assert_eq!(next_end(&mut to_alice).await, EndReason::LocalBye);
    assert_eq!(next_end(&mut to_bob).await, EndReason::RemoteBye);

    assert_eq!(
        session_gone(&mut alice_engine_events, session.id()).await,
        SessionState::Terminated
    );
    assert_eq!(
        session_gone(&mut bob_engine_events, incoming.id()).await,
        SessionState::Terminated
    );
    assert!(net.alice.sessions().is_empty());
    assert!(net.bob.sessions().is_empty());

    net.alice.shutdown().await;
    net.bob.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_peer_is_alerting() {
    let net = back_to_back_with(|_, bob| bob.answer_delay = Duration::from_millis(500));
    let mut alice_engine_events = net.alice.subscribe();
    let mut bob_engine_events = net.bob.subscribe();

    let session = net.alice.start_chat(BOB).unwrap();
    let incoming = incoming_session(&mut bob_engine_events).await;
    assert_eq!(incoming.state(), SessionState::Initiating);

    let mut to_alice = session.subscribe();
    session.terminate().await;

    assert_eq!(
        session.wait_for_state(SessionState::Cancelled).await,
        SessionState::Cancelled
    );
    assert_eq!(
        incoming.wait_for_state(SessionState::Cancelled).await,
        SessionState::Cancelled
    );
    assert_eq!(next_end(&mut to_alice).await, EndReason::Cancelled);

    assert_eq!(
        session_gone(&mut alice_engine_events, session.id()).await,
        SessionState::Cancelled
    );
    assert_eq!(
        session_gone(&mut bob_engine_events, incoming.id()).await,
        SessionState::Cancelled
    );

    net.alice.shutdown().await;
    net.bob.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_declined_session_fails_originator() {
    let net = back_to_back_with(|_, bob| bob.answer_delay = Duration::from_millis(500));
    let mut bob_engine_events = net.bob.subscribe();

    let session = net.alice.start_chat(BOB).unwrap();
    let mut to_alice = session.subscribe();
    let incoming = incoming_session(&mut bob_engine_events).await;
    let mut to_bob = incoming.subscribe();

    // The callee hangs up while still alerting.
    incoming.terminate().await;

    assert_eq!(
        incoming.wait_for_state(SessionState::Cancelled).await,
        SessionState::Cancelled
    );
    assert_eq!(next_end(&mut to_bob).await, EndReason::Cancelled);

    assert_eq!(
        session.wait_for_state(SessionState::Failed).await,
        SessionState::Failed
    );
    assert_eq!(
        next_failure(&mut to_alice).await,
        SessionErrorKind::SessionInitiationFailed
    );

    net.alice.shutdown().await;
    net.bob.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_is_torn_down() {
    let net = back_to_back_with(|alice, _| alice.inactivity_timeout = Duration::from_secs(30));
    let mut bob_engine_events = net.bob.subscribe();

    let session = net.alice.start_chat(BOB).unwrap();
    let incoming = incoming_session(&mut bob_engine_events).await;
    session.wait_for_state(SessionState::Established).await;
    let mut to_alice = session.subscribe();

    // No traffic; the clock runs straight into the idle window.
    assert_eq!(
        session.wait_for_state(SessionState::Failed).await,
        SessionState::Failed
    );
    assert_eq!(next_failure(&mut to_alice).await, SessionErrorKind::Inactivity);
    assert_eq!(
        incoming.wait_for_state(SessionState::Terminated).await,
        SessionState::Terminated
    );

    net.alice.shutdown().await;
    net.bob.shutdown().await;
}

const DESCRIPTOR: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<file><file-size>1024</file-size><file-name>photo.jpg</file-name>"#,
    r#"<data url="https://ft.example.com/dl/abc123"/></file>"#,
);

/// Originating handler that announces a file transfer and pushes the
/// descriptor as soon as the session is up.
struct DescriptorPush;

#[async_trait]
impl SessionHandler for DescriptorPush {
    fn kind(&self) -> SessionKind {
        SessionKind::OriginatingChat
    }

    fn accept_types(&self) -> Vec<String> {
        vec![FILE_TRANSFER_ACCEPT_TYPE.to_string()]
    }

    async fn on_established(&self, ctx: &SessionContext) {
        ctx.send_payload(FILE_TRANSFER_ACCEPT_TYPE, DESCRIPTOR)
            .await
            .expect("descriptor push");
    }

    async fn on_payload(&self, _ctx: &SessionContext, _chunk: MsrpChunk) {}

    async fn on_closed(&self, _ctx: &SessionContext, _state: SessionState) {}
}

#[tokio::test]
async fn test_file_transfer_push_classified_by_accept_types() {
    init_tracing();
    let alice_addr: SocketAddr = "10.0.0.1:5060".parse().unwrap();
    let bob_addr: SocketAddr = "10.0.0.2:5060".parse().unwrap();
    let ((alice_transport, alice_events), (bob_transport, bob_events)) =
        ChannelTransport::pair(alice_addr, bob_addr);
    let msrp = ChannelMsrpNetwork::new();

    let mut handlers = HandlerSet::defaults();
    handlers.register(Arc::new(DescriptorPush));
    let alice = ImEngine::with_handlers(
        EngineConfig::new("alice", "10.0.0.1", bob_addr),
        Arc::new(alice_transport),
        alice_events,
        Arc::new(msrp.connector("10.0.0.1")),
        Arc::new(InMemoryMessageLog::new()),
        handlers,
    );
    let bob_log = Arc::new(InMemoryMessageLog::new());
    let bob = ImEngine::new(
        EngineConfig::new("bob", "10.0.0.2", alice_addr),
        Arc::new(bob_transport),
        bob_events,
        Arc::new(msrp.connector("10.0.0.2")),
        bob_log.clone(),
    );
    let mut bob_engine_events = bob.subscribe();

    let session = alice.start_chat(BOB).unwrap();
    let incoming = incoming_session(&mut bob_engine_events).await;
    assert_eq!(incoming.kind(), SessionKind::HttpFileTransfer);

    let mut to_bob = incoming.subscribe();
    let message = next_message(&mut to_bob).await;
    assert_eq!(message.content_type, FILE_TRANSFER_ACCEPT_TYPE);
    assert_eq!(message.body, DESCRIPTOR);
    assert!(bob_log
        .entries()
        .iter()
        .any(|e| matches!(e, LogEntry::Incoming(m) if m.content_type == FILE_TRANSFER_ACCEPT_TYPE)));

    session.terminate().await;
    assert_eq!(
        incoming.wait_for_state(SessionState::Terminated).await,
        SessionState::Terminated
    );

    alice.shutdown().await;
    bob.shutdown().await;
}

/// A bare transport endpoint posing as the remote side, for driving the
/// engine with traffic no healthy peer would send.
struct RawPeer {
    transport: ChannelTransport,
    events: mpsc::Receiver<TransportEvent>,
    engine_addr: SocketAddr,
}

impl RawPeer {
    async fn send(&self, request: SipRequest) {
        self.transport
            .send_message(request.into(), self.engine_addr)
            .await
            .unwrap();
    }

    async fn next_response(&mut self) -> SipResponse {
        loop {
            let event = timeout(TEST_WAIT, self.events.recv())
                .await
                .expect("timed out waiting for a response")
                .expect("peer transport closed");
            if let TransportEvent::MessageReceived {
                message: SipMessage::Response(response),
                ..
            } = event
            {
                return response;
            }
        }
    }
}

fn engine_with_raw_peer() -> (Arc<ImEngine>, RawPeer) {
    init_tracing();
    let engine_addr: SocketAddr = "10.0.0.1:5060".parse().unwrap();
    let peer_addr: SocketAddr = "10.0.0.2:5060".parse().unwrap();
    let ((transport, events), (peer_transport, peer_events)) =
        ChannelTransport::pair(engine_addr, peer_addr);
    let msrp = ChannelMsrpNetwork::new();

    let engine = ImEngine::new(
        EngineConfig::new("alice", "10.0.0.1", peer_addr),
        Arc::new(transport),
        events,
        Arc::new(msrp.connector("10.0.0.1")),
        Arc::new(InMemoryMessageLog::new()),
    );
    let peer = RawPeer {
        transport: peer_transport,
        events: peer_events,
        engine_addr,
    };
    (engine, peer)
}

fn raw_invite(call_id: &str, cseq: u32) -> SipRequest {
    SipRequest::new(
        Method::Invite,
        SipUri::new("alice", "10.0.0.1"),
        NameAddr::new(SipUri::new("bob", "10.0.0.2")).with_tag("raw-tag"),
        NameAddr::new(SipUri::new("alice", "10.0.0.1")),
        call_id.into(),
        cseq,
    )
    .with_via(Via::new("TCP", "10.0.0.2:5060").with_branch(generate_branch()))
    .with_contact(NameAddr::new(SipUri::new("bob", "10.0.0.2").with_port(5060)))
}

#[tokio::test]
async fn test_invite_without_usable_offer_refused() {
    let (engine, mut peer) = engine_with_raw_peer();

    // No SDP at all.
    peer.send(raw_invite("raw-1@10.0.0.2", 1)).await;
    assert_eq!(peer.next_response().await.status, StatusCode::NotAcceptableHere);

    // A body that does not parse as SDP.
    peer.send(
        raw_invite("raw-2@10.0.0.2", 1)
            .with_content_type("application/sdp")
            .with_body("this is not a session description"),
    )
    .await;
    assert_eq!(peer.next_response().await.status, StatusCode::NotAcceptableHere);

    // An in-dialog request for a dialog nobody has.
    let bye = SipRequest::new(
        Method::Bye,
        SipUri::new("alice", "10.0.0.1"),
        NameAddr::new(SipUri::new("bob", "10.0.0.2")).with_tag("raw-tag"),
        NameAddr::new(SipUri::new("alice", "10.0.0.1")).with_tag("gone"),
        "raw-3@10.0.0.2".into(),
        2,
    )
    .with_via(Via::new("TCP", "10.0.0.2:5060").with_branch(generate_branch()));
    peer.send(bye).await;
    assert_eq!(
        peer.next_response().await.status,
        StatusCode::TemporarilyUnavailable
    );

    engine.shutdown().await;
}

const RAW_OFFER: &str = "v=0\r\n\
    o=raw 1 1 IN IP4 10.0.0.2\r\n\
    s=-\r\n\
    c=IN IP4 10.0.0.2\r\n\
    t=0 0\r\n\
    m=message 2855 TCP/MSRP *\r\n\
    a=accept-types:message/cpim\r\n\
    a=path:msrp://10.0.0.2:2855/raw;tcp\r\n\
    a=setup:actpass\r\n";

#[tokio::test(start_paused = true)]
async fn test_second_invite_for_same_call_id_busy() {
    let (engine, mut peer) = engine_with_raw_peer();

    peer.send(
        raw_invite("raw-busy@10.0.0.2", 1)
            .with_content_type("application/sdp")
            .with_body(RAW_OFFER),
    )
    .await;
    assert_eq!(peer.next_response().await.status, StatusCode::Ringing);
    assert_eq!(peer.next_response().await.status, StatusCode::Ok);

    // Same Call-ID again while the first session is still alive.
    peer.send(
        raw_invite("raw-busy@10.0.0.2", 2)
            .with_content_type("application/sdp")
            .with_body(RAW_OFFER),
    )
    .await;
    assert_eq!(peer.next_response().await.status, StatusCode::BusyHere);

    engine.shutdown().await;
}
