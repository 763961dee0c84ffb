//! In-memory, pair-connected transport.
//!
//! [`ChannelTransport::pair`] creates two connected endpoints that move
//! serialized SIP messages over `tokio::sync::mpsc` channels. Each endpoint
//! behaves exactly like a socket-backed transport: it owns a receive loop,
//! parses inbound frames, and reports them as [`TransportEvent`]s. The engine
//! and its tests run against this transport without opening a single socket.
//!
//! # Example
//!
//! ```rust,no_run
//! use rims_sip_transport::channel::ChannelTransport;
//! use rims_sip_transport::transport::{SipTransport, TransportEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let alice = "10.0.0.1:5060".parse()?;
//! let bob = "10.0.0.2:5060".parse()?;
//! let ((a, mut a_events), (b, _b_events)) = ChannelTransport::pair(alice, bob);
//!
//! // Messages sent by `b` arrive as events on `a_events`.
//! while let Some(event) = a_events.recv().await {
//!     if let TransportEvent::MessageReceived { message, .. } = event {
//!         println!("received {:?}", message.method());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use rims_sip_core::parser::parse_message;
use rims_sip_core::SipMessage;

use crate::error::{Result, TransportError};
use crate::transport::{SipTransport, TransportEvent, DEFAULT_CHANNEL_CAPACITY, KEEP_ALIVE_PROBE};

/// Internal state shared between clones of a [`ChannelTransport`].
struct ChannelTransportInner {
    /// Local address of this endpoint
    local_addr: SocketAddr,
    /// Address of the connected peer
    peer_addr: SocketAddr,
    /// Raw byte frames toward the peer's receive loop
    wire_tx: mpsc::Sender<Bytes>,
    /// Whether this endpoint has been closed
    closed: AtomicBool,
    /// Cancels the receive loop on close
    cancel: CancellationToken,
}

/// One endpoint of an in-memory transport pair.
#[derive(Clone)]
pub struct ChannelTransport {
    inner: Arc<ChannelTransportInner>,
}

impl ChannelTransport {
    /// Create a connected pair of endpoints with default channel capacity.
    ///
    /// Returns each endpoint together with the receiver for its
    /// [`TransportEvent`]s.
    #[allow(clippy::type_complexity)]
    pub fn pair(
        addr_a: SocketAddr,
        addr_b: SocketAddr,
    ) -> (
        (Self, mpsc::Receiver<TransportEvent>),
        (Self, mpsc::Receiver<TransportEvent>),
    ) {
        Self::pair_with_capacity(addr_a, addr_b, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a connected pair with an explicit channel capacity.
    #[allow(clippy::type_complexity)]
    pub fn pair_with_capacity(
        addr_a: SocketAddr,
        addr_b: SocketAddr,
        capacity: usize,
    ) -> (
        (Self, mpsc::Receiver<TransportEvent>),
        (Self, mpsc::Receiver<TransportEvent>),
    ) {
        let (wire_a_tx, wire_a_rx) = mpsc::channel(capacity);
        let (wire_b_tx, wire_b_rx) = mpsc::channel(capacity);
        let (events_a_tx, events_a_rx) = mpsc::channel(capacity);
        let (events_b_tx, events_b_rx) = mpsc::channel(capacity);

        let a = Self::endpoint(addr_a, addr_b, wire_b_tx, wire_a_rx, events_a_tx);
        let b = Self::endpoint(addr_b, addr_a, wire_a_tx, wire_b_rx, events_b_tx);

        ((a, events_a_rx), (b, events_b_rx))
    }

    fn endpoint(
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        wire_tx: mpsc::Sender<Bytes>,
        wire_rx: mpsc::Receiver<Bytes>,
        events_tx: mpsc::Sender<TransportEvent>,
    ) -> Self {
        let inner = Arc::new(ChannelTransportInner {
            local_addr,
            peer_addr,
            wire_tx,
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        });
        spawn_receive_loop(inner.clone(), wire_rx, events_tx);
        Self { inner }
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    /// Clone of the raw byte channel toward the peer.
    ///
    /// Lets tests inject arbitrary frames into the peer's receive loop,
    /// including malformed ones.
    pub fn wire_sender(&self) -> mpsc::Sender<Bytes> {
        self.inner.wire_tx.clone()
    }
}

/// Spawn the receive loop translating wire frames into transport events.
fn spawn_receive_loop(
    inner: Arc<ChannelTransportInner>,
    mut wire_rx: mpsc::Receiver<Bytes>,
    events_tx: mpsc::Sender<TransportEvent>,
) {
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = inner.cancel.cancelled() => break,
                frame = wire_rx.recv() => match frame {
                    Some(frame) => frame,
                    // Peer endpoint dropped; treat as connection close.
                    None => break,
                },
            };

            if frame.as_ref() == KEEP_ALIVE_PROBE {
                trace!(local = %inner.local_addr, "keep-alive probe received");
                continue;
            }

            match parse_message(&frame) {
                Ok(message) => {
                    trace!(
                        local = %inner.local_addr,
                        peer = %inner.peer_addr,
                        bytes = frame.len(),
                        "message received"
                    );
                    let event = TransportEvent::MessageReceived {
                        message,
                        source: inner.peer_addr,
                        destination: inner.local_addr,
                    };
                    if events_tx.send(event).await.is_err() {
                        debug!(local = %inner.local_addr, "event receiver dropped, stopping receive loop");
                        break;
                    }
                }
                Err(e) => {
                    warn!(local = %inner.local_addr, error = %e, "discarding unparseable frame");
                    let event = TransportEvent::Error {
                        error: format!("failed to parse message: {e}"),
                    };
                    if events_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }

        inner.closed.store(true, Ordering::Release);
        let _ = events_tx.send(TransportEvent::Closed).await;
        debug!(local = %inner.local_addr, "receive loop terminated");
    });
}

#[async_trait]
impl SipTransport for ChannelTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr)
    }

    async fn send_message(&self, message: SipMessage, destination: SocketAddr) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if destination != self.inner.peer_addr {
            return Err(TransportError::invalid_destination(
                destination,
                "not the connected peer",
            ));
        }

        let bytes = Bytes::from(message.to_bytes());
        trace!(
            local = %self.inner.local_addr,
            peer = %destination,
            bytes = bytes.len(),
            "sending message"
        );
        self.inner
            .wire_tx
            .send(bytes)
            .await
            .map_err(|_| TransportError::channel_closed("peer receive loop is gone"))
    }

    async fn send_probe(&self) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.inner
            .wire_tx
            .send(Bytes::from_static(KEEP_ALIVE_PROBE))
            .await
            .map_err(|_| TransportError::channel_closed("peer receive loop is gone"))
    }

    async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(local = %self.inner.local_addr, "closing transport");
        self.inner.cancel.cancel();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("local_addr", &self.inner.local_addr)
            .field("peer_addr", &self.inner.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rims_sip_core::types::{CallId, Method, NameAddr, SipRequest, SipUri};

    fn addrs() -> (SocketAddr, SocketAddr) {
        ("10.0.0.1:5060".parse().unwrap(), "10.0.0.2:5060".parse().unwrap())
    }

    fn sample_request() -> SipRequest {
        SipRequest::new(
            Method::Message,
            SipUri::new("bob", "10.0.0.2"),
            NameAddr::new(SipUri::new("alice", "10.0.0.1")).with_tag("a1"),
            NameAddr::new(SipUri::new("bob", "10.0.0.2")),
            CallId::from("ct-test@10.0.0.1"),
            1,
        )
    }

    #[tokio::test]
    async fn test_pair_roundtrip() {
        let (alice, bob) = addrs();
        let ((a, _a_events), (_b, mut b_events)) = ChannelTransport::pair(alice, bob);

        a.send_message(sample_request().into(), bob).await.unwrap();

        match b_events.recv().await.unwrap() {
            TransportEvent::MessageReceived {
                message,
                source,
                destination,
            } => {
                assert_eq!(message.method(), Some(&Method::Message));
                assert_eq!(source, alice);
                assert_eq!(destination, bob);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_probe_is_invisible() {
        let (alice, bob) = addrs();
        let ((a, _a_events), (_b, mut b_events)) = ChannelTransport::pair(alice, bob);

        a.send_probe().await.unwrap();
        a.send_message(sample_request().into(), bob).await.unwrap();

        // The probe must not surface as an event; the first thing seen is the
        // real message.
        match b_events.recv().await.unwrap() {
            TransportEvent::MessageReceived { message, .. } => {
                assert_eq!(message.method(), Some(&Method::Message));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_yields_error_event() {
        let (alice, bob) = addrs();
        let ((a, _a_events), (_b, mut b_events)) = ChannelTransport::pair(alice, bob);

        a.wire_sender()
            .send(Bytes::from_static(b"not a sip message"))
            .await
            .unwrap();

        match b_events.recv().await.unwrap() {
            TransportEvent::Error { error } => {
                assert!(error.contains("failed to parse"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_emits_closed() {
        let (alice, bob) = addrs();
        let ((a, mut a_events), (_b, _b_events)) = ChannelTransport::pair(alice, bob);

        a.close().await.unwrap();
        a.close().await.unwrap();
        assert!(a.is_closed());

        match a_events.recv().await.unwrap() {
            TransportEvent::Closed => {}
            other => panic!("unexpected event: {other:?}"),
        }

        let err = a.send_message(sample_request().into(), bob).await.unwrap_err();
        assert_eq!(err, TransportError::Closed);
    }

    #[tokio::test]
    async fn test_send_to_wrong_destination_rejected() {
        let (alice, bob) = addrs();
        let ((a, _a_events), (_b, _b_events)) = ChannelTransport::pair(alice, bob);

        let elsewhere: SocketAddr = "192.0.2.99:5060".parse().unwrap();
        let err = a
            .send_message(sample_request().into(), elsewhere)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidDestination { .. }));
    }

    #[tokio::test]
    async fn test_peer_close_closes_receive_loop() {
        let (alice, bob) = addrs();
        let ((a, mut a_events), (b, b_events)) = ChannelTransport::pair(alice, bob);

        // Closing the peer endpoint drops its half of the wire, which our
        // receive loop observes as a close.
        b.close().await.unwrap();
        drop(b);
        drop(b_events);

        match a_events.recv().await.unwrap() {
            TransportEvent::Closed => {}
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(a.is_closed());
    }
}
