//! Core transport abstraction.
//!
//! A [`SipTransport`] moves serialized SIP messages between the local engine
//! and a remote peer. Implementations own their receive loop and deliver
//! inbound traffic as [`TransportEvent`]s over a `tokio::sync::mpsc` channel
//! handed out at construction time, so the signaling layer above never touches
//! sockets directly.

use std::net::SocketAddr;

use async_trait::async_trait;
use rims_sip_core::SipMessage;

use crate::error::Result;

/// Default capacity for transport event channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Keep-alive probe payload: a double CRLF ping frame.
///
/// Peers recognize the frame and drop it without parsing; its only purpose is
/// to exercise the send path so a dead connection is noticed.
pub const KEEP_ALIVE_PROBE: &[u8] = b"\r\n\r\n";

/// Events emitted by a transport to its consumer.
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete SIP message arrived.
    MessageReceived {
        /// The parsed message
        message: SipMessage,
        /// Address the message came from
        source: SocketAddr,
        /// Local address it was received on
        destination: SocketAddr,
    },

    /// A non-fatal transport error occurred (e.g. an unparseable datagram).
    Error {
        /// Description of the error
        error: String,
    },

    /// The transport has closed; no further events will follow.
    Closed,
}

/// Abstraction over a signaling transport.
///
/// Implementations must be cheaply cloneable (internally `Arc`-backed) and
/// safe to share across tasks. Sending on a closed transport returns
/// [`TransportError::Closed`](crate::error::TransportError::Closed).
#[async_trait]
pub trait SipTransport: Send + Sync + std::fmt::Debug {
    /// Local address this transport is bound to.
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Serialize and send a message to the given destination.
    async fn send_message(&self, message: SipMessage, destination: SocketAddr) -> Result<()>;

    /// Send a keep-alive probe ([`KEEP_ALIVE_PROBE`]) to the connected peer.
    ///
    /// Used by the keep-alive manager to detect dead connections; an error
    /// here means the connection should be treated as lost.
    async fn send_probe(&self) -> Result<()>;

    /// Close the transport. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Whether the transport has been closed.
    fn is_closed(&self) -> bool;
}
