//! Byte-stream abstraction for MSRP connections.
//!
//! MSRP rides a connection-oriented byte stream. [`MsrpConnector`] hides how
//! that stream comes to exist: the active side of a session calls
//! [`connect`](MsrpConnector::connect), the passive side
//! [`accept`](MsrpConnector::accept). [`ChannelMsrpNetwork`] is the
//! in-process implementation: a registry of listening ports over which
//! endpoints hand each other paired `mpsc` byte channels, which is all the
//! engine and its tests need.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::{MsrpError, Result};

const STREAM_CAPACITY: usize = 100;

/// How long a dial keeps knocking before giving up on an unarmed port.
const DIAL_GRACE: Duration = Duration::from_secs(2);

const DIAL_RETRY: Duration = Duration::from_millis(10);

/// A bidirectional byte stream carrying MSRP chunks.
#[async_trait]
pub trait MsrpStream: Send + std::fmt::Debug {
    /// Send raw bytes toward the peer.
    async fn send(&mut self, bytes: Bytes) -> Result<()>;

    /// Receive the next batch of bytes. `Ok(None)` means the peer closed.
    async fn recv(&mut self) -> Result<Option<Bytes>>;

    /// Close the stream. The peer observes end-of-stream.
    async fn close(&mut self) -> Result<()>;
}

/// Opens MSRP streams in either direction.
#[async_trait]
pub trait MsrpConnector: Send + Sync {
    /// Actively connect to a listening peer.
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn MsrpStream>>;

    /// Listen on `port` and wait for one peer to connect.
    async fn accept(&self, port: u16) -> Result<Box<dyn MsrpStream>>;
}

/// In-process MSRP "network": a registry of listening endpoints.
///
/// Shared between the connectors of all endpoints that should be able to
/// reach each other.
#[derive(Default)]
pub struct ChannelMsrpNetwork {
    listeners: Mutex<HashMap<(String, u16), oneshot::Sender<ChannelMsrpStream>>>,
}

impl ChannelMsrpNetwork {
    /// Create an empty network.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a connector for an endpoint living at `local_host`.
    pub fn connector(self: &Arc<Self>, local_host: impl Into<String>) -> ChannelMsrpConnector {
        ChannelMsrpConnector {
            network: self.clone(),
            local_host: local_host.into(),
        }
    }

    fn register(&self, host: &str, port: u16) -> Result<oneshot::Receiver<ChannelMsrpStream>> {
        let mut listeners = self.listeners.lock();
        let key = (host.to_string(), port);
        if listeners.contains_key(&key) {
            return Err(MsrpError::accept(port, "port already in use"));
        }
        let (tx, rx) = oneshot::channel();
        listeners.insert(key, tx);
        trace!(host, port, "listener registered");
        Ok(rx)
    }

    fn deregister(&self, host: &str, port: u16) {
        self.listeners.lock().remove(&(host.to_string(), port));
    }

    fn dial(&self, host: &str, port: u16) -> Result<ChannelMsrpStream> {
        let listener = self
            .listeners
            .lock()
            .remove(&(host.to_string(), port))
            .ok_or_else(|| MsrpError::connect(host, port, "connection refused"))?;

        let (a, b) = ChannelMsrpStream::pair();
        listener
            .send(b)
            .map_err(|_| MsrpError::connect(host, port, "listener went away"))?;
        debug!(host, port, "in-process stream connected");
        Ok(a)
    }
}

/// Connector bound to one endpoint of a [`ChannelMsrpNetwork`].
#[derive(Clone)]
pub struct ChannelMsrpConnector {
    network: Arc<ChannelMsrpNetwork>,
    local_host: String,
}

/// Removes the listener entry if the accept future is dropped before a peer
/// connects. Disarmed on success, since the dialer already consumed the
/// entry and the port may have been reused by a newer listener.
struct ListenerGuard<'a> {
    network: &'a ChannelMsrpNetwork,
    host: &'a str,
    port: u16,
    armed: bool,
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.network.deregister(self.host, self.port);
        }
    }
}

#[async_trait]
impl MsrpConnector for ChannelMsrpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn MsrpStream>> {
        // The answer naming this port can arrive before the peer has armed
        // its listener; keep knocking for a short grace window.
        let deadline = tokio::time::Instant::now() + DIAL_GRACE;
        loop {
            match self.network.dial(host, port) {
                Ok(stream) => return Ok(Box::new(stream)),
                Err(e) if tokio::time::Instant::now() >= deadline => return Err(e),
                Err(_) => tokio::time::sleep(DIAL_RETRY).await,
            }
        }
    }

    async fn accept(&self, port: u16) -> Result<Box<dyn MsrpStream>> {
        let receiver = self.network.register(&self.local_host, port)?;
        let mut guard = ListenerGuard {
            network: &self.network,
            host: &self.local_host,
            port,
            armed: true,
        };
        let stream = receiver
            .await
            .map_err(|_| MsrpError::accept(port, "listener dropped"))?;
        guard.armed = false;
        Ok(Box::new(stream))
    }
}

/// One end of an in-process byte stream.
#[derive(Debug)]
pub struct ChannelMsrpStream {
    tx: Option<mpsc::Sender<Bytes>>,
    rx: mpsc::Receiver<Bytes>,
}

impl ChannelMsrpStream {
    /// Create a connected pair.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(STREAM_CAPACITY);
        let (b_tx, b_rx) = mpsc::channel(STREAM_CAPACITY);
        (
            Self {
                tx: Some(b_tx),
                rx: a_rx,
            },
            Self {
                tx: Some(a_tx),
                rx: b_rx,
            },
        )
    }
}

#[async_trait]
impl MsrpStream for ChannelMsrpStream {
    async fn send(&mut self, bytes: Bytes) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(MsrpError::Closed)?;
        tx.send(bytes).await.map_err(|_| MsrpError::Closed)
    }

    async fn recv(&mut self) -> Result<Option<Bytes>> {
        Ok(self.rx.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping our sender is the peer's end-of-stream.
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}
