//! Media setup: turning a negotiated endpoint into an open session.
//!
//! [`MsrpManager::open`] performs the role-dependent half of session setup.
//! The active side dials the peer's advertised host and port; the passive
//! side listens on its own port and waits for the peer to show up. Both
//! paths honor a cancellation token (session teardown can land while media
//! is still opening) and a timeout, and both finish by sending the empty
//! probe chunk that exercises the new connection.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{MsrpError, Result};
use crate::session::MsrpSession;
use crate::transport::MsrpConnector;

/// Which side of the connection we take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsrpRole {
    /// We dial the peer.
    Active,
    /// We listen; the peer dials us.
    Passive,
}

/// Everything negotiation produced that media setup needs.
#[derive(Debug, Clone)]
pub struct MsrpEndpoint {
    /// Our role in connection establishment.
    pub role: MsrpRole,
    /// Peer host, from its SDP connection line.
    pub remote_host: String,
    /// Peer port, from its media line.
    pub remote_port: u16,
    /// Our listening port; meaningful for the passive role.
    pub local_port: u16,
    /// Our MSRP path.
    pub local_path: String,
    /// The peer's MSRP path.
    pub remote_path: String,
}

/// Timeouts for media setup.
#[derive(Debug, Clone)]
pub struct MsrpConfig {
    /// How long the active side waits for its dial to complete.
    pub connect_timeout: Duration,
    /// How long the passive side waits for the peer to connect.
    pub accept_timeout: Duration,
}

impl Default for MsrpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            accept_timeout: Duration::from_secs(30),
        }
    }
}

/// Opens MSRP sessions according to negotiated roles.
#[derive(Clone)]
pub struct MsrpManager {
    connector: Arc<dyn MsrpConnector>,
    config: MsrpConfig,
}

impl MsrpManager {
    /// Create a manager dialing and listening through `connector`.
    pub fn new(connector: Arc<dyn MsrpConnector>, config: MsrpConfig) -> Self {
        Self { connector, config }
    }

    /// Open the media session for `endpoint`.
    ///
    /// Checks `cancel` immediately before doing anything, so a session
    /// already being torn down never opens media, and aborts mid-setup if
    /// the token fires while connecting or accepting.
    pub async fn open(
        &self,
        endpoint: &MsrpEndpoint,
        cancel: &CancellationToken,
    ) -> Result<MsrpSession> {
        if cancel.is_cancelled() {
            return Err(MsrpError::Aborted);
        }

        let stream = match endpoint.role {
            MsrpRole::Active => {
                debug!(
                    host = %endpoint.remote_host,
                    port = endpoint.remote_port,
                    "dialing peer"
                );
                let dial = self
                    .connector
                    .connect(&endpoint.remote_host, endpoint.remote_port);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(MsrpError::Aborted),
                    result = tokio::time::timeout(self.config.connect_timeout, dial) => {
                        result.map_err(|_| {
                            MsrpError::timeout(format!(
                                "connecting to {}:{}",
                                endpoint.remote_host, endpoint.remote_port
                            ))
                        })??
                    }
                }
            }
            MsrpRole::Passive => {
                debug!(port = endpoint.local_port, "waiting for peer to connect");
                let listen = self.connector.accept(endpoint.local_port);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(MsrpError::Aborted),
                    result = tokio::time::timeout(self.config.accept_timeout, listen) => {
                        result.map_err(|_| {
                            MsrpError::timeout(format!(
                                "waiting for peer on port {}",
                                endpoint.local_port
                            ))
                        })??
                    }
                }
            }
        };

        let mut session = MsrpSession::new(
            stream,
            endpoint.local_path.clone(),
            endpoint.remote_path.clone(),
        );
        session.probe().await?;
        info!(
            local_path = %endpoint.local_path,
            role = ?endpoint.role,
            "media session open"
        );
        Ok(session)
    }
}
