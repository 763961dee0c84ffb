//! MSRP media plane for the RIMS session core.
//!
//! Chat payloads travel over MSRP, not in SIP bodies. This crate owns that
//! plane end to end:
//!
//! - [`chunk`]: the chunk model and incremental wire codec.
//! - [`transport`]: the [`MsrpConnector`]/[`MsrpStream`] seam plus the
//!   in-process implementation used by tests and embedders.
//! - [`session`]: a connected session that sends messages and yields
//!   incoming SEND chunks.
//! - [`manager`]: role-aware setup (dial or listen, with cancellation and
//!   timeouts) producing open sessions.
//!
//! Negotiation of who dials whom happens in SDP, one layer up; this crate
//! takes the outcome as an [`MsrpEndpoint`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rims_msrp_core::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let network = ChannelMsrpNetwork::new();
//! let manager = MsrpManager::new(
//!     Arc::new(network.connector("10.0.0.1")),
//!     MsrpConfig::default(),
//! );
//!
//! let endpoint = MsrpEndpoint {
//!     role: MsrpRole::Active,
//!     remote_host: "10.0.0.2".to_string(),
//!     remote_port: 2855,
//!     local_port: 2855,
//!     local_path: msrp_uri("10.0.0.1", 2855, "s1"),
//!     remote_path: msrp_uri("10.0.0.2", 2855, "s2"),
//! };
//!
//! let mut session = manager.open(&endpoint, &CancellationToken::new()).await?;
//! session.send_message("m-1", "message/cpim", "hello").await?;
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod error;
pub mod manager;
pub mod session;
pub mod transport;

pub use chunk::{
    generate_message_id, generate_transaction_id, msrp_uri, ByteRange, ChunkDecoder, ChunkKind,
    Continuation, MsrpChunk,
};
pub use error::{MsrpError, Result};
pub use manager::{MsrpConfig, MsrpEndpoint, MsrpManager, MsrpRole};
pub use session::MsrpSession;
pub use transport::{ChannelMsrpConnector, ChannelMsrpNetwork, ChannelMsrpStream, MsrpConnector, MsrpStream};

/// Common imports for working with MSRP media.
pub mod prelude {
    pub use crate::chunk::{msrp_uri, ChunkKind, Continuation, MsrpChunk};
    pub use crate::error::{MsrpError, Result};
    pub use crate::manager::{MsrpConfig, MsrpEndpoint, MsrpManager, MsrpRole};
    pub use crate::session::MsrpSession;
    pub use crate::transport::{ChannelMsrpNetwork, MsrpConnector, MsrpStream};
}
