//! Client-side IMS messaging stack.
//!
//! `rims` bundles the whole stack behind one dependency: SIP messages and
//! SDP ([`sip_core`]), pluggable transports ([`sip_transport`]), the
//! transaction and dialog layer ([`dialog_core`]), MSRP media
//! ([`msrp_core`]) and the session engine tying them together
//! ([`session_core`]).
//!
//! Most applications only ever touch [`session_core`]: build an
//! [`ImEngine`](session_core::ImEngine), originate sessions or watch for
//! incoming ones, and exchange messages over the handles it returns.
//! Everything below that is plumbing the engine drives on the
//! application's behalf.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rims::prelude::*;
//!
//! # async fn run() -> Result<()> {
//! let peer = "10.0.0.2:5060".parse().unwrap();
//! let ((transport, transport_events), _peer_end) =
//!     ChannelTransport::pair("10.0.0.1:5060".parse().unwrap(), peer);
//! let msrp = ChannelMsrpNetwork::new();
//!
//! let engine = ImEngine::new(
//!     EngineConfig::new("alice", "10.0.0.1", peer),
//!     Arc::new(transport),
//!     transport_events,
//!     Arc::new(msrp.connector("10.0.0.1")),
//!     Arc::new(InMemoryMessageLog::new()),
//! );
//!
//! let session = engine.start_chat("sip:bob@10.0.0.2")?;
//! session.wait_for_state(SessionState::Established).await;
//! session.send_message("hello").await?;
//! session.terminate().await;
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub use rims_dialog_core as dialog_core;
pub use rims_msrp_core as msrp_core;
pub use rims_session_core as session_core;
pub use rims_sip_core as sip_core;
pub use rims_sip_transport as sip_transport;

/// Common imports for applications driving the engine.
pub mod prelude {
    pub use rims_msrp_core::{ChannelMsrpNetwork, MsrpConnector};
    pub use rims_session_core::prelude::*;
    pub use rims_sip_transport::{ChannelTransport, SipTransport, TransportEvent};
}
