//! Client-side IMS instant-messaging session engine.
//!
//! This crate is where the planes meet: SIP signaling from
//! `rims-dialog-core`, MSRP media from `rims-msrp-core`, and SDP
//! negotiation over `rims-sip-core` types come together into sessions an
//! application can hold in one hand.
//!
//! - [`engine`]: the [`ImEngine`] entry point; originates sessions, accepts
//!   incoming ones, owns shutdown.
//! - [`session`]: the [`ImsSession`] handle and the per-session task behind
//!   it.
//! - [`state`]: the session lifecycle state machine.
//! - [`media`]: MSRP-over-SDP offer/answer negotiation.
//! - [`chat`]: CPIM envelopes and IMDN receipts.
//! - [`handlers`]: pluggable per-kind payload behavior.
//! - [`delivery`]: the message log and delivery outcomes.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rims_msrp_core::ChannelMsrpNetwork;
//! use rims_session_core::prelude::*;
//! use rims_sip_transport::ChannelTransport;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let local = "10.0.0.1:5060".parse()?;
//! let peer = "10.0.0.2:5060".parse()?;
//! let ((transport, events), _peer_end) = ChannelTransport::pair(local, peer);
//! let network = ChannelMsrpNetwork::new();
//!
//! let engine = ImEngine::new(
//!     EngineConfig::new("alice", "10.0.0.1", peer),
//!     Arc::new(transport),
//!     events,
//!     Arc::new(network.connector("10.0.0.1")),
//!     Arc::new(InMemoryMessageLog::new()),
//! );
//!
//! let session = engine.start_chat("sip:bob@10.0.0.2")?;
//! session.wait_for_state(SessionState::Established).await;
//! let message_id = session.send_message("hello").await?;
//! println!("sent {message_id}");
//!
//! session.terminate().await;
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod chat;
pub mod config;
pub mod delivery;
mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod handlers;
pub mod media;
pub mod registry;
pub mod session;
pub mod state;

pub use chat::{CpimMessage, ImdnDocument, ImdnStatus, CPIM_CONTENT_TYPE, IMDN_CONTENT_TYPE};
pub use config::EngineConfig;
pub use delivery::{ChatMessage, DeliveryOutcome, InMemoryMessageLog, LogEntry, MessageLog};
pub use engine::ImEngine;
pub use error::{Result, SessionError, SessionErrorKind};
pub use events::{EndReason, EngineEvent, SessionEvent};
pub use handlers::{
    ChatHandler, FileTransferHandler, HandlerSet, SessionHandler, StoreAndForwardHandler,
};
pub use media::{MediaDirection, SetupRole};
pub use session::{ImsSession, SessionContext, SessionId, SessionKind, FILE_TRANSFER_ACCEPT_TYPE};
pub use state::SessionState;

/// Common imports for running the engine.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::delivery::{ChatMessage, DeliveryOutcome, InMemoryMessageLog, MessageLog};
    pub use crate::engine::ImEngine;
    pub use crate::error::{Result, SessionError, SessionErrorKind};
    pub use crate::events::{EndReason, EngineEvent, SessionEvent};
    pub use crate::handlers::{HandlerSet, SessionHandler};
    pub use crate::session::{ImsSession, SessionContext, SessionId, SessionKind};
    pub use crate::state::SessionState;
}
