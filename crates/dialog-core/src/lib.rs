//! Dialog and transaction layer for the RIMS session core.
//!
//! This crate sits between the transport and the session logic. It tracks
//! one [`DialogPath`] per session (Call-ID, tags, CSeq, remote target),
//! matches answers to pending sends through the [`transaction`] registry,
//! and routes everything through a single [`SipManager`] per engine.
//!
//! The model is deliberately client-sized: no proxy behavior, no forking,
//! no full transaction state machines. A transaction here is "I sent this
//! and exactly one of a final response, an ACK, or a timeout will finish
//! it".
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rims_dialog_core::prelude::*;
//! use rims_sip_core::types::{NameAddr, SipUri};
//! use rims_sip_transport::ChannelTransport;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let alice = "10.0.0.1:5060".parse()?;
//! let bob = "10.0.0.2:5060".parse()?;
//! let ((transport, events), _peer) = ChannelTransport::pair(alice, bob);
//!
//! let manager = SipManager::new(Arc::new(transport), ManagerConfig::default());
//! manager.start(events);
//!
//! let mut dialog = DialogPath::originating(
//!     NameAddr::new(SipUri::new("alice", "10.0.0.1")),
//!     NameAddr::new(SipUri::new("bob", "10.0.0.2")),
//!     "10.0.0.1:5060",
//! );
//! let invite = requests::invite(
//!     &mut dialog,
//!     NameAddr::new(SipUri::new("alice", "10.0.0.1")),
//!     "application/sdp",
//!     "v=0\r\n",
//! );
//! match manager.send_and_wait(invite, bob).await? {
//!     TransactionOutcome::Response(response) => println!("got {}", response.status),
//!     TransactionOutcome::Ack(_) => unreachable!("requests complete with responses"),
//!     TransactionOutcome::Timeout => println!("peer never answered"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dialog;
pub mod error;
pub mod manager;
pub mod requests;
pub mod transaction;

pub use config::ManagerConfig;
pub use dialog::DialogPath;
pub use error::{DialogError, Result};
pub use manager::{SipManager, SipRequestListener};
pub use transaction::{TransactionHandle, TransactionKey, TransactionOutcome, TransactionRegistry};

/// Common imports for working with dialogs and transactions.
pub mod prelude {
    pub use crate::config::ManagerConfig;
    pub use crate::dialog::DialogPath;
    pub use crate::error::{DialogError, Result};
    pub use crate::manager::{SipManager, SipRequestListener};
    pub use crate::requests;
    pub use crate::transaction::{TransactionHandle, TransactionKey, TransactionOutcome};
}
