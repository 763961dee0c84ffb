//! Signaling transport for the RIMS session core.
//!
//! This crate defines the [`SipTransport`] trait the signaling layer sends
//! through, the [`TransportEvent`] stream it receives from, and two concrete
//! pieces:
//!
//! - [`channel::ChannelTransport`]: an in-memory, pair-connected transport
//!   used by tests and by embedders that feed the engine from their own I/O.
//! - [`keepalive::KeepAliveManager`]: periodic double-CRLF probing with a
//!   [`keepalive::ConnectionMonitor`] callback on failure.
//!
//! # Example
//!
//! ```rust
//! use rims_sip_transport::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let alice = "10.0.0.1:5060".parse()?;
//! let bob = "10.0.0.2:5060".parse()?;
//! let ((transport, mut events), _peer) = ChannelTransport::pair(alice, bob);
//!
//! assert_eq!(transport.local_addr()?, alice);
//! while let Some(event) = events.recv().await {
//!     match event {
//!         TransportEvent::MessageReceived { message, source, .. } => {
//!             println!("{} bytes from {}", message.to_bytes().len(), source);
//!         }
//!         TransportEvent::Error { error } => eprintln!("transport error: {error}"),
//!         TransportEvent::Closed => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod error;
pub mod keepalive;
pub mod transport;

pub use channel::ChannelTransport;
pub use error::{Result, TransportError};
pub use keepalive::{ConnectionMonitor, KeepAliveManager};
pub use transport::{SipTransport, TransportEvent, DEFAULT_CHANNEL_CAPACITY, KEEP_ALIVE_PROBE};

/// Common imports for working with transports.
pub mod prelude {
    pub use crate::channel::ChannelTransport;
    pub use crate::error::{Result, TransportError};
    pub use crate::keepalive::{ConnectionMonitor, KeepAliveManager};
    pub use crate::transport::{SipTransport, TransportEvent};
}
