//! Transaction matching and completion.
//!
//! This module pairs outbound requests with the responses (or ACKs) that
//! answer them. There is no full RFC 3261 transaction state machine here; a
//! transaction is a key, a one-shot completion slot and a TTL, which is all a
//! client-side engine needs. See [`key`] for how messages are matched and
//! [`registry`] for the completion mechanics.

pub mod key;
pub mod registry;

pub use key::TransactionKey;
pub use registry::{TransactionHandle, TransactionOutcome, TransactionRegistry};
