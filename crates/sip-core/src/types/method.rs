//! # SIP Request Methods
//!
//! The request methods understood by this stack. Only the methods the
//! session core actually exchanges are modeled as variants; anything else
//! round-trips through [`Method::Extension`].
//!
//! ## Examples
//!
//! ```rust
//! use rims_sip_core::types::Method;
//! use std::str::FromStr;
//!
//! let method = Method::from_str("INVITE").unwrap();
//! assert_eq!(method, Method::Invite);
//! assert_eq!(method.to_string(), "INVITE");
//! assert!(method.creates_dialog());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A SIP request method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// INVITE - initiates a session
    Invite,
    /// ACK - acknowledges a final response to INVITE
    Ack,
    /// BYE - terminates an established session
    Bye,
    /// CANCEL - cancels a pending request
    Cancel,
    /// OPTIONS - queries capabilities, also used as a liveness probe
    Options,
    /// MESSAGE - pager-mode instant message
    Message,
    /// Any other method, preserved verbatim
    Extension(String),
}

impl Method {
    /// The canonical token for this method
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Options => "OPTIONS",
            Method::Message => "MESSAGE",
            Method::Extension(name) => name,
        }
    }

    /// Whether this method opens a dialog
    pub fn creates_dialog(&self) -> bool {
        matches!(self, Method::Invite)
    }

    /// Whether this method acknowledges a final response rather than
    /// starting a transaction of its own
    pub fn is_ack(&self) -> bool {
        matches!(self, Method::Ack)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::parser("empty method token"));
        }
        Ok(match s {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "OPTIONS" => Method::Options,
            "MESSAGE" => Method::Message,
            other => Method::Extension(other.to_string()),
        })
    }
}
