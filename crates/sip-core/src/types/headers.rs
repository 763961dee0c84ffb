//! # Typed headers and the extension-header container
//!
//! The headers the dialog/transaction layer keys on (`Call-ID`, `CSeq`,
//! `Via`) get dedicated types; everything else a message carries is kept
//! verbatim, in order, inside [`Headers`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::method::Method;

/// The `Call-ID` header value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    /// Wrap a call-id string
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The call-id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CallId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The `CSeq` header: sequence number plus the method it numbers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CSeq {
    /// Sequence number, monotonic within a dialog
    pub seq: u32,
    /// Method of the request this sequence number belongs to
    pub method: Method,
}

impl CSeq {
    /// Create a CSeq value
    pub fn new(seq: u32, method: Method) -> Self {
        Self { seq, method }
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.seq, self.method)
    }
}

impl FromStr for CSeq {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split_whitespace();
        let seq = parts
            .next()
            .ok_or_else(|| Error::invalid_header("CSeq", "empty value"))?
            .parse::<u32>()
            .map_err(|_| Error::invalid_header("CSeq", "sequence is not a number"))?;
        let method = parts
            .next()
            .ok_or_else(|| Error::invalid_header("CSeq", "missing method"))?;
        if parts.next().is_some() {
            return Err(Error::invalid_header("CSeq", "trailing tokens"));
        }
        Ok(CSeq::new(seq, Method::from_str(method)?))
    }
}

/// One `Via` header entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Via {
    /// Transport token after `SIP/2.0/`, e.g. `TCP`
    pub transport: String,
    /// The `host[:port]` this message was sent by
    pub sent_by: String,
    /// The `branch` parameter, if present
    pub branch: Option<String>,
}

impl Via {
    /// Create a Via entry
    pub fn new(transport: impl Into<String>, sent_by: impl Into<String>) -> Self {
        Self { transport: transport.into(), sent_by: sent_by.into(), branch: None }
    }

    /// Set the branch parameter
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0/{} {}", self.transport, self.sent_by)?;
        if let Some(branch) = &self.branch {
            write!(f, ";branch={}", branch)?;
        }
        Ok(())
    }
}

impl FromStr for Via {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let rest = s
            .strip_prefix("SIP/2.0/")
            .ok_or_else(|| Error::invalid_header("Via", "missing protocol prefix"))?;
        let (transport, rest) = rest
            .split_once(' ')
            .ok_or_else(|| Error::invalid_header("Via", "missing sent-by"))?;
        let mut params = rest.split(';');
        let sent_by = params
            .next()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::invalid_header("Via", "missing sent-by"))?;
        let mut branch = None;
        for param in params {
            if let Some(value) = param.trim().strip_prefix("branch=") {
                branch = Some(value.to_string());
            }
        }
        Ok(Via {
            transport: transport.to_string(),
            sent_by: sent_by.to_string(),
            branch,
        })
    }
}

/// Order-preserving container for headers without a dedicated type.
///
/// Lookup is case-insensitive; duplicates are kept (SIP allows repeated
/// headers) and returned in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Create an empty container
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a header, keeping any existing entries with the same name
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Replace every entry with this name by a single one
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.0.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.0.push((name, value.into()));
    }

    /// First value for this name, if any
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for this name, in order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Remove every entry with this name
    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Iterate over `(name, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of stored headers
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the container is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
