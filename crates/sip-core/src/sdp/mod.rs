//! # SDP session descriptions
//!
//! A typed model of the line-oriented `k=v` media description used for
//! offer/answer. Only the fields the MSRP negotiation consumes are
//! modeled structurally (connection, media line, attributes); descriptive
//! lines like `o=` and `t=` are kept as opaque values.
//!
//! ## Examples
//!
//! ```rust
//! use rims_sip_core::sdp::{MediaDescription, SdpAttribute, SdpConnection, SdpSession};
//!
//! let sdp = SdpSession::new()
//!     .with_connection(SdpConnection::ip4("10.0.0.5"))
//!     .with_media(
//!         MediaDescription::new("message", 12000, "TCP/MSRP", vec!["*".into()])
//!             .with_attribute(SdpAttribute::new("setup", "active"))
//!             .with_attribute(SdpAttribute::new("path", "msrp://10.0.0.5:12000/s1;tcp")),
//!     );
//! assert!(sdp.to_string().contains("m=message 12000 TCP/MSRP *\r\n"));
//! ```

pub mod parser;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use parser::parse_sdp;

/// Offset between the NTP epoch (1900) and the Unix epoch (1970), seconds
const NTP_EPOCH_OFFSET: i64 = 2_208_988_800;

/// Seconds since 1900, the timestamp format `o=` lines use
pub fn ntp_timestamp(at: DateTime<Utc>) -> u64 {
    (at.timestamp() + NTP_EPOCH_OFFSET).max(0) as u64
}

/// A `c=` line: network type, address type, address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpConnection {
    /// Network type, normally `IN`
    pub net_type: String,
    /// Address type, normally `IP4`
    pub addr_type: String,
    /// Connection address
    pub address: String,
}

impl SdpConnection {
    /// An `IN IP4` connection line for the given address
    pub fn ip4(address: impl Into<String>) -> Self {
        Self {
            net_type: "IN".to_string(),
            addr_type: "IP4".to_string(),
            address: address.into(),
        }
    }
}

impl fmt::Display for SdpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.net_type, self.addr_type, self.address)
    }
}

/// An `a=` line: `name` or `name:value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpAttribute {
    /// Attribute name
    pub name: String,
    /// Attribute value; `None` for flag attributes like `recvonly`
    pub value: Option<String>,
}

impl SdpAttribute {
    /// A `name:value` attribute
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: Some(value.into()) }
    }

    /// A bare flag attribute
    pub fn flag(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: None }
    }
}

impl fmt::Display for SdpAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}:{}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

/// One `m=` section with its own connection and attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescription {
    /// Media type, e.g. `message`
    pub media: String,
    /// Transport port
    pub port: u16,
    /// Transport protocol, e.g. `TCP/MSRP`
    pub protocol: String,
    /// Format list (MSRP uses `*`)
    pub formats: Vec<String>,
    /// Media-level `c=` line, overrides the session-level one
    pub connection: Option<SdpConnection>,
    /// Media-level attributes in order
    pub attributes: Vec<SdpAttribute>,
}

impl MediaDescription {
    /// Create a media section
    pub fn new(
        media: impl Into<String>,
        port: u16,
        protocol: impl Into<String>,
        formats: Vec<String>,
    ) -> Self {
        Self {
            media: media.into(),
            port,
            protocol: protocol.into(),
            formats,
            connection: None,
            attributes: Vec::new(),
        }
    }

    /// Set the media-level connection line
    pub fn with_connection(mut self, connection: SdpConnection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Append an attribute
    pub fn with_attribute(mut self, attribute: SdpAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// First value of the named attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .and_then(|a| a.value.as_deref())
    }

    /// Whether the named attribute is present, value or flag
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for MediaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m={} {} {}", self.media, self.port, self.protocol)?;
        for format in &self.formats {
            write!(f, " {}", format)?;
        }
        f.write_str("\r\n")?;
        if let Some(connection) = &self.connection {
            write!(f, "c={}\r\n", connection)?;
        }
        for attribute in &self.attributes {
            write!(f, "a={}\r\n", attribute)?;
        }
        Ok(())
    }
}

/// A whole session description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpSession {
    /// Protocol version (`v=`), always 0
    pub version: u8,
    /// Origin line value (`o=`), kept opaque
    pub origin: String,
    /// Session name (`s=`)
    pub session_name: String,
    /// Session-level connection (`c=`)
    pub connection: Option<SdpConnection>,
    /// Timing line value (`t=`), kept opaque
    pub timing: String,
    /// Session-level attributes in order
    pub attributes: Vec<SdpAttribute>,
    /// Media sections in order
    pub media: Vec<MediaDescription>,
}

impl SdpSession {
    /// An empty description with the customary placeholder values
    pub fn new() -> Self {
        Self {
            version: 0,
            origin: "- 0 0 IN IP4 0.0.0.0".to_string(),
            session_name: "-".to_string(),
            connection: None,
            timing: "0 0".to_string(),
            attributes: Vec::new(),
            media: Vec::new(),
        }
    }

    /// Set the origin line value
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Set the session-level connection line
    pub fn with_connection(mut self, connection: SdpConnection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Append a session-level attribute
    pub fn with_attribute(mut self, attribute: SdpAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Append a media section
    pub fn with_media(mut self, media: MediaDescription) -> Self {
        self.media.push(media);
        self
    }

    /// First value of the named session-level attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .and_then(|a| a.value.as_deref())
    }

    /// The first media section, where offer/answer negotiation happens
    pub fn first_media(&self) -> Option<&MediaDescription> {
        self.media.first()
    }

    /// Connection address for a media section: the media-level `c=` wins,
    /// otherwise the session-level one applies
    pub fn connection_address<'a>(&'a self, media: &'a MediaDescription) -> Option<&'a str> {
        media
            .connection
            .as_ref()
            .or(self.connection.as_ref())
            .map(|c| c.address.as_str())
    }
}

impl Default for SdpSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SdpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v={}\r\n", self.version)?;
        write!(f, "o={}\r\n", self.origin)?;
        write!(f, "s={}\r\n", self.session_name)?;
        if let Some(connection) = &self.connection {
            write!(f, "c={}\r\n", connection)?;
        }
        write!(f, "t={}\r\n", self.timing)?;
        for attribute in &self.attributes {
            write!(f, "a={}\r\n", attribute)?;
        }
        for media in &self.media {
            media.fmt(f)?;
        }
        Ok(())
    }
}
