//! # SIP URIs
//!
//! A deliberately small URI model: scheme, optional user part, host,
//! optional port and a flat parameter list. That is everything the session
//! core routes on.
//!
//! ## Examples
//!
//! ```rust
//! use rims_sip_core::types::SipUri;
//! use std::str::FromStr;
//!
//! let uri = SipUri::from_str("sip:alice@example.com:5060;transport=tcp").unwrap();
//! assert_eq!(uri.user.as_deref(), Some("alice"));
//! assert_eq!(uri.host, "example.com");
//! assert_eq!(uri.port, Some(5060));
//! assert_eq!(uri.param("transport"), Some("tcp"));
//! ```

use std::fmt;
use std::str::FromStr;

use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::char,
    combinator::{all_consuming, map_res, opt},
    multi::many0,
    sequence::{preceded, separated_pair},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A SIP URI (`sip:user@host:port;param=value`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SipUri {
    /// URI scheme, normally `sip`
    pub scheme: String,
    /// Optional user part before the `@`
    pub user: Option<String>,
    /// Host name or address
    pub host: String,
    /// Optional port
    pub port: Option<u16>,
    /// URI parameters in order of appearance
    pub params: Vec<(String, Option<String>)>,
}

impl SipUri {
    /// Create a `sip:` URI with a user and host part
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: "sip".to_string(),
            user: Some(user.into()),
            host: host.into(),
            port: None,
            params: Vec::new(),
        }
    }

    /// Create a `sip:` URI with only a host part
    pub fn from_host(host: impl Into<String>) -> Self {
        Self {
            scheme: "sip".to_string(),
            user: None,
            host: host.into(),
            port: None,
            params: Vec::new(),
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Append a URI parameter
    pub fn with_param(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.params.push((name.into(), value));
        self
    }

    /// Look up a parameter value by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_deref())
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        for (name, value) in &self.params {
            match value {
                Some(v) => write!(f, ";{}={}", name, v)?,
                None => write!(f, ";{}", name)?,
            }
        }
        Ok(())
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_.!~*+`'%".contains(c)
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_'
}

fn scheme(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric())(input)
}

fn user_part(input: &str) -> IResult<&str, &str> {
    let (input, user) = take_while1(is_token_char)(input)?;
    let (input, _) = char('@')(input)?;
    Ok((input, user))
}

fn port_part(input: &str) -> IResult<&str, u16> {
    preceded(char(':'), map_res(take_while1(|c: char| c.is_ascii_digit()), str::parse))(input)
}

fn uri_param(input: &str) -> IResult<&str, (String, Option<String>)> {
    let (input, _) = char(';')(input)?;
    let (input, (name, value)) = nom::branch::alt((
        nom::combinator::map(
            separated_pair(take_while1(is_token_char), char('='), take_while1(is_token_char)),
            |(n, v): (&str, &str)| (n.to_string(), Some(v.to_string())),
        ),
        nom::combinator::map(take_while1(is_token_char), |n: &str| (n.to_string(), None)),
    ))(input)?;
    Ok((input, (name, value)))
}

fn sip_uri(input: &str) -> IResult<&str, SipUri> {
    let (input, scheme) = scheme(input)?;
    let (input, _) = tag(":")(input)?;
    let (input, user) = opt(user_part)(input)?;
    let (input, host) = take_while1(is_host_char)(input)?;
    let (input, port) = opt(port_part)(input)?;
    let (input, params) = many0(uri_param)(input)?;
    Ok((
        input,
        SipUri {
            scheme: scheme.to_string(),
            user: user.map(str::to_string),
            host: host.to_string(),
            port,
            params,
        },
    ))
}

impl FromStr for SipUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match all_consuming(sip_uri)(s.trim()) {
            Ok((_, uri)) => Ok(uri),
            Err(_) => Err(Error::invalid_uri(s)),
        }
    }
}
