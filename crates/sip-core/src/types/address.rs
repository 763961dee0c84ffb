//! # Name-addr values (From / To / Contact)
//!
//! A [`NameAddr`] is a URI plus optional display name and header
//! parameters. The `tag` parameter is the piece the dialog layer cares
//! about: together with the call-id it identifies a dialog.
//!
//! ## Examples
//!
//! ```rust
//! use rims_sip_core::types::NameAddr;
//! use std::str::FromStr;
//!
//! let from = NameAddr::from_str("\"Alice\" <sip:alice@example.com>;tag=9fxced76sl").unwrap();
//! assert_eq!(from.display_name.as_deref(), Some("Alice"));
//! assert_eq!(from.tag(), Some("9fxced76sl"));
//! ```

use std::fmt;
use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{take_till1, take_while1},
    character::complete::{char, space0},
    combinator::{all_consuming, map, opt},
    multi::many0,
    sequence::{delimited, preceded, separated_pair, terminated},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::uri::SipUri;

/// A display name + URI + parameters, as used in From/To/Contact headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAddr {
    /// Optional display name (without quotes)
    pub display_name: Option<String>,
    /// The address itself
    pub uri: SipUri,
    /// Header parameters in order of appearance (`tag` lives here)
    pub params: Vec<(String, Option<String>)>,
}

impl NameAddr {
    /// Wrap a URI with no display name and no parameters
    pub fn new(uri: SipUri) -> Self {
        Self { display_name: None, uri, params: Vec::new() }
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the `tag` parameter, replacing any existing one
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.set_tag(tag);
        self
    }

    /// Set the `tag` parameter in place, replacing any existing one
    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.params.retain(|(n, _)| !n.eq_ignore_ascii_case("tag"));
        self.params.push(("tag".to_string(), Some(tag.into())));
    }

    /// The `tag` parameter, if present
    pub fn tag(&self) -> Option<&str> {
        self.param("tag")
    }

    /// Look up a header parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_deref())
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            write!(f, "\"{}\" ", name)?;
        }
        write!(f, "<{}>", self.uri)?;
        for (name, value) in &self.params {
            match value {
                Some(v) => write!(f, ";{}={}", name, v)?,
                None => write!(f, ";{}", name)?,
            }
        }
        Ok(())
    }
}

fn is_param_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_.!~*+`'%".contains(c)
}

fn quoted_display_name(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_till1(|c| c == '"'), char('"'))(input)
}

fn token_display_name(input: &str) -> IResult<&str, &str> {
    // Unquoted display names stop at the '<' that opens the URI
    take_while1(|c: char| is_param_char(c) || c == ' ')(input)
}

fn angle_addr(input: &str) -> IResult<&str, &str> {
    delimited(char('<'), take_till1(|c| c == '>'), char('>'))(input)
}

fn header_param(input: &str) -> IResult<&str, (String, Option<String>)> {
    preceded(
        char(';'),
        alt((
            map(
                separated_pair(take_while1(is_param_char), char('='), take_while1(is_param_char)),
                |(n, v): (&str, &str)| (n.to_string(), Some(v.to_string())),
            ),
            map(take_while1(is_param_char), |n: &str| (n.to_string(), None)),
        )),
    )(input)
}

fn name_addr(input: &str) -> IResult<&str, (Option<&str>, &str)> {
    let (input, display) = opt(terminated(
        alt((quoted_display_name, token_display_name)),
        space0,
    ))(input)?;
    let (input, uri) = angle_addr(input)?;
    Ok((input, (display, uri)))
}

fn addr_spec(input: &str) -> IResult<&str, (Option<&str>, &str)> {
    // Bare URI form: everything up to the first ';' is the URI, the rest
    // are header parameters
    map(take_till1(|c| c == ';'), |uri| (None, uri))(input)
}

impl FromStr for NameAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |input| -> IResult<&str, (Option<&str>, &str, Vec<(String, Option<String>)>)> {
            let (input, _) = space0(input)?;
            let (input, (display, uri)) = alt((name_addr, addr_spec))(input)?;
            let (input, params) = many0(header_param)(input)?;
            let (input, _) = space0(input)?;
            Ok((input, (display, uri, params)))
        };
        let (display, uri, params) = match all_consuming(parse)(s.trim()) {
            Ok((_, parts)) => parts,
            Err(_) => return Err(Error::invalid_header("name-addr", s)),
        };
        let uri = SipUri::from_str(uri)?;
        Ok(NameAddr {
            display_name: display.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            uri,
            params,
        })
    }
}
