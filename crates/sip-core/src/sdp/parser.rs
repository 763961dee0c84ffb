//! SDP parser.
//!
//! Lines are `<type>=<value>` with a single-character type. Parsing is
//! two-phase: a nom line splitter, then accumulation into [`SdpSession`]
//! where everything after the first `m=` line belongs to that media
//! section. Unknown line types are ignored rather than rejected: peers
//! routinely send bandwidth or encryption lines this stack does not use.

use nom::{
    bytes::complete::take_till,
    character::complete::{anychar, char},
    sequence::separated_pair,
    IResult,
};
use tracing::trace;

use crate::error::{Error, Result};
use crate::sdp::{MediaDescription, SdpAttribute, SdpConnection, SdpSession};

/// Split one SDP line into its type character and value
fn sdp_line(input: &str) -> IResult<&str, (char, &str)> {
    separated_pair(anychar, char('='), take_till(|c| c == '\r' || c == '\n'))(input)
}

/// Parse a complete session description
pub fn parse_sdp(input: &str) -> Result<SdpSession> {
    let mut session = SdpSession::new();
    session.origin.clear();
    session.timing.clear();

    for raw_line in input.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let (key, value) = match sdp_line(line) {
            Ok((rest, parsed)) if rest.is_empty() => parsed,
            _ => return Err(Error::sdp_parse(format!("malformed line: {line:?}"))),
        };
        match key {
            'v' => {
                session.version = value
                    .parse()
                    .map_err(|_| Error::sdp_parse(format!("bad version: {value:?}")))?
            }
            'o' => session.origin = value.to_string(),
            's' => session.session_name = value.to_string(),
            't' => session.timing = value.to_string(),
            'c' => {
                let connection = parse_connection(value)?;
                match session.media.last_mut() {
                    Some(media) => media.connection = Some(connection),
                    None => session.connection = Some(connection),
                }
            }
            'a' => {
                let attribute = parse_attribute(value);
                match session.media.last_mut() {
                    Some(media) => media.attributes.push(attribute),
                    None => session.attributes.push(attribute),
                }
            }
            'm' => session.media.push(parse_media_line(value)?),
            other => trace!(line_type = %other, "ignoring sdp line"),
        }
    }

    Ok(session)
}

/// `c=IN IP4 10.0.0.5`
fn parse_connection(value: &str) -> Result<SdpConnection> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(net_type), Some(addr_type), Some(address)) => Ok(SdpConnection {
            net_type: net_type.to_string(),
            addr_type: addr_type.to_string(),
            address: address.to_string(),
        }),
        _ => Err(Error::sdp_parse(format!("bad connection line: {value:?}"))),
    }
}

/// `a=name` or `a=name:value`
fn parse_attribute(value: &str) -> SdpAttribute {
    match value.split_once(':') {
        Some((name, attr_value)) => SdpAttribute::new(name.trim(), attr_value.trim()),
        None => SdpAttribute::flag(value.trim()),
    }
}

/// `m=message 12000 TCP/MSRP *`
fn parse_media_line(value: &str) -> Result<MediaDescription> {
    let mut parts = value.split_whitespace();
    let media = parts
        .next()
        .ok_or_else(|| Error::sdp_parse("media line missing type"))?;
    let port_token = parts
        .next()
        .ok_or_else(|| Error::sdp_parse("media line missing port"))?;
    // `port/count` is legal; only the port matters here
    let port = port_token
        .split('/')
        .next()
        .unwrap_or(port_token)
        .parse::<u16>()
        .map_err(|_| Error::sdp_parse(format!("bad media port: {port_token:?}")))?;
    let protocol = parts
        .next()
        .ok_or_else(|| Error::sdp_parse("media line missing protocol"))?;
    let formats = parts.map(str::to_string).collect();
    Ok(MediaDescription::new(media, port, protocol, formats))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = "v=0\r\n\
        o=- 3920349 3920349 IN IP4 10.0.0.5\r\n\
        s=-\r\n\
        c=IN IP4 10.0.0.5\r\n\
        t=0 0\r\n\
        m=message 12000 TCP/MSRP *\r\n\
        a=accept-types:message/cpim text/plain\r\n\
        a=setup:active\r\n\
        a=path:msrp://10.0.0.5:12000/peer;tcp\r\n\
        a=sendrecv\r\n";

    #[test]
    fn test_parse_offer() {
        let sdp = parse_sdp(OFFER).unwrap();
        assert_eq!(sdp.version, 0);
        assert_eq!(sdp.connection.as_ref().unwrap().address, "10.0.0.5");
        assert_eq!(sdp.media.len(), 1);
        let media = &sdp.media[0];
        assert_eq!(media.media, "message");
        assert_eq!(media.port, 12000);
        assert_eq!(media.protocol, "TCP/MSRP");
        assert_eq!(media.formats, vec!["*".to_string()]);
        assert_eq!(media.attribute("setup"), Some("active"));
        assert_eq!(media.attribute("path"), Some("msrp://10.0.0.5:12000/peer;tcp"));
        assert_eq!(media.attribute("accept-types"), Some("message/cpim text/plain"));
        assert!(media.has_attribute("sendrecv"));
    }

    #[test]
    fn test_attributes_before_media_are_session_level() {
        let sdp = parse_sdp("v=0\r\no=- 1 1 IN IP4 h\r\ns=-\r\nt=0 0\r\na=tool:x\r\nm=message 9 TCP/MSRP *\r\na=setup:passive\r\n").unwrap();
        assert_eq!(sdp.attribute("tool"), Some("x"));
        assert_eq!(sdp.media[0].attribute("setup"), Some("passive"));
        assert!(sdp.media[0].attribute("tool").is_none());
    }

    #[test]
    fn test_media_level_connection_attaches_to_media() {
        let sdp = parse_sdp("v=0\r\nm=message 12000 TCP/MSRP *\r\nc=IN IP4 192.168.1.9\r\n").unwrap();
        assert_eq!(sdp.media[0].connection.as_ref().unwrap().address, "192.168.1.9");
        assert!(sdp.connection.is_none());
    }

    #[test]
    fn test_port_with_count() {
        let sdp = parse_sdp("v=0\r\nm=message 12000/2 TCP/MSRP *\r\n").unwrap();
        assert_eq!(sdp.media[0].port, 12000);
    }

    #[test]
    fn test_unknown_lines_ignored() {
        let sdp = parse_sdp("v=0\r\nb=AS:128\r\nm=message 9 TCP/MSRP *\r\n").unwrap();
        assert_eq!(sdp.media.len(), 1);
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(parse_sdp("v=0\r\nnonsense\r\n").is_err());
        assert!(parse_sdp("v=zero\r\n").is_err());
        assert!(parse_sdp("v=0\r\nm=message notaport TCP/MSRP *\r\n").is_err());
        assert!(parse_sdp("v=0\r\nc=IN IP4\r\n").is_err());
    }

    #[test]
    fn test_newline_only_endings_tolerated() {
        let sdp = parse_sdp("v=0\nc=IN IP4 10.0.0.5\nm=message 12000 TCP/MSRP *\na=setup:active\n").unwrap();
        assert_eq!(sdp.media[0].attribute("setup"), Some("active"));
    }
}
