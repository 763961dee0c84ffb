//! # SIP message parser
//!
//! Wire-format parsing for requests and responses. The start line is
//! handled with `nom`; header lines are simple `Name: value` pairs split
//! on CRLF. Headers the message model types directly (Via, Route, From,
//! To, Call-ID, CSeq, Contact, Content-Type) are lifted into their typed
//! fields; everything else is preserved verbatim in arrival order.
//!
//! The grammar is the strict subset this stack emits: CRLF line endings,
//! no header folding, no compact header forms.

use std::str::FromStr;

use bytes::Bytes;
use nom::{
    bytes::complete::{tag, take_till, take_till1},
    character::complete::{digit1, space1},
    combinator::map_res,
    sequence::terminated,
    IResult,
};
use tracing::trace;

use crate::error::{Error, Result};
use crate::types::{
    CSeq, CallId, Headers, Method, NameAddr, SipMessage, SipRequest, SipResponse, SipUri,
    StatusCode, Via,
};

/// Parse one SIP message from wire bytes
pub fn parse_message(input: &[u8]) -> Result<SipMessage> {
    let split = find_header_end(input)
        .ok_or_else(|| Error::parser("no end of headers (CRLFCRLF) found"))?;
    let head = std::str::from_utf8(&input[..split])
        .map_err(|_| Error::parser("header section is not valid UTF-8"))?;
    let mut body = &input[split + 4..];

    let mut lines = head.split("\r\n");
    let start_line = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| Error::parser("empty message"))?;

    let mut raw_headers: Vec<(String, String)> = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::parser(format!("malformed header line: {line:?}")))?;
        raw_headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    // Honor Content-Length when it is present and sane; stream transports
    // may hand us trailing bytes of the next message.
    if let Some(len) = take_header(&mut raw_headers, "Content-Length") {
        match len.parse::<usize>() {
            Ok(len) if len <= body.len() => body = &body[..len],
            Ok(len) => {
                trace!(declared = len, actual = body.len(), "short body, keeping actual bytes")
            }
            Err(_) => return Err(Error::invalid_header("Content-Length", len)),
        }
    }

    if start_line.starts_with("SIP/2.0") {
        parse_response(start_line, raw_headers, body).map(SipMessage::Response)
    } else {
        parse_request(start_line, raw_headers, body).map(SipMessage::Request)
    }
}

fn find_header_end(input: &[u8]) -> Option<usize> {
    input.windows(4).position(|w| w == b"\r\n\r\n")
}

/// `METHOD uri SIP/2.0`
fn request_line(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, method) = take_till1(|c| c == ' ')(input)?;
    let (input, _) = space1(input)?;
    let (input, uri) = take_till1(|c| c == ' ')(input)?;
    let (input, _) = space1(input)?;
    let (input, _) = tag("SIP/2.0")(input)?;
    Ok((input, (method, uri)))
}

/// `SIP/2.0 code reason`
fn status_line(input: &str) -> IResult<&str, (u16, &str)> {
    let (input, _) = terminated(tag("SIP/2.0"), space1)(input)?;
    let (input, code) = map_res(digit1, str::parse::<u16>)(input)?;
    let (input, _) = space1(input)?;
    let (input, reason) = take_till(|c| c == '\r')(input)?;
    Ok((input, (code, reason)))
}

fn parse_request(start: &str, raw: Vec<(String, String)>, body: &[u8]) -> Result<SipRequest> {
    let (method, uri) = match request_line(start) {
        Ok((rest, parts)) if rest.is_empty() => parts,
        _ => return Err(Error::parser(format!("malformed request line: {start:?}"))),
    };
    let method = Method::from_str(method)?;
    let uri = SipUri::from_str(uri)?;
    let parts = split_common_headers(raw, &method)?;
    Ok(SipRequest {
        method,
        uri,
        via: parts.via,
        route: parts.route,
        from: parts.from,
        to: parts.to,
        call_id: parts.call_id,
        cseq: parts.cseq,
        contact: parts.contact,
        content_type: parts.content_type,
        headers: parts.extra,
        body: Bytes::copy_from_slice(body),
    })
}

fn parse_response(start: &str, raw: Vec<(String, String)>, body: &[u8]) -> Result<SipResponse> {
    let (code, reason) = match status_line(start) {
        Ok((rest, parts)) if rest.is_empty() => parts,
        _ => return Err(Error::parser(format!("malformed status line: {start:?}"))),
    };
    // CSeq carries the method for responses; no method on the status line
    let parts = split_common_headers_any(raw)?;
    Ok(SipResponse {
        status: StatusCode::from_u16(code),
        reason: reason.to_string(),
        via: parts.via,
        from: parts.from,
        to: parts.to,
        call_id: parts.call_id,
        cseq: parts.cseq,
        contact: parts.contact,
        content_type: parts.content_type,
        headers: parts.extra,
        body: Bytes::copy_from_slice(body),
    })
}

struct CommonHeaders {
    via: Vec<Via>,
    route: Vec<String>,
    from: NameAddr,
    to: NameAddr,
    call_id: CallId,
    cseq: CSeq,
    contact: Option<NameAddr>,
    content_type: Option<String>,
    extra: Headers,
}

fn split_common_headers(raw: Vec<(String, String)>, method: &Method) -> Result<CommonHeaders> {
    let parts = split_common_headers_any(raw)?;
    if &parts.cseq.method != method {
        return Err(Error::invalid_header(
            "CSeq",
            format!("method {} does not match request method {}", parts.cseq.method, method),
        ));
    }
    Ok(parts)
}

fn split_common_headers_any(raw: Vec<(String, String)>) -> Result<CommonHeaders> {
    let mut via = Vec::new();
    let mut route = Vec::new();
    let mut from = None;
    let mut to = None;
    let mut call_id = None;
    let mut cseq = None;
    let mut contact = None;
    let mut content_type = None;
    let mut extra = Headers::new();

    for (name, value) in raw {
        match name.to_ascii_lowercase().as_str() {
            "via" => via.push(Via::from_str(&value)?),
            "route" => route.push(value),
            "from" => from = Some(NameAddr::from_str(&value)?),
            "to" => to = Some(NameAddr::from_str(&value)?),
            "call-id" => call_id = Some(CallId::new(value)),
            "cseq" => cseq = Some(CSeq::from_str(&value)?),
            "contact" => contact = Some(NameAddr::from_str(&value)?),
            "content-type" => content_type = Some(value),
            _ => extra.push(name, value),
        }
    }

    Ok(CommonHeaders {
        via,
        route,
        from: from.ok_or_else(|| Error::missing_header("From"))?,
        to: to.ok_or_else(|| Error::missing_header("To"))?,
        call_id: call_id.ok_or_else(|| Error::missing_header("Call-ID"))?,
        cseq: cseq.ok_or_else(|| Error::missing_header("CSeq"))?,
        contact,
        content_type,
        extra,
    })
}

fn take_header(raw: &mut Vec<(String, String)>, name: &str) -> Option<String> {
    let idx = raw.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))?;
    Some(raw.remove(idx).1)
}
