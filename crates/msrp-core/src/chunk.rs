//! MSRP chunk model and wire codec.
//!
//! The unit of MSRP traffic is a chunk: a start line carrying a transaction
//! id and a method (or a status for responses), a handful of headers, an
//! optional body, and an end-line of seven hyphens plus the transaction id
//! and a continuation flag (`$` complete, `+` more to come, `#` aborted).
//!
//! Chunks built here always carry `Failure-Report: no` and
//! `Success-Report: no`: the engine treats the SIP dialog, not per-chunk
//! reports, as the source of truth for delivery, and IMDN dispositions ride
//! inside the payload instead. Incoming chunks that ask for a report are
//! still answered, see [`MsrpSession`](crate::session::MsrpSession).
//!
//! [`ChunkDecoder`] is incremental: feed it byte slices as they arrive and
//! pull complete chunks out. A framing violation poisons the stream and is
//! reported as [`MsrpError::Codec`]; the connection is not recoverable past
//! that point.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, Bytes, BytesMut};
use rand::Rng;
use tracing::trace;

use crate::error::{MsrpError, Result};

/// Continuation flag closing a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// `$`: the message is complete.
    Complete,
    /// `+`: more chunks of this message follow.
    More,
    /// `#`: the sender aborted the message.
    Aborted,
}

impl Continuation {
    fn flag(self) -> char {
        match self {
            Self::Complete => '$',
            Self::More => '+',
            Self::Aborted => '#',
        }
    }

    fn from_flag(byte: u8) -> Result<Self> {
        match byte {
            b'$' => Ok(Self::Complete),
            b'+' => Ok(Self::More),
            b'#' => Ok(Self::Aborted),
            other => Err(MsrpError::codec(format!(
                "invalid continuation flag {:?}",
                other as char
            ))),
        }
    }
}

/// What a chunk is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkKind {
    /// A SEND request carrying (part of) a message.
    Send,
    /// A REPORT request about an earlier message.
    Report,
    /// A response to a request.
    Response {
        /// Status code
        code: u16,
        /// Reason phrase
        reason: String,
    },
    /// A request method this engine does not implement.
    Other(String),
}

/// Byte-Range header value: `start-end/total`, `*` for unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte of this chunk within the message, 1-based.
    pub start: u64,
    /// Last byte of this chunk, if known.
    pub end: Option<u64>,
    /// Total message size, if known.
    pub total: Option<u64>,
}

impl ByteRange {
    /// Range covering a complete message of `len` bytes.
    pub fn complete(len: u64) -> Self {
        Self {
            start: 1,
            end: Some(len),
            total: Some(len),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-", self.start)?;
        match self.end {
            Some(end) => write!(f, "{end}")?,
            None => write!(f, "*")?,
        }
        write!(f, "/")?;
        match self.total {
            Some(total) => write!(f, "{total}"),
            None => write!(f, "*"),
        }
    }
}

impl FromStr for ByteRange {
    type Err = MsrpError;

    fn from_str(s: &str) -> Result<Self> {
        let (range, total) = s
            .split_once('/')
            .ok_or_else(|| MsrpError::codec(format!("invalid byte range: {s}")))?;
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| MsrpError::codec(format!("invalid byte range: {s}")))?;
        let parse_part = |part: &str| -> Result<Option<u64>> {
            if part == "*" {
                Ok(None)
            } else {
                part.parse()
                    .map(Some)
                    .map_err(|_| MsrpError::codec(format!("invalid byte range: {s}")))
            }
        };
        let start = start
            .parse()
            .map_err(|_| MsrpError::codec(format!("invalid byte range: {s}")))?;
        Ok(Self {
            start,
            end: parse_part(end)?,
            total: parse_part(total)?,
        })
    }
}

/// One MSRP chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsrpChunk {
    /// Transaction id tying request, response and end-line together.
    pub transaction_id: String,
    /// Request method or response status.
    pub kind: ChunkKind,
    /// Destination path.
    pub to_path: String,
    /// Source path.
    pub from_path: String,
    /// Message this chunk belongs to.
    pub message_id: Option<String>,
    /// Position of this chunk within its message.
    pub byte_range: Option<ByteRange>,
    /// Media type of the body.
    pub content_type: Option<String>,
    /// Raw Success-Report value, if present.
    pub success_report: Option<String>,
    /// Raw Failure-Report value, if present.
    pub failure_report: Option<String>,
    /// Body bytes; empty for probes and responses.
    pub body: Bytes,
    /// End-line continuation flag.
    pub continuation: Continuation,
}

impl MsrpChunk {
    /// Build a complete single-chunk SEND.
    pub fn send(
        to_path: impl Into<String>,
        from_path: impl Into<String>,
        message_id: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Self {
        let body = body.into();
        Self {
            transaction_id: generate_transaction_id(),
            kind: ChunkKind::Send,
            to_path: to_path.into(),
            from_path: from_path.into(),
            message_id: Some(message_id.into()),
            byte_range: Some(ByteRange::complete(body.len() as u64)),
            content_type: Some(content_type.into()),
            success_report: Some("no".to_string()),
            failure_report: Some("no".to_string()),
            body,
            continuation: Continuation::Complete,
        }
    }

    /// Build an empty SEND used to exercise a freshly opened connection.
    pub fn probe(to_path: impl Into<String>, from_path: impl Into<String>) -> Self {
        Self {
            transaction_id: generate_transaction_id(),
            kind: ChunkKind::Send,
            to_path: to_path.into(),
            from_path: from_path.into(),
            message_id: Some(generate_message_id()),
            byte_range: None,
            content_type: None,
            success_report: Some("no".to_string()),
            failure_report: Some("no".to_string()),
            body: Bytes::new(),
            continuation: Continuation::Complete,
        }
    }

    /// Build the response to a request chunk, echoing its transaction id
    /// and reversing its paths.
    pub fn response(request: &MsrpChunk, code: u16, reason: impl Into<String>) -> Self {
        Self {
            transaction_id: request.transaction_id.clone(),
            kind: ChunkKind::Response {
                code,
                reason: reason.into(),
            },
            to_path: request.from_path.clone(),
            from_path: request.to_path.clone(),
            message_id: None,
            byte_range: None,
            content_type: None,
            success_report: None,
            failure_report: None,
            body: Bytes::new(),
            continuation: Continuation::Complete,
        }
    }

    /// Whether this chunk carries no payload bytes.
    pub fn is_empty_payload(&self) -> bool {
        self.body.is_empty()
    }

    /// Whether the sender asked for a failure report (anything but an
    /// explicit `no`).
    pub fn wants_failure_report(&self) -> bool {
        matches!(self.kind, ChunkKind::Send)
            && self.failure_report.as_deref() != Some("no")
    }

    /// Serialize to wire form.
    pub fn encode(&self) -> Bytes {
        let mut out = String::new();
        match &self.kind {
            ChunkKind::Send => out.push_str(&format!("MSRP {} SEND\r\n", self.transaction_id)),
            ChunkKind::Report => {
                out.push_str(&format!("MSRP {} REPORT\r\n", self.transaction_id))
            }
            ChunkKind::Response { code, reason } => {
                out.push_str(&format!("MSRP {} {code} {reason}\r\n", self.transaction_id))
            }
            ChunkKind::Other(method) => {
                out.push_str(&format!("MSRP {} {method}\r\n", self.transaction_id))
            }
        }
        out.push_str(&format!("To-Path: {}\r\n", self.to_path));
        out.push_str(&format!("From-Path: {}\r\n", self.from_path));
        if let Some(id) = &self.message_id {
            out.push_str(&format!("Message-ID: {id}\r\n"));
        }
        if let Some(report) = &self.success_report {
            out.push_str(&format!("Success-Report: {report}\r\n"));
        }
        if let Some(report) = &self.failure_report {
            out.push_str(&format!("Failure-Report: {report}\r\n"));
        }
        if let Some(range) = &self.byte_range {
            out.push_str(&format!("Byte-Range: {range}\r\n"));
        }

        let mut bytes = BytesMut::new();
        if let Some(content_type) = &self.content_type {
            out.push_str(&format!("Content-Type: {content_type}\r\n"));
            out.push_str("\r\n");
            bytes.extend_from_slice(out.as_bytes());
            bytes.extend_from_slice(&self.body);
            bytes.extend_from_slice(b"\r\n");
        } else {
            bytes.extend_from_slice(out.as_bytes());
        }
        bytes.extend_from_slice(
            format!(
                "-------{}{}\r\n",
                self.transaction_id,
                self.continuation.flag()
            )
            .as_bytes(),
        );
        bytes.freeze()
    }
}

/// Generate a transaction id for a locally built chunk.
pub fn generate_transaction_id() -> String {
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| format!("{:x}", rng.gen_range(0..16)))
        .collect()
}

/// Generate a message id for a locally built message.
pub fn generate_message_id() -> String {
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| format!("{:x}", rng.gen_range(0..16)))
        .collect()
}

/// Format an MSRP URI for a path header.
pub fn msrp_uri(host: &str, port: u16, session_id: &str) -> String {
    format!("msrp://{host}:{port}/{session_id};tcp")
}

/// Incremental chunk decoder.
///
/// Feed bytes with [`push`](Self::push), pull chunks with
/// [`decode`](Self::decode) until it returns `Ok(None)`.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    buffer: BytesMut,
}

impl ChunkDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet decoded.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Try to decode one complete chunk. `Ok(None)` means more bytes are
    /// needed.
    pub fn decode(&mut self) -> Result<Option<MsrpChunk>> {
        let Some((chunk, consumed)) = self.parse()? else {
            return Ok(None);
        };
        self.buffer.advance(consumed);
        Ok(Some(chunk))
    }

    fn parse(&self) -> Result<Option<(MsrpChunk, usize)>> {
        let buf = &self.buffer[..];
        let Some(line_end) = find_crlf(buf, 0) else {
            return Ok(None);
        };
        let start_line = std::str::from_utf8(&buf[..line_end])
            .map_err(|_| MsrpError::codec("start line is not UTF-8"))?;

        let mut parts = start_line.splitn(3, ' ');
        if parts.next() != Some("MSRP") {
            return Err(MsrpError::codec(format!(
                "invalid start line: {start_line}"
            )));
        }
        let transaction_id = parts
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MsrpError::codec("missing transaction id"))?
            .to_string();
        let rest = parts
            .next()
            .ok_or_else(|| MsrpError::codec("missing method or status"))?;

        let kind = parse_kind(rest);
        let end_marker = format!("-------{transaction_id}");

        let mut chunk = MsrpChunk {
            transaction_id,
            kind,
            to_path: String::new(),
            from_path: String::new(),
            message_id: None,
            byte_range: None,
            content_type: None,
            success_report: None,
            failure_report: None,
            body: Bytes::new(),
            continuation: Continuation::Complete,
        };

        // Header section: lines until a blank line (body follows) or the
        // end-line (no body).
        let mut pos = line_end + 2;
        let body_start = loop {
            let Some(eol) = find_crlf(buf, pos) else {
                return Ok(None);
            };
            let line = &buf[pos..eol];

            if line.is_empty() {
                break Some(eol + 2);
            }
            if line.starts_with(end_marker.as_bytes()) {
                if line.len() != end_marker.len() + 1 {
                    return Err(MsrpError::codec("malformed end-line"));
                }
                chunk.continuation = Continuation::from_flag(line[end_marker.len()])?;
                finish_headers(&mut chunk)?;
                return Ok(Some((chunk, eol + 2)));
            }

            let line = std::str::from_utf8(line)
                .map_err(|_| MsrpError::codec("header line is not UTF-8"))?;
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| MsrpError::codec(format!("malformed header: {line}")))?;
            apply_header(&mut chunk, name.trim(), value.trim())?;
            pos = eol + 2;
        };

        // Body runs until CRLF followed by the end-line.
        let Some(body_start) = body_start else {
            return Ok(None);
        };
        let marker = format!("\r\n{end_marker}");
        let Some(marker_pos) = find_subslice(&buf[body_start..], marker.as_bytes()) else {
            return Ok(None);
        };
        let flag_pos = body_start + marker_pos + marker.len();
        if buf.len() < flag_pos + 3 {
            return Ok(None);
        }
        if &buf[flag_pos + 1..flag_pos + 3] != b"\r\n" {
            return Err(MsrpError::codec("malformed end-line after body"));
        }
        chunk.continuation = Continuation::from_flag(buf[flag_pos])?;
        chunk.body = Bytes::copy_from_slice(&buf[body_start..body_start + marker_pos]);
        finish_headers(&mut chunk)?;
        Ok(Some((chunk, flag_pos + 3)))
    }
}

fn parse_kind(rest: &str) -> ChunkKind {
    let mut parts = rest.splitn(2, ' ');
    let first = parts.next().unwrap_or_default();
    if let Ok(code) = first.parse::<u16>() {
        return ChunkKind::Response {
            code,
            reason: parts.next().unwrap_or_default().to_string(),
        };
    }
    match first {
        "SEND" => ChunkKind::Send,
        "REPORT" => ChunkKind::Report,
        other => {
            trace!(method = other, "unrecognized chunk method");
            ChunkKind::Other(other.to_string())
        }
    }
}

fn apply_header(chunk: &mut MsrpChunk, name: &str, value: &str) -> Result<()> {
    match name.to_ascii_lowercase().as_str() {
        "to-path" => chunk.to_path = value.to_string(),
        "from-path" => chunk.from_path = value.to_string(),
        "message-id" => chunk.message_id = Some(value.to_string()),
        "byte-range" => chunk.byte_range = Some(value.parse()?),
        "content-type" => chunk.content_type = Some(value.to_string()),
        "success-report" => chunk.success_report = Some(value.to_string()),
        "failure-report" => chunk.failure_report = Some(value.to_string()),
        other => trace!(header = other, "ignoring chunk header"),
    }
    Ok(())
}

fn finish_headers(chunk: &mut MsrpChunk) -> Result<()> {
    if chunk.to_path.is_empty() || chunk.from_path.is_empty() {
        return Err(MsrpError::codec("chunk missing To-Path or From-Path"));
    }
    Ok(())
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|i| from + i)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send_chunk() -> MsrpChunk {
        MsrpChunk {
            transaction_id: "a1b2c3d4e5".to_string(),
            ..MsrpChunk::send(
                "msrp://10.0.0.2:2855/s2;tcp",
                "msrp://10.0.0.1:2855/s1;tcp",
                "m-1",
                "message/cpim",
                "hello",
            )
        }
    }

    #[test]
    fn test_encode_send() {
        let encoded = send_chunk().encode();
        let expected = "MSRP a1b2c3d4e5 SEND\r\n\
                        To-Path: msrp://10.0.0.2:2855/s2;tcp\r\n\
                        From-Path: msrp://10.0.0.1:2855/s1;tcp\r\n\
                        Message-ID: m-1\r\n\
                        Success-Report: no\r\n\
                        Failure-Report: no\r\n\
                        Byte-Range: 1-5/5\r\n\
                        Content-Type: message/cpim\r\n\
                        \r\n\
                        hello\r\n\
                        -------a1b2c3d4e5$\r\n";
        assert_eq!(encoded, Bytes::from(expected));
    }

    #[test]
    fn test_decode_roundtrip_in_fragments() {
        let encoded = send_chunk().encode();
        let mut decoder = ChunkDecoder::new();

        // Feed in awkward fragments; nothing completes until the end-line
        // lands.
        decoder.push(&encoded[..10]);
        assert!(decoder.decode().unwrap().is_none());
        decoder.push(&encoded[10..encoded.len() - 4]);
        assert!(decoder.decode().unwrap().is_none());
        decoder.push(&encoded[encoded.len() - 4..]);

        let chunk = decoder.decode().unwrap().unwrap();
        assert_eq!(chunk, send_chunk());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decode_response_without_body() {
        let request = send_chunk();
        let response = MsrpChunk::response(&request, 200, "OK");
        let encoded = response.encode();

        let mut decoder = ChunkDecoder::new();
        decoder.push(&encoded);
        let decoded = decoder.decode().unwrap().unwrap();

        assert_eq!(
            decoded.kind,
            ChunkKind::Response {
                code: 200,
                reason: "OK".to_string()
            }
        );
        assert_eq!(decoded.transaction_id, request.transaction_id);
        assert_eq!(decoded.to_path, request.from_path);
        assert!(decoded.is_empty_payload());
    }

    #[test]
    fn test_decode_two_chunks_back_to_back() {
        let mut buffer = send_chunk().encode().to_vec();
        let probe = MsrpChunk::probe(
            "msrp://10.0.0.2:2855/s2;tcp",
            "msrp://10.0.0.1:2855/s1;tcp",
        );
        buffer.extend_from_slice(&probe.encode());

        let mut decoder = ChunkDecoder::new();
        decoder.push(&buffer);

        let first = decoder.decode().unwrap().unwrap();
        assert_eq!(first.message_id.as_deref(), Some("m-1"));

        let second = decoder.decode().unwrap().unwrap();
        assert!(second.is_empty_payload());
        assert!(second.message_id.is_some());
        assert!(decoder.decode().unwrap().is_none());
    }

    #[test]
    fn test_aborted_continuation() {
        let mut chunk = send_chunk();
        chunk.continuation = Continuation::Aborted;
        let encoded = chunk.encode();
        assert!(encoded.ends_with(b"#\r\n"));

        let mut decoder = ChunkDecoder::new();
        decoder.push(&encoded);
        let decoded = decoder.decode().unwrap().unwrap();
        assert_eq!(decoded.continuation, Continuation::Aborted);
    }

    #[test]
    fn test_garbage_start_line_is_fatal() {
        let mut decoder = ChunkDecoder::new();
        decoder.push(b"GET / HTTP/1.1\r\n\r\n");
        assert!(decoder.decode().is_err());
    }

    #[test]
    fn test_byte_range_parse_and_display() {
        let range: ByteRange = "1-5/5".parse().unwrap();
        assert_eq!(range, ByteRange::complete(5));

        let open: ByteRange = "1-*/*".parse().unwrap();
        assert_eq!(open.end, None);
        assert_eq!(open.total, None);
        assert_eq!(open.to_string(), "1-*/*");

        assert!("5".parse::<ByteRange>().is_err());
    }

    #[test]
    fn test_wants_failure_report() {
        let mut chunk = send_chunk();
        assert!(!chunk.wants_failure_report());

        chunk.failure_report = Some("yes".to_string());
        assert!(chunk.wants_failure_report());

        // Absent header defaults to yes per the protocol.
        chunk.failure_report = None;
        assert!(chunk.wants_failure_report());
    }

    #[test]
    fn test_msrp_uri_format() {
        assert_eq!(
            msrp_uri("10.0.0.1", 2855, "s1"),
            "msrp://10.0.0.1:2855/s1;tcp"
        );
    }
}
