//! CPIM message envelopes (RFC 3862).
//!
//! A CPIM message is three blocks separated by blank lines: envelope
//! headers (`From`, `To`, namespace-prefixed extension headers), content
//! headers (`Content-Type`), and the payload. The IMDN extension headers
//! ride under a namespace declared by an `NS` header, so the prefix is
//! resolved rather than assumed to be `imdn`.

use chrono::{DateTime, Utc};

use super::PayloadError;

/// Namespace URN for IMDN extension headers.
const IMDN_NAMESPACE: &str = "urn:ietf:params:imdn";

/// Disposition type requesting a delivery receipt.
pub const DISPOSITION_POSITIVE_DELIVERY: &str = "positive-delivery";

/// Disposition type requesting a displayed (read) receipt.
pub const DISPOSITION_DISPLAY: &str = "display";

/// A parsed or to-be-encoded CPIM envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpimMessage {
    /// Sender URI, angle brackets stripped.
    pub from: Option<String>,
    /// Recipient URI, angle brackets stripped.
    pub to: Option<String>,
    /// IMDN message id, the end-to-end correlation key for receipts.
    pub message_id: Option<String>,
    /// Requested disposition notifications.
    pub disposition_notification: Vec<String>,
    /// Envelope timestamp.
    pub date_time: Option<DateTime<Utc>>,
    /// Payload content type.
    pub content_type: String,
    /// Payload.
    pub body: String,
}

impl CpimMessage {
    pub fn new(content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: None,
            to: None,
            message_id: None,
            disposition_notification: Vec::new(),
            date_time: Some(Utc::now()),
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Request the given disposition notifications from the recipient.
    pub fn with_disposition_notification(mut self, kinds: &[&str]) -> Self {
        self.disposition_notification = kinds.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Whether the sender asked for a delivery receipt.
    pub fn wants_delivery_receipt(&self) -> bool {
        self.disposition_notification
            .iter()
            .any(|d| d == DISPOSITION_POSITIVE_DELIVERY || d == "negative-delivery")
    }

    /// Whether the sender asked for a displayed receipt.
    pub fn wants_display_receipt(&self) -> bool {
        self.disposition_notification
            .iter()
            .any(|d| d == DISPOSITION_DISPLAY)
    }

    /// Whether the payload is an IMDN disposition document.
    pub fn is_imdn(&self) -> bool {
        self.content_type
            .eq_ignore_ascii_case(super::IMDN_CONTENT_TYPE)
    }

    /// Encode to wire form.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if let Some(from) = &self.from {
            out.push_str(&format!("From: <{from}>\r\n"));
        }
        if let Some(to) = &self.to {
            out.push_str(&format!("To: <{to}>\r\n"));
        }
        if self.message_id.is_some() || !self.disposition_notification.is_empty() {
            out.push_str(&format!("NS: imdn <{IMDN_NAMESPACE}>\r\n"));
        }
        if let Some(id) = &self.message_id {
            out.push_str(&format!("imdn.Message-ID: {id}\r\n"));
        }
        if !self.disposition_notification.is_empty() {
            out.push_str(&format!(
                "imdn.Disposition-Notification: {}\r\n",
                self.disposition_notification.join(", ")
            ));
        }
        if let Some(at) = &self.date_time {
            out.push_str(&format!(
                "DateTime: {}\r\n",
                at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            ));
        }
        out.push_str("\r\n");
        out.push_str(&format!("Content-Type: {}\r\n", self.content_type));
        out.push_str("\r\n");
        out.push_str(&self.body);
        out
    }

    /// Parse a wire-form envelope.
    pub fn parse(input: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(input)
            .map_err(|_| PayloadError::cpim("envelope is not valid UTF-8"))?;

        let (envelope, rest) = split_block(text)
            .ok_or_else(|| PayloadError::cpim("missing envelope separator"))?;
        let (content_headers, body) = split_block(rest)
            .ok_or_else(|| PayloadError::cpim("missing content separator"))?;

        let mut message = Self {
            from: None,
            to: None,
            message_id: None,
            disposition_notification: Vec::new(),
            date_time: None,
            content_type: "text/plain".to_string(),
            body: body.to_string(),
        };

        // First pass collects namespace prefixes so extension headers can
        // be resolved regardless of the prefix the sender chose.
        let headers = parse_headers(envelope);
        let mut imdn_prefix: Option<String> = None;
        for (name, value) in &headers {
            if name.eq_ignore_ascii_case("NS") {
                if let Some((prefix, urn)) = parse_ns(value) {
                    if urn == IMDN_NAMESPACE {
                        imdn_prefix = Some(prefix);
                    }
                }
            }
        }

        for (name, value) in &headers {
            if name.eq_ignore_ascii_case("From") {
                message.from = Some(strip_angle(value).to_string());
            } else if name.eq_ignore_ascii_case("To") {
                message.to = Some(strip_angle(value).to_string());
            } else if name.eq_ignore_ascii_case("DateTime") {
                message.date_time = DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|at| at.with_timezone(&Utc));
            } else if let Some(prefix) = &imdn_prefix {
                if let Some(local) = name.strip_prefix(prefix.as_str()) {
                    match local.strip_prefix('.') {
                        Some("Message-ID") => message.message_id = Some(value.to_string()),
                        Some("Disposition-Notification") => {
                            message.disposition_notification = value
                                .split(',')
                                .map(|d| d.trim().to_string())
                                .filter(|d| !d.is_empty())
                                .collect();
                        }
                        _ => {}
                    }
                }
            }
        }

        for (name, value) in parse_headers(content_headers) {
            if name.eq_ignore_ascii_case("Content-Type") {
                message.content_type = value;
            }
        }

        Ok(message)
    }
}

/// Split on the first blank line, tolerating bare-LF input and an empty
/// leading block (which leaves only a single line break before the rest).
fn split_block(text: &str) -> Option<(&str, &str)> {
    if let Some(rest) = text.strip_prefix("\r\n") {
        return Some(("", rest));
    }
    if let Some(rest) = text.strip_prefix('\n') {
        return Some(("", rest));
    }
    if let Some(at) = text.find("\r\n\r\n") {
        return Some((&text[..at], &text[at + 4..]));
    }
    text.find("\n\n").map(|at| (&text[..at], &text[at + 2..]))
}

fn parse_headers(block: &str) -> Vec<(String, String)> {
    block
        .lines()
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// `NS: prefix <urn>` -> `(prefix, urn)`.
fn parse_ns(value: &str) -> Option<(String, String)> {
    let (prefix, urn) = value.split_once(char::is_whitespace)?;
    let urn = urn.trim().strip_prefix('<')?.strip_suffix('>')?;
    Some((prefix.to_string(), urn.to_string()))
}

/// Pull the URI out of `Display Name <uri>` forms.
fn strip_angle(value: &str) -> &str {
    match (value.find('<'), value.rfind('>')) {
        (Some(open), Some(close)) if open < close => &value[open + 1..close],
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_chat_message() {
        let message = CpimMessage::new("text/plain", "Hello!")
            .with_from("sip:alice@example.com")
            .with_to("sip:bob@example.com")
            .with_message_id("msg-1")
            .with_disposition_notification(&[DISPOSITION_POSITIVE_DELIVERY, DISPOSITION_DISPLAY]);

        let wire = message.encode();
        assert!(wire.starts_with("From: <sip:alice@example.com>\r\nTo: <sip:bob@example.com>\r\n"));
        assert!(wire.contains("NS: imdn <urn:ietf:params:imdn>\r\n"));
        assert!(wire.contains("imdn.Message-ID: msg-1\r\n"));
        assert!(wire.contains("imdn.Disposition-Notification: positive-delivery, display\r\n"));
        assert!(wire.contains("\r\nContent-Type: text/plain\r\n\r\nHello!"));
    }

    #[test]
    fn test_parse_round_trip() {
        let original = CpimMessage::new("text/plain", "round trip")
            .with_from("sip:alice@example.com")
            .with_to("sip:bob@example.com")
            .with_message_id("msg-2")
            .with_disposition_notification(&[DISPOSITION_POSITIVE_DELIVERY]);

        let parsed = CpimMessage::parse(original.encode().as_bytes()).unwrap();
        assert_eq!(parsed.from.as_deref(), Some("sip:alice@example.com"));
        assert_eq!(parsed.to.as_deref(), Some("sip:bob@example.com"));
        assert_eq!(parsed.message_id.as_deref(), Some("msg-2"));
        assert!(parsed.wants_delivery_receipt());
        assert!(!parsed.wants_display_receipt());
        assert_eq!(parsed.content_type, "text/plain");
        assert_eq!(parsed.body, "round trip");
        assert!(parsed.date_time.is_some());
    }

    #[test]
    fn test_parse_resolves_custom_namespace_prefix() {
        let wire = "From: <sip:alice@example.com>\r\n\
                    NS: rcs <urn:ietf:params:imdn>\r\n\
                    rcs.Message-ID: custom-1\r\n\
                    rcs.Disposition-Notification: display\r\n\
                    \r\n\
                    Content-Type: text/plain\r\n\
                    \r\n\
                    hi";
        let parsed = CpimMessage::parse(wire.as_bytes()).unwrap();
        assert_eq!(parsed.message_id.as_deref(), Some("custom-1"));
        assert!(parsed.wants_display_receipt());
    }

    #[test]
    fn test_parse_without_separators_rejected() {
        let err = CpimMessage::parse(b"just some text").unwrap_err();
        assert!(matches!(err, PayloadError::Cpim { .. }));
    }

    #[test]
    fn test_parse_bare_from_and_missing_content_type() {
        let wire = "From: sip:alice@example.com\r\n\r\n\r\nraw";
        let parsed = CpimMessage::parse(wire.as_bytes()).unwrap();
        assert_eq!(parsed.from.as_deref(), Some("sip:alice@example.com"));
        // No Content-Type header falls back to plain text.
        assert_eq!(parsed.content_type, "text/plain");
        assert_eq!(parsed.body, "raw");
    }

    #[test]
    fn test_imdn_envelope_detection() {
        let message = CpimMessage::new(super::super::IMDN_CONTENT_TYPE, "<imdn/>");
        assert!(message.is_imdn());
        assert!(!CpimMessage::new("text/plain", "x").is_imdn());
    }
}
