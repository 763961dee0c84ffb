//! IMDN disposition documents (RFC 5438).
//!
//! An IMDN is a small XML document correlating a disposition (`delivered`,
//! `displayed`, a failure) back to the message id the sender put in its
//! CPIM envelope. Anything we do not recognize parses as
//! [`ImdnStatus::Other`] and maps to no log outcome.

use std::io::Cursor;

use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::PayloadError;
use crate::delivery::DeliveryOutcome;

const IMDN_XMLNS: &str = "urn:ietf:params:xml:ns:imdn";

/// Disposition status carried inside `<status>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImdnStatus {
    Delivered,
    Displayed,
    Error,
    Failed,
    Forbidden,
    Other(String),
}

impl ImdnStatus {
    fn element_name(&self) -> &str {
        match self {
            Self::Delivered => "delivered",
            Self::Displayed => "displayed",
            Self::Error => "error",
            Self::Failed => "failed",
            Self::Forbidden => "forbidden",
            Self::Other(name) => name,
        }
    }

    fn from_element(name: &str) -> Self {
        match name {
            "delivered" => Self::Delivered,
            "displayed" => Self::Displayed,
            "error" => Self::Error,
            "failed" => Self::Failed,
            "forbidden" => Self::Forbidden,
            other => Self::Other(other.to_string()),
        }
    }

    /// Log outcome this status maps to; `None` means the receipt is
    /// acknowledged but not recorded.
    pub fn outcome(&self) -> Option<DeliveryOutcome> {
        match self {
            Self::Displayed => Some(DeliveryOutcome::DeliveredAndRead),
            Self::Delivered => Some(DeliveryOutcome::DeliveredNotRead),
            Self::Error | Self::Failed | Self::Forbidden => Some(DeliveryOutcome::Failed),
            Self::Other(_) => None,
        }
    }
}

/// A disposition notification document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImdnDocument {
    /// The message this disposition refers to.
    pub message_id: String,
    pub status: ImdnStatus,
}

impl ImdnDocument {
    pub fn new(message_id: impl Into<String>, status: ImdnStatus) -> Self {
        Self {
            message_id: message_id.into(),
            status,
        }
    }

    /// Receipt confirming the message reached this device.
    pub fn delivery_receipt(message_id: impl Into<String>) -> Self {
        Self::new(message_id, ImdnStatus::Delivered)
    }

    /// Receipt confirming the message was shown to the user.
    pub fn display_receipt(message_id: impl Into<String>) -> Self {
        Self::new(message_id, ImdnStatus::Displayed)
    }

    /// Serialize to XML.
    pub fn to_xml(&self) -> Result<String, PayloadError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;

        let mut imdn = BytesStart::new("imdn");
        imdn.push_attribute(("xmlns", IMDN_XMLNS));
        writer
            .write_event(Event::Start(imdn))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;

        writer
            .write_event(Event::Start(BytesStart::new("message-id")))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;
        writer
            .write_event(Event::Text(BytesText::new(&self.message_id)))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;
        writer
            .write_event(Event::End(BytesStart::new("message-id").to_end()))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;

        writer
            .write_event(Event::Start(BytesStart::new("datetime")))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;
        writer
            .write_event(Event::Text(BytesText::new(
                &Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            )))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;
        writer
            .write_event(Event::End(BytesStart::new("datetime").to_end()))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;

        let notification = match self.status {
            ImdnStatus::Displayed => "display-notification",
            _ => "delivery-notification",
        };
        writer
            .write_event(Event::Start(BytesStart::new(notification)))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;
        writer
            .write_event(Event::Start(BytesStart::new("status")))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;
        writer
            .write_event(Event::Empty(BytesStart::new(self.status.element_name())))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;
        writer
            .write_event(Event::End(BytesStart::new("status").to_end()))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;
        writer
            .write_event(Event::End(BytesStart::new(notification).to_end()))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;

        writer
            .write_event(Event::End(BytesStart::new("imdn").to_end()))
            .map_err(|e| PayloadError::imdn(e.to_string()))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| PayloadError::imdn(e.to_string()))
    }

    /// Parse a disposition document.
    pub fn parse(xml: &str) -> Result<Self, PayloadError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut message_id: Option<String> = None;
        let mut status: Option<ImdnStatus> = None;

        let mut in_message_id = false;
        let mut in_status = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                    b"message-id" => in_message_id = true,
                    b"status" => in_status = true,
                    name if in_status => {
                        status = Some(ImdnStatus::from_element(&String::from_utf8_lossy(name)));
                    }
                    _ => {}
                },
                Ok(Event::Empty(ref e)) if in_status => {
                    status = Some(ImdnStatus::from_element(&String::from_utf8_lossy(
                        e.local_name().as_ref(),
                    )));
                }
                Ok(Event::Text(ref e)) => {
                    if in_message_id {
                        message_id = Some(
                            e.unescape()
                                .map_err(|err| PayloadError::imdn(err.to_string()))?
                                .to_string(),
                        );
                        in_message_id = false;
                    }
                }
                Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                    b"message-id" => in_message_id = false,
                    b"status" => in_status = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(PayloadError::imdn(e.to_string())),
                _ => {}
            }
        }

        let message_id = message_id.ok_or_else(|| PayloadError::imdn("missing message-id"))?;
        let status = status.ok_or_else(|| PayloadError::imdn("missing status"))?;
        Ok(Self { message_id, status })
    }
}
