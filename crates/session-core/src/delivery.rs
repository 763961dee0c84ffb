//! Message log and delivery status plumbing.
//!
//! Sessions push everything that happens on the wire into a [`MessageLog`]:
//! incoming chat messages, outgoing sends, and delivery status updates
//! distilled from IMDN receipts. The engine owns one log instance shared
//! by all sessions; applications provide their own implementation to
//! persist history, or use [`InMemoryMessageLog`] for tests and demos.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Delivery status distilled from a disposition notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryOutcome {
    /// The message reached the recipient's device.
    DeliveredNotRead,
    /// The recipient's client displayed the message.
    DeliveredAndRead,
    /// Delivery failed.
    Failed,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeliveredNotRead => "delivered-not-read",
            Self::DeliveredAndRead => "delivered-and-read",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message as surfaced to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// End-to-end message id (CPIM/IMDN scope), not the MSRP chunk id.
    pub message_id: String,
    /// Remote party the message was exchanged with.
    pub contact: String,
    /// Payload content type.
    pub content_type: String,
    /// Decoded payload.
    pub body: String,
    /// When this engine received the message.
    pub received_at: DateTime<Utc>,
}

/// Sink for session traffic.
///
/// Implementations must be cheap to call from session tasks; anything
/// slow belongs behind the application's own queue.
pub trait MessageLog: Send + Sync {
    /// A chat message arrived from `contact`.
    fn record_incoming(&self, contact: &str, message: &ChatMessage);

    /// We sent `body` to `contact` under `message_id`.
    fn record_outgoing(&self, contact: &str, message_id: &str, body: &str);

    /// A receipt for an earlier outgoing message arrived.
    fn record_delivery_status(&self, message_id: &str, contact: &str, outcome: DeliveryOutcome);
}

/// One recorded log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Incoming(ChatMessage),
    Outgoing {
        contact: String,
        message_id: String,
        body: String,
    },
    Delivery {
        message_id: String,
        contact: String,
        outcome: DeliveryOutcome,
    },
}

/// Append-only in-memory log.
#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Latest recorded outcome for `message_id`, if any receipt arrived.
    pub fn delivery_status(&self, message_id: &str) -> Option<DeliveryOutcome> {
        self.entries
            .lock()
            .iter()
            .rev()
            .find_map(|entry| match entry {
                LogEntry::Delivery {
                    message_id: id,
                    outcome,
                    ..
                } if id == message_id => Some(*outcome),
                _ => None,
            })
    }
}

impl MessageLog for InMemoryMessageLog {
    fn record_incoming(&self, _contact: &str, message: &ChatMessage) {
        self.entries.lock().push(LogEntry::Incoming(message.clone()));
    }

    fn record_outgoing(&self, contact: &str, message_id: &str, body: &str) {
        self.entries.lock().push(LogEntry::Outgoing {
            contact: contact.to_string(),
            message_id: message_id.to_string(),
            body: body.to_string(),
        });
    }

    fn record_delivery_status(&self, message_id: &str, contact: &str, outcome: DeliveryOutcome) {
        self.entries.lock().push(LogEntry::Delivery {
            message_id: message_id.to_string(),
            contact: contact.to_string(),
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> ChatMessage {
        ChatMessage {
            message_id: id.to_string(),
            contact: "sip:bob@example.com".to_string(),
            content_type: "text/plain".to_string(),
            body: "hello".to_string(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_log_records_in_order() {
        let log = InMemoryMessageLog::new();
        log.record_outgoing("sip:bob@example.com", "m1", "hi");
        log.record_incoming("sip:bob@example.com", &message("m2"));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert!(matches!(&entries[0], LogEntry::Outgoing { message_id, .. } if message_id == "m1"));
        assert!(matches!(&entries[1], LogEntry::Incoming(m) if m.message_id == "m2"));
    }

    #[test]
    fn test_delivery_status_latest_wins() {
        let log = InMemoryMessageLog::new();
        assert_eq!(log.delivery_status("m1"), None);

        log.record_delivery_status("m1", "sip:bob@example.com", DeliveryOutcome::DeliveredNotRead);
        log.record_delivery_status("m1", "sip:bob@example.com", DeliveryOutcome::DeliveredAndRead);
        log.record_delivery_status("m2", "sip:bob@example.com", DeliveryOutcome::Failed);

        assert_eq!(
            log.delivery_status("m1"),
            Some(DeliveryOutcome::DeliveredAndRead)
        );
        assert_eq!(log.delivery_status("m2"), Some(DeliveryOutcome::Failed));
    }
}
