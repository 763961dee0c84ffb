//! Deferred-message delivery sessions.
//!
//! A store-and-forward server that held messages while we were offline
//! opens a session toward us and replays them. Each replayed message is
//! recorded and surfaced like live chat; senders that asked for delivery
//! receipts get an IMDN back over the same session, which is what lets
//! the original sender's client mark the message delivered.

use async_trait::async_trait;
use tracing::debug;

use rims_msrp_core::MsrpChunk;

use crate::chat::CPIM_CONTENT_TYPE;
use crate::handlers::chat::{process_chat_payload, ReceiptPolicy};
use crate::handlers::SessionHandler;
use crate::session::{SessionContext, SessionKind};
use crate::state::SessionState;

pub struct StoreAndForwardHandler;

impl StoreAndForwardHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StoreAndForwardHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionHandler for StoreAndForwardHandler {
    fn kind(&self) -> SessionKind {
        SessionKind::TerminatingStoreAndForward
    }

    fn accept_types(&self) -> Vec<String> {
        vec![CPIM_CONTENT_TYPE.to_string()]
    }

    async fn on_established(&self, ctx: &SessionContext) {
        debug!(session = %ctx.id, peer = %ctx.remote_party, "awaiting deferred messages");
    }

    async fn on_payload(&self, ctx: &SessionContext, chunk: MsrpChunk) {
        process_chat_payload(ctx, &chunk, ReceiptPolicy::OnRequest).await;
    }

    async fn on_closed(&self, ctx: &SessionContext, state: SessionState) {
        debug!(session = %ctx.id, %state, "delivery session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{CpimMessage, ImdnDocument};
    use crate::handlers::chat::tests::{chat_chunk, context};

    #[tokio::test]
    async fn test_deferred_message_acknowledged() {
        let (ctx, mut outbox, _events, log) = context();
        let handler = StoreAndForwardHandler::new();

        let envelope = CpimMessage::new("text/plain", "while you were away")
            .with_from("sip:alice@10.0.0.1")
            .with_message_id("deferred-1")
            .with_disposition_notification(&["positive-delivery"]);
        handler.on_payload(&ctx, chat_chunk(&envelope)).await;

        assert_eq!(log.entries().len(), 1);
        let receipt = outbox.try_recv().unwrap();
        let parsed = CpimMessage::parse(&receipt.body).unwrap();
        let imdn = ImdnDocument::parse(&parsed.body).unwrap();
        assert_eq!(imdn.message_id, "deferred-1");
    }
}
