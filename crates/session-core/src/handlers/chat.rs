//! Chat payload processing, shared by every session kind that carries
//! messages.
//!
//! The pipeline is the same everywhere: unwrap the CPIM envelope, then
//! either digest an IMDN receipt into the message log or surface a chat
//! message, optionally answering with a delivery receipt. What varies per
//! session kind is only the [`ReceiptPolicy`].

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, trace, warn};

use rims_msrp_core::{generate_message_id, MsrpChunk};

use crate::chat::{CpimMessage, ImdnDocument, CPIM_CONTENT_TYPE, IMDN_CONTENT_TYPE};
use crate::delivery::ChatMessage;
use crate::events::SessionEvent;
use crate::handlers::SessionHandler;
use crate::session::{SessionContext, SessionKind};
use crate::state::SessionState;

/// Whether received chat messages are answered with IMDN receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReceiptPolicy {
    /// Never send receipts.
    None,
    /// Send a delivery receipt when the sender asked for one.
    OnRequest,
}

/// Handler for chat sessions we originate.
///
/// Consumes the receipts that come back for our sent messages; does not
/// generate receipts itself.
pub struct ChatHandler;

impl ChatHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChatHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionHandler for ChatHandler {
    fn kind(&self) -> SessionKind {
        SessionKind::OriginatingChat
    }

    fn accept_types(&self) -> Vec<String> {
        vec![CPIM_CONTENT_TYPE.to_string()]
    }

    async fn on_established(&self, ctx: &SessionContext) {
        debug!(session = %ctx.id, peer = %ctx.remote_party, "chat session ready");
    }

    async fn on_payload(&self, ctx: &SessionContext, chunk: MsrpChunk) {
        process_chat_payload(ctx, &chunk, ReceiptPolicy::None).await;
    }

    async fn on_closed(&self, ctx: &SessionContext, state: SessionState) {
        debug!(session = %ctx.id, %state, "chat session closed");
    }
}

/// Unwrap one payload chunk and act on it.
pub(crate) async fn process_chat_payload(
    ctx: &SessionContext,
    chunk: &MsrpChunk,
    receipts: ReceiptPolicy,
) {
    if chunk.is_empty_payload() {
        // Connection probes and bodyless chunks carry nothing to deliver.
        trace!(session = %ctx.id, "discarding empty payload");
        return;
    }

    let content_type = chunk.content_type.as_deref().unwrap_or_default();
    if content_type.eq_ignore_ascii_case(CPIM_CONTENT_TYPE) {
        match CpimMessage::parse(&chunk.body) {
            Ok(envelope) => handle_envelope(ctx, envelope, receipts).await,
            Err(e) => warn!(session = %ctx.id, error = %e, "dropping unparseable payload"),
        }
        return;
    }

    // Bare payload without an envelope; still worth surfacing.
    let message = ChatMessage {
        message_id: chunk
            .message_id
            .clone()
            .unwrap_or_else(generate_message_id),
        contact: ctx.remote_party.clone(),
        content_type: content_type.to_string(),
        body: String::from_utf8_lossy(&chunk.body).into_owned(),
        received_at: Utc::now(),
    };
    ctx.log().record_incoming(&ctx.remote_party, &message);
    ctx.emit(SessionEvent::MessageReceived { message });
}

async fn handle_envelope(ctx: &SessionContext, envelope: CpimMessage, receipts: ReceiptPolicy) {
    if envelope.is_imdn() {
        handle_receipt(ctx, &envelope);
        return;
    }

    let message_id = envelope
        .message_id
        .clone()
        .unwrap_or_else(generate_message_id);
    let message = ChatMessage {
        message_id: message_id.clone(),
        contact: envelope
            .from
            .clone()
            .unwrap_or_else(|| ctx.remote_party.clone()),
        content_type: envelope.content_type.clone(),
        body: envelope.body.clone(),
        received_at: Utc::now(),
    };
    ctx.log().record_incoming(&ctx.remote_party, &message);
    ctx.emit(SessionEvent::MessageReceived { message });

    if receipts == ReceiptPolicy::OnRequest && envelope.wants_delivery_receipt() {
        send_delivery_receipt(ctx, &envelope, &message_id).await;
    }
}

fn handle_receipt(ctx: &SessionContext, envelope: &CpimMessage) {
    let imdn = match ImdnDocument::parse(&envelope.body) {
        Ok(imdn) => imdn,
        Err(e) => {
            warn!(session = %ctx.id, error = %e, "dropping unparseable receipt");
            return;
        }
    };
    match imdn.status.outcome() {
        Some(outcome) => {
            ctx.log()
                .record_delivery_status(&imdn.message_id, &ctx.remote_party, outcome);
            ctx.emit(SessionEvent::DeliveryUpdate {
                message_id: imdn.message_id,
                outcome,
                contact: ctx.remote_party.clone(),
            });
        }
        None => debug!(
            session = %ctx.id,
            message_id = %imdn.message_id,
            "ignoring disposition without a log outcome"
        ),
    }
}

async fn send_delivery_receipt(ctx: &SessionContext, original: &CpimMessage, message_id: &str) {
    let imdn = match ImdnDocument::delivery_receipt(message_id).to_xml() {
        Ok(xml) => xml,
        Err(e) => {
            warn!(session = %ctx.id, error = %e, "could not build delivery receipt");
            return;
        }
    };
    let receipt = CpimMessage::new(IMDN_CONTENT_TYPE, imdn)
        .with_from(ctx.local_party.clone())
        .with_to(
            original
                .from
                .clone()
                .unwrap_or_else(|| ctx.remote_party.clone()),
        )
        .with_message_id(generate_message_id());

    match ctx.send_payload(CPIM_CONTENT_TYPE, receipt.encode()).await {
        Ok(()) => debug!(session = %ctx.id, message_id, "delivery receipt sent"),
        Err(e) => warn!(session = %ctx.id, error = %e, "could not send delivery receipt"),
    }
}
