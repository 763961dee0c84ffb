//! HTTP file transfer push sessions.
//!
//! Files never travel over the session itself. The network pushes an XML
//! descriptor naming the uploaded file's URL, size and validity; the
//! application fetches it over HTTP on its own. This handler surfaces the
//! descriptor as a received message, with its distinctive content type
//! intact so the application can tell it from chat.

use async_trait::async_trait;
use tracing::debug;

use rims_msrp_core::MsrpChunk;

use crate::chat::CPIM_CONTENT_TYPE;
use crate::handlers::chat::{process_chat_payload, ReceiptPolicy};
use crate::handlers::SessionHandler;
use crate::session::{SessionContext, SessionKind, FILE_TRANSFER_ACCEPT_TYPE};
use crate::state::SessionState;

pub struct FileTransferHandler;

impl FileTransferHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileTransferHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionHandler for FileTransferHandler {
    fn kind(&self) -> SessionKind {
        SessionKind::HttpFileTransfer
    }

    fn accept_types(&self) -> Vec<String> {
        vec![
            FILE_TRANSFER_ACCEPT_TYPE.to_string(),
            CPIM_CONTENT_TYPE.to_string(),
        ]
    }

    async fn on_established(&self, ctx: &SessionContext) {
        debug!(session = %ctx.id, peer = %ctx.remote_party, "awaiting file descriptor");
    }

    async fn on_payload(&self, ctx: &SessionContext, chunk: MsrpChunk) {
        process_chat_payload(ctx, &chunk, ReceiptPolicy::OnRequest).await;
    }

    async fn on_closed(&self, ctx: &SessionContext, state: SessionState) {
        debug!(session = %ctx.id, %state, "file transfer session closed");
    }
}
