//! Per-kind session behavior.
//!
//! The session task drives signaling, media and lifecycle identically for
//! every session; what differs between a chat session, a deferred-message
//! delivery and a file transfer push is how payloads are interpreted.
//! That difference lives behind [`SessionHandler`], one implementation
//! per [`SessionKind`], resolved through a [`HandlerSet`] at session
//! creation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use rims_msrp_core::MsrpChunk;

use crate::session::{SessionContext, SessionKind};
use crate::state::SessionState;

pub mod chat;
pub mod filetransfer;
pub mod standfw;

pub use chat::ChatHandler;
pub use filetransfer::FileTransferHandler;
pub use standfw::StoreAndForwardHandler;

/// Behavior plugged into a session task for one session kind.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// The kind this handler runs.
    fn kind(&self) -> SessionKind;

    /// Content types advertised in our SDP for this kind.
    fn accept_types(&self) -> Vec<String>;

    /// Called once when the session reaches established.
    async fn on_established(&self, ctx: &SessionContext);

    /// Called for every payload chunk the peer sends.
    ///
    /// Handlers log and drop payloads they cannot understand; a bad
    /// payload never tears the session down.
    async fn on_payload(&self, ctx: &SessionContext, chunk: MsrpChunk);

    /// Called once after the session leaves the established phase.
    async fn on_closed(&self, ctx: &SessionContext, state: SessionState);
}

/// Handler lookup by session kind.
pub struct HandlerSet {
    handlers: HashMap<SessionKind, Arc<dyn SessionHandler>>,
}

impl HandlerSet {
    /// An empty set. Sessions of unregistered kinds are refused.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The stock handlers for all session kinds.
    pub fn defaults() -> Self {
        let mut set = Self::new();
        set.register(Arc::new(ChatHandler::new()));
        set.register(Arc::new(StoreAndForwardHandler::new()));
        set.register(Arc::new(FileTransferHandler::new()));
        set
    }

    /// Register `handler`, replacing any previous one for its kind.
    pub fn register(&mut self, handler: Arc<dyn SessionHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: SessionKind) -> Option<Arc<dyn SessionHandler>> {
        self.handlers.get(&kind).cloned()
    }
}

impl Default for HandlerSet {
    fn default() -> Self {
        Self::defaults()
    }
}
