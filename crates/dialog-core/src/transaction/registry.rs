//! Pending-transaction registry.
//!
//! The registry is a single map from [`TransactionKey`] to a one-shot
//! completion slot. Whoever sends a message that expects an answer registers
//! first, sends second, and then waits on the returned
//! [`TransactionHandle`]. The manager's event loop completes entries as
//! matching responses and ACKs arrive; a completion for a key with no entry
//! is reported to the caller as a miss and otherwise ignored, since it is
//! almost always a retransmission.
//!
//! Entries carry a TTL. Registering over a live entry is an error
//! ([`DialogError::DuplicateTransaction`]); registering over an expired one
//! replaces it, and the stale waiter observes a timeout.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

use rims_sip_core::types::{SipRequest, SipResponse};

use crate::error::{DialogError, Result};
use crate::transaction::key::TransactionKey;

/// How a transaction ended.
#[derive(Debug)]
pub enum TransactionOutcome {
    /// A final response arrived.
    Response(SipResponse),
    /// The ACK for a locally sent 2xx arrived.
    Ack(SipRequest),
    /// Nothing arrived in time.
    Timeout,
}

impl TransactionOutcome {
    /// The final response, if that is what completed the transaction.
    pub fn response(&self) -> Option<&SipResponse> {
        match self {
            Self::Response(response) => Some(response),
            _ => None,
        }
    }

    /// Whether the transaction timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

struct PendingTransaction {
    completer: oneshot::Sender<TransactionOutcome>,
    expires_at: Instant,
}

/// Registry of transactions waiting for an answer.
#[derive(Default)]
pub struct TransactionRegistry {
    inner: Mutex<HashMap<TransactionKey, PendingTransaction>>,
}

impl TransactionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transaction expecting an answer within `ttl`.
    ///
    /// Fails with [`DialogError::DuplicateTransaction`] if an unexpired entry
    /// with the same key exists. An expired entry is silently replaced; its
    /// waiter sees a timeout.
    pub fn register(
        &self,
        key: TransactionKey,
        ttl: Duration,
    ) -> Result<oneshot::Receiver<TransactionOutcome>> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();

        let mut inner = self.inner.lock();
        if let Some(existing) = inner.get(&key) {
            if existing.expires_at > now {
                return Err(DialogError::duplicate_transaction(key.to_string()));
            }
            debug!(%key, "replacing expired transaction entry");
        }
        inner.insert(
            key,
            PendingTransaction {
                completer: tx,
                expires_at: now + ttl,
            },
        );
        Ok(rx)
    }

    /// Complete the transaction for `key`, delivering `outcome` to its
    /// waiter. Returns `false` when no entry matches.
    pub fn complete(&self, key: &TransactionKey, outcome: TransactionOutcome) -> bool {
        let entry = self.inner.lock().remove(key);
        match entry {
            Some(pending) => {
                if pending.completer.send(outcome).is_err() {
                    trace!(%key, "transaction waiter already gone");
                }
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `key` without completing it. Returns whether an
    /// entry was present.
    pub fn remove(&self, key: &TransactionKey) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no transactions are pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Waiting end of a registered transaction.
///
/// Obtained from
/// [`SipManager::send_with_context`](crate::manager::SipManager::send_with_context).
#[derive(Debug)]
pub struct TransactionHandle {
    key: TransactionKey,
    receiver: oneshot::Receiver<TransactionOutcome>,
    registry: std::sync::Arc<TransactionRegistry>,
}

impl TransactionHandle {
    pub(crate) fn new(
        key: TransactionKey,
        receiver: oneshot::Receiver<TransactionOutcome>,
        registry: std::sync::Arc<TransactionRegistry>,
    ) -> Self {
        Self {
            key,
            receiver,
            registry,
        }
    }

    /// Key of the transaction being waited on.
    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    /// Wait up to `timeout` for the transaction to complete.
    ///
    /// On timeout the registry entry is removed by the waiter itself, so a
    /// late answer is treated like any other unmatched message.
    pub async fn wait(self, timeout: Duration) -> TransactionOutcome {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                // Completer dropped without sending: our entry was replaced
                // after expiry. The key may already belong to a newer
                // transaction, so leave the registry alone.
                TransactionOutcome::Timeout
            }
            Err(_) => {
                debug!(key = %self.key, "transaction wait timed out");
                self.registry.remove(&self.key);
                TransactionOutcome::Timeout
            }
        }
    }
}

impl std::fmt::Debug for TransactionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRegistry")
            .field("pending", &self.len())
            .finish()
    }
}
