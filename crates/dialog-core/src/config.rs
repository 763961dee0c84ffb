//! Configuration for the SIP manager.

use std::time::Duration;

/// Tunable parameters for [`SipManager`](crate::manager::SipManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How long `send_and_wait` waits for a transaction to complete before
    /// reporting a timeout.
    pub transaction_timeout: Duration,

    /// Lifetime of a registry entry. A new transaction with the same key may
    /// replace an entry older than this.
    pub transaction_ttl: Duration,

    /// Value for the `User-Agent` header on locally built requests.
    pub user_agent: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            // 64*T1 from RFC 3261 with T1 = 500ms.
            transaction_timeout: Duration::from_secs(32),
            transaction_ttl: Duration::from_secs(64),
            user_agent: concat!("rims/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
