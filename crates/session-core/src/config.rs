//! Engine configuration.

use std::net::SocketAddr;
use std::time::Duration;

use rims_dialog_core::ManagerConfig;
use rims_msrp_core::MsrpConfig;
use rims_sip_core::types::{NameAddr, SipUri};

use crate::media::SetupRole;

/// Default channel capacity for session command and event channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Everything the engine needs to know about its local identity and timing.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Local user part, e.g. `alice`.
    pub local_user: String,
    /// Local host advertised in URIs, Via and SDP.
    pub local_host: String,
    /// Local signaling port.
    pub sip_port: u16,
    /// Local MSRP listening port.
    pub msrp_port: u16,
    /// Where outbound signaling goes (the serving proxy or the peer).
    pub signaling_peer: SocketAddr,
    /// Setup role offered in originated sessions.
    pub setup_offer: SetupRole,
    /// Delay between alerting (180) and auto-answering an incoming session.
    pub answer_delay: Duration,
    /// Tear the session down after this long without media activity.
    pub inactivity_timeout: Duration,
    /// Signaling transaction tuning.
    pub manager: ManagerConfig,
    /// Media setup tuning.
    pub msrp: MsrpConfig,
    /// Capacity for per-session channels.
    pub channel_capacity: usize,
}

impl EngineConfig {
    /// A config for `user` at `host`, with everything else defaulted.
    pub fn new(
        local_user: impl Into<String>,
        local_host: impl Into<String>,
        signaling_peer: SocketAddr,
    ) -> Self {
        Self {
            local_user: local_user.into(),
            local_host: local_host.into(),
            sip_port: 5060,
            msrp_port: 2855,
            signaling_peer,
            setup_offer: SetupRole::ActPass,
            answer_delay: Duration::ZERO,
            inactivity_timeout: Duration::from_secs(300),
            manager: ManagerConfig::default(),
            msrp: MsrpConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Our SIP URI.
    pub fn local_uri(&self) -> SipUri {
        SipUri::new(&self.local_user, &self.local_host)
    }

    /// Our address-of-record for From headers.
    pub fn local_party(&self) -> NameAddr {
        NameAddr::new(self.local_uri())
    }

    /// Our Contact, carrying the signaling port.
    pub fn contact(&self) -> NameAddr {
        NameAddr::new(SipUri::new(&self.local_user, &self.local_host).with_port(self.sip_port))
    }

    /// `sent-by` value for Via headers.
    pub fn local_via(&self) -> String {
        format!("{}:{}", self.local_host, self.sip_port)
    }

    /// Our signaling address.
    pub fn local_signaling_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.local_host, self.sip_port).parse().ok()
    }
}
