//! SDP offer/answer negotiation for MSRP media.
//!
//! Negotiation decides exactly one thing that matters operationally: who
//! dials the media connection. The offerer's `a=setup` attribute is
//! inverted to pick our role, with `actpass` resolved to us staying
//! passive. Everything else (paths, accept-types, direction) is carried
//! through into a [`NegotiatedMedia`] the media manager can act on.
//!
//! Two wire conventions are preserved deliberately: a passive answer puts
//! the reserved placeholder port [`RESERVED_SETUP_PORT`] in its `m=` line
//! (the real port travels in `a=path`, which is authoritative for MSRP),
//! and answer attributes are emitted in a fixed order that interoperating
//! stacks are known to cope with.

use chrono::Utc;
use tracing::debug;

use rims_msrp_core::{msrp_uri, MsrpEndpoint, MsrpRole};
use rims_sip_core::sdp::{
    ntp_timestamp, MediaDescription, SdpAttribute, SdpConnection, SdpSession,
};

use crate::error::{Result, SessionError};

/// Placeholder port advertised in the `m=` line when we do not expect the
/// peer to dial it. The authoritative port rides in `a=path`.
pub const RESERVED_SETUP_PORT: u16 = 9;

/// Connection setup role from `a=setup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupRole {
    /// This party dials.
    Active,
    /// This party listens.
    #[default]
    Passive,
    /// Offerer leaves the choice to the answerer.
    ActPass,
}

impl SetupRole {
    /// Attribute value form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Passive => "passive",
            Self::ActPass => "actpass",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "passive" => Some(Self::Passive),
            "actpass" => Some(Self::ActPass),
            _ => None,
        }
    }

    /// The role we take when answering an offer carrying this role.
    ///
    /// `actpass` resolves to the peer staying active, i.e. us passive.
    pub fn answer_role(&self) -> SetupRole {
        match self {
            Self::Active => Self::Passive,
            Self::Passive => Self::Active,
            Self::ActPass => Self::Passive,
        }
    }
}

impl std::fmt::Display for SetupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media flow direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaDirection {
    /// Both directions.
    #[default]
    SendRecv,
    /// This party only sends.
    SendOnly,
    /// This party only receives.
    RecvOnly,
    /// No media flows.
    Inactive,
}

impl MediaDirection {
    /// Attribute name form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendRecv => "sendrecv",
            Self::SendOnly => "sendonly",
            Self::RecvOnly => "recvonly",
            Self::Inactive => "inactive",
        }
    }

    /// The direction seen from the other party.
    pub fn reverse(&self) -> MediaDirection {
        match self {
            Self::SendRecv => Self::SendRecv,
            Self::SendOnly => Self::RecvOnly,
            Self::RecvOnly => Self::SendOnly,
            Self::Inactive => Self::Inactive,
        }
    }

    fn from_media(media: &MediaDescription) -> MediaDirection {
        for direction in [
            Self::SendRecv,
            Self::SendOnly,
            Self::RecvOnly,
            Self::Inactive,
        ] {
            if media.has_attribute(direction.as_str()) {
                return direction;
            }
        }
        Self::default()
    }
}

/// The peer's side of negotiation, parsed from its SDP.
///
/// The same shape covers both an incoming offer and an incoming answer;
/// `setup` is always the role the peer declared for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaOffer {
    /// Peer's MSRP path.
    pub path: String,
    /// Peer host from the connection line.
    pub host: String,
    /// Peer port from the media line.
    pub port: u16,
    /// Peer's declared setup role; absent defaults to passive.
    pub setup: SetupRole,
    /// Content types the peer accepts.
    pub accept_types: Vec<String>,
    /// Peer's media direction.
    pub direction: MediaDirection,
}

impl MediaOffer {
    /// Parse the MSRP media description out of an SDP session.
    pub fn from_sdp(sdp: &SdpSession) -> Result<Self> {
        let media = sdp
            .media
            .iter()
            .find(|m| m.media == "message" && m.protocol.contains("MSRP"))
            .ok_or_else(|| SessionError::negotiation("no MSRP media description"))?;

        let path = media
            .attribute("path")
            .ok_or_else(|| SessionError::negotiation("media description has no path"))?
            .to_string();
        let host = sdp
            .connection_address(media)
            .ok_or_else(|| SessionError::negotiation("no connection address"))?
            .to_string();

        let setup = match media.attribute("setup") {
            Some(value) => SetupRole::parse(value).ok_or_else(|| {
                SessionError::negotiation(format!("invalid setup attribute: {value}"))
            })?,
            None => SetupRole::default(),
        };

        let accept_types = media
            .attribute("accept-types")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            path,
            host,
            port: media.port,
            setup,
            accept_types,
            direction: MediaDirection::from_media(media),
        })
    }

    /// Whether the peer accepts `content_type` (or declared no list at all).
    pub fn accepts(&self, content_type: &str) -> bool {
        self.accept_types.is_empty()
            || self
                .accept_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(content_type) || t == "*")
    }
}

/// Our side of negotiation.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    /// Host we advertise.
    pub host: String,
    /// Our real MSRP port.
    pub port: u16,
    /// Session id used in our MSRP path.
    pub session_id: String,
    /// Content types we accept.
    pub accept_types: Vec<String>,
}

impl LocalMedia {
    /// Our MSRP path.
    pub fn path(&self) -> String {
        msrp_uri(&self.host, self.port, &self.session_id)
    }
}

/// Outcome of negotiation: everything media setup needs.
#[derive(Debug, Clone)]
pub struct NegotiatedMedia {
    /// Connection parameters for the media manager.
    pub endpoint: MsrpEndpoint,
    /// Content types agreed for the session.
    pub accept_types: Vec<String>,
    /// Our media direction.
    pub direction: MediaDirection,
}

fn session_level(host: &str) -> SdpSession {
    let now = ntp_timestamp(Utc::now());
    SdpSession::new()
        .with_origin(format!("- {now} {now} IN IP4 {host}"))
        .with_connection(SdpConnection::ip4(host))
}

fn msrp_media(port: u16) -> MediaDescription {
    MediaDescription::new("message", port, "TCP/MSRP", vec!["*".to_string()])
}

/// Build the SDP offer for a session we originate, declaring `setup_offer`
/// as our role.
pub fn build_offer(local: &LocalMedia, setup_offer: SetupRole) -> SdpSession {
    let port = match setup_offer {
        SetupRole::Active => RESERVED_SETUP_PORT,
        SetupRole::Passive | SetupRole::ActPass => local.port,
    };
    let media = msrp_media(port)
        .with_attribute(SdpAttribute::new(
            "accept-types",
            local.accept_types.join(" "),
        ))
        .with_attribute(SdpAttribute::new("connection", "new"))
        .with_attribute(SdpAttribute::new("setup", setup_offer.as_str()))
        .with_attribute(SdpAttribute::new("path", local.path()))
        .with_attribute(SdpAttribute::flag(MediaDirection::SendRecv.as_str()));
    session_level(&local.host).with_media(media)
}

/// Answer an offer, inverting the peer's setup role.
///
/// Returns the answer SDP and the negotiated parameters. A passive answer
/// advertises [`RESERVED_SETUP_PORT`] in its media line; the real port is
/// in the path.
pub fn build_answer(
    offer: &MediaOffer,
    local: &LocalMedia,
) -> Result<(SdpSession, NegotiatedMedia)> {
    let our_role = offer.setup.answer_role();
    let our_direction = offer.direction.reverse();
    debug!(
        peer_setup = %offer.setup,
        our_role = %our_role,
        "answering media offer"
    );

    let port = match our_role {
        SetupRole::Passive => RESERVED_SETUP_PORT,
        _ => local.port,
    };
    let media = msrp_media(port)
        .with_attribute(SdpAttribute::new(
            "accept-types",
            local.accept_types.join(" "),
        ))
        .with_attribute(SdpAttribute::new("connection", "new"))
        .with_attribute(SdpAttribute::new("setup", our_role.as_str()))
        .with_attribute(SdpAttribute::new("path", local.path()))
        .with_attribute(SdpAttribute::flag(our_direction.as_str()));
    let sdp = session_level(&local.host).with_media(media);

    Ok((sdp, negotiated(offer, local, our_role, our_direction)))
}

/// Digest the peer's answer to our offer.
///
/// The peer's declared role is definitive: if it answered `active` we stay
/// passive, otherwise we dial.
pub fn apply_answer(answer: &MediaOffer, local: &LocalMedia) -> NegotiatedMedia {
    let our_role = match answer.setup {
        SetupRole::Active => SetupRole::Passive,
        // An answer of actpass is malformed; treat the peer as passive.
        SetupRole::Passive | SetupRole::ActPass => SetupRole::Active,
    };
    negotiated(answer, local, our_role, answer.direction.reverse())
}

fn negotiated(
    peer: &MediaOffer,
    local: &LocalMedia,
    our_role: SetupRole,
    our_direction: MediaDirection,
) -> NegotiatedMedia {
    let role = match our_role {
        SetupRole::Active => MsrpRole::Active,
        SetupRole::Passive | SetupRole::ActPass => MsrpRole::Passive,
    };

    // The path URI is authoritative for where to dial; the connection and
    // media lines are the fallback.
    let (remote_host, remote_port) =
        parse_msrp_authority(&peer.path).unwrap_or((peer.host.clone(), peer.port));

    NegotiatedMedia {
        endpoint: MsrpEndpoint {
            role,
            remote_host,
            remote_port,
            local_port: local.port,
            local_path: local.path(),
            remote_path: peer.path.clone(),
        },
        accept_types: if peer.accept_types.is_empty() {
            local.accept_types.clone()
        } else {
            peer.accept_types.clone()
        },
        direction: our_direction,
    }
}

/// Pull `host` and `port` out of an `msrp://host:port/...` URI.
fn parse_msrp_authority(path: &str) -> Option<(String, u16)> {
    let rest = path.strip_prefix("msrp://").or_else(|| path.strip_prefix("msrps://"))?;
    let authority = rest.split('/').next()?;
    let (host, port) = authority.split_once(':')?;
    let port = port.parse().ok()?;
    Some((host.to_string(), port))
}
