//! Domain variants of the identify message.
//!
//! Identify and identify-push share one wire schema but mean different
//! things: an identify response is a complete snapshot of the sender, while
//! a push carries only addresses and protocols and leaves identity alone.
//! Keeping them as separate types means a push can never be mistaken for a
//! response that happens to have empty identity fields.

use crate::types::Multiaddr;
use crate::v1::IdentifyV1;

// ============================================================================
// Identify response
// ============================================================================

/// Full identify response sent by the receiving side of a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifyInfo {
    pub protocol_version: String,
    pub agent_version: String,
    pub public_key: Vec<u8>,
    pub listen_addrs: Vec<Multiaddr>,
    /// Address the sender observed on this stream, if any
    pub observed_addr: Option<Multiaddr>,
    pub protocols: Vec<String>,
}

impl From<IdentifyInfo> for IdentifyV1 {
    fn from(info: IdentifyInfo) -> Self {
        Self {
            public_key: Some(info.public_key),
            listen_addrs: info.listen_addrs.iter().map(Multiaddr::to_vec).collect(),
            protocols: info.protocols,
            // No observation is sent as an empty field, not an absent one.
            observed_addr: Some(info.observed_addr.map(|a| a.to_vec()).unwrap_or_default()),
            protocol_version: Some(info.protocol_version),
            agent_version: Some(info.agent_version),
        }
    }
}

// ============================================================================
// Push update
// ============================================================================

/// Address and protocol update pushed to peers after a local change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PushUpdate {
    pub listen_addrs: Vec<Multiaddr>,
    pub protocols: Vec<String>,
}

impl From<PushUpdate> for IdentifyV1 {
    fn from(update: PushUpdate) -> Self {
        Self {
            listen_addrs: update.listen_addrs.iter().map(Multiaddr::to_vec).collect(),
            protocols: update.protocols,
            ..Default::default()
        }
    }
}

impl From<IdentifyV1> for PushUpdate {
    /// Identity fields are ignored; empty address entries are dropped.
    fn from(msg: IdentifyV1) -> Self {
        Self {
            listen_addrs: decode_addrs(&msg.listen_addrs),
            protocols: msg.protocols,
        }
    }
}

/// Decode a list of wire addresses, skipping empty entries.
pub fn decode_addrs(raw: &[Vec<u8>]) -> Vec<Multiaddr> {
    raw.iter().filter_map(|a| Multiaddr::from_wire(a)).collect()
}
