//! Local node state advertised to remote peers.

use bytes::Bytes;
use parking_lot::RwLock;

use ident_proto::{Multiaddr, PeerId};

use crate::directory::{AddrSet, ProtocolSet};

/// The local node's identity plus its mutable listen addresses and protocols.
///
/// The owning node changes the sets; the identify flows only read them
/// through [`LocalPeer::snapshot`].
#[derive(Debug)]
pub struct LocalPeer {
    id: PeerId,
    public_key: Bytes,
    listen_addrs: RwLock<AddrSet>,
    protocols: RwLock<ProtocolSet>,
}

/// Copy of the local sets taken at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSnapshot {
    pub public_key: Bytes,
    pub listen_addrs: Vec<Multiaddr>,
    pub protocols: Vec<String>,
}

impl LocalPeer {
    pub fn new(public_key: impl Into<Bytes>) -> Self {
        let public_key = public_key.into();
        Self {
            id: PeerId::from_public_key(&public_key),
            public_key,
            listen_addrs: RwLock::new(AddrSet::new()),
            protocols: RwLock::new(ProtocolSet::new()),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn public_key(&self) -> &Bytes {
        &self.public_key
    }

    pub fn add_listen_addr(&self, addr: Multiaddr) -> bool {
        self.listen_addrs.write().insert(addr)
    }

    pub fn remove_listen_addr(&self, addr: &Multiaddr) -> bool {
        self.listen_addrs.write().remove(addr)
    }

    pub fn set_listen_addrs(&self, addrs: impl IntoIterator<Item = Multiaddr>) {
        self.listen_addrs.write().replace(addrs);
    }

    pub fn add_protocol(&self, protocol: impl Into<String>) -> bool {
        self.protocols.write().insert(protocol.into())
    }

    pub fn remove_protocol(&self, protocol: &str) -> bool {
        self.protocols.write().remove(&protocol.to_string())
    }

    pub fn set_protocols<I, S>(&self, protocols: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols.write().replace(protocols.into_iter().map(Into::into));
    }

    pub fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.listen_addrs.read().as_slice().to_vec()
    }

    pub fn protocols(&self) -> Vec<String> {
        self.protocols.read().as_slice().to_vec()
    }

    pub fn snapshot(&self) -> LocalSnapshot {
        LocalSnapshot {
            public_key: self.public_key.clone(),
            listen_addrs: self.listen_addrs(),
            protocols: self.protocols(),
        }
    }
}
