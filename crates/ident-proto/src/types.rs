//! Peer identifiers and opaque address encodings.

use std::fmt;

use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Size of a peer identifier (SHA-256 digest of the public key).
pub const PEER_ID_SIZE: usize = 32;

/// Stable peer identifier.
///
/// Derived from the peer's public identity key, so a key received over the
/// wire can be checked against the identifier a connection was opened for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; PEER_ID_SIZE]);

impl PeerId {
    /// Derive the identifier bound to `public_key`: id = sha256(key bytes).
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut id = [0u8; PEER_ID_SIZE];
        id.copy_from_slice(&digest);
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; PEER_ID_SIZE] {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl TryFrom<&[u8]> for PeerId {
    type Error = &'static str;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let id: [u8; PEER_ID_SIZE] = value
            .try_into()
            .map_err(|_| "peer id must be exactly 32 bytes")?;
        Ok(Self(id))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.short())
    }
}

/// A self-describing network address, carried as opaque bytes.
///
/// The bytes are never interpreted here; parsing belongs to the transport
/// that produced them. An empty byte string is not an address.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Multiaddr(Bytes);

impl Multiaddr {
    /// Wrap non-empty address bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Option<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            None
        } else {
            Some(Self(bytes))
        }
    }

    /// Decode an address field from the wire. Empty fields mean "no address".
    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        Self::new(Bytes::copy_from_slice(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiaddr({})", hex::encode(&self.0))
    }
}
