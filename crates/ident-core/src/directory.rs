//! Peer directory: what this node knows about remote peers.
//!
//! Each record sits behind its own lock, so merges from concurrent streams
//! that target the same peer are serialized while unrelated peers never
//! contend. The map itself is only locked long enough to find or insert a
//! record handle.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;

use ident_proto::{Multiaddr, PeerId};

// ============================================================================
// Ordered sets
// ============================================================================

/// A set that remembers insertion order.
///
/// Address and protocol lists are small, and callers expect them back in the
/// order the remote sent them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderedSet<T> {
    items: Vec<T>,
}

impl<T: PartialEq> OrderedSet<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Insert `item`; returns false if it was already present.
    pub fn insert(&mut self, item: T) -> bool {
        if self.items.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, item: &T) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i != item);
        self.items.len() != before
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Clear, then add every item from `items`.
    pub fn replace(&mut self, items: impl IntoIterator<Item = T>) {
        self.clear();
        for item in items {
            self.insert(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: PartialEq> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

pub type AddrSet = OrderedSet<Multiaddr>;
pub type ProtocolSet = OrderedSet<String>;

impl OrderedSet<String> {
    pub fn supports(&self, protocol: &str) -> bool {
        self.items.iter().any(|p| p == protocol)
    }
}

// ============================================================================
// Peer record
// ============================================================================

/// Why a received key could not be bound to a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindError {
    /// Key differs from the bound key, or does not hash to the record's id
    Mismatch,
    /// No key received and none bound
    MissingKey,
}

/// What an identify merge changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub bound_key: bool,
    pub added_addrs: usize,
    pub added_protocols: usize,
}

/// Everything known about one remote peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerRecord {
    pub id: PeerId,
    /// Public key bound to `id`, once established
    pub public_key: Option<Bytes>,
    pub multiaddrs: AddrSet,
    pub protocols: ProtocolSet,
}

impl PeerRecord {
    /// Empty record with no bound identity.
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            public_key: None,
            multiaddrs: AddrSet::new(),
            protocols: ProtocolSet::new(),
        }
    }

    /// Empty record already bound to `public_key`.
    pub fn with_public_key(public_key: impl Into<Bytes>) -> Self {
        let public_key = public_key.into();
        let mut record = Self::new(PeerId::from_public_key(&public_key));
        record.public_key = Some(public_key);
        record
    }

    /// Check a received key against this record without changing it.
    ///
    /// Returns the key to bind when the record has none yet.
    pub fn check_identity(&self, received: Option<&[u8]>) -> Result<Option<Bytes>, BindError> {
        match (&self.public_key, received) {
            (Some(bound), Some(key)) if bound.as_ref() != key => Err(BindError::Mismatch),
            (Some(_), _) => Ok(None),
            (None, Some(key)) => {
                if PeerId::from_public_key(key) != self.id {
                    return Err(BindError::Mismatch);
                }
                Ok(Some(Bytes::copy_from_slice(key)))
            }
            (None, None) => Err(BindError::MissingKey),
        }
    }

    /// Merge an identify response: bind the key if needed, then union-add
    /// addresses and protocols. On error nothing is changed.
    pub fn merge_identify(
        &mut self,
        public_key: Option<&[u8]>,
        addrs: impl IntoIterator<Item = Multiaddr>,
        protocols: impl IntoIterator<Item = String>,
    ) -> Result<MergeStats, BindError> {
        let to_bind = self.check_identity(public_key)?;

        let mut stats = MergeStats::default();
        if let Some(key) = to_bind {
            self.public_key = Some(key);
            stats.bound_key = true;
        }
        for addr in addrs {
            if self.multiaddrs.insert(addr) {
                stats.added_addrs += 1;
            }
        }
        for protocol in protocols {
            if self.protocols.insert(protocol) {
                stats.added_protocols += 1;
            }
        }
        Ok(stats)
    }

    /// Apply a push: the sender's address and protocol sets replace ours.
    /// Identity is untouched.
    pub fn replace_from_push(
        &mut self,
        addrs: impl IntoIterator<Item = Multiaddr>,
        protocols: impl IntoIterator<Item = String>,
    ) {
        self.multiaddrs.replace(addrs);
        self.protocols.replace(protocols);
    }
}

// ============================================================================
// Directory
// ============================================================================

/// Shared, individually locked peer record.
pub type PeerHandle = Arc<Mutex<PeerRecord>>;

/// Lookup and creation of peer records.
pub trait PeerDirectory: Send + Sync {
    /// Record for `id`, created empty if unknown.
    fn get_or_create(&self, id: &PeerId) -> PeerHandle;

    fn get(&self, id: &PeerId) -> Option<PeerHandle>;

    /// Whether `id` is known to support `protocol`.
    fn supports(&self, id: &PeerId, protocol: &str) -> bool {
        match self.get(id) {
            Some(handle) => {
                let record = handle.lock();
                record.protocols.supports(protocol)
            }
            None => false,
        }
    }

    /// Copy of the current record for `id`.
    fn snapshot(&self, id: &PeerId) -> Option<PeerRecord> {
        self.get(id).map(|handle| handle.lock().clone())
    }
}

/// In-memory peer directory.
#[derive(Default)]
pub struct InMemoryDirectory {
    peers: DashMap<PeerId, PeerHandle>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record, e.g. one learned out of band.
    pub fn insert(&self, record: PeerRecord) -> PeerHandle {
        let handle = Arc::new(Mutex::new(record));
        let id = handle.lock().id;
        self.peers.insert(id, handle.clone());
        handle
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.iter().map(|entry| *entry.key()).collect()
    }
}

impl PeerDirectory for InMemoryDirectory {
    fn get_or_create(&self, id: &PeerId) -> PeerHandle {
        self.peers
            .entry(*id)
            .or_insert_with(|| Arc::new(Mutex::new(PeerRecord::new(*id))))
            .clone()
    }

    fn get(&self, id: &PeerId) -> Option<PeerHandle> {
        self.peers.get(id).map(|entry| entry.value().clone())
    }
}
