//! In-memory transport for tests and local demos.
//!
//! Every node registered on a [`MemoryNetwork`] gets an [`Incoming`] queue.
//! Opening a stream creates a `tokio::io::duplex` pipe, keeps one end and
//! delivers the other end to the target node's queue, tagged with the
//! protocol it was opened under.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use dashmap::DashMap;
use ident_proto::{Multiaddr, PeerId};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::mpsc;

use crate::traits::{BoxSubstream, InboundStream, Incoming, StreamOpener, Substream, TransportError};

/// Bytes buffered in each direction of an in-memory pipe.
pub const PIPE_BUFFER_SIZE: usize = 16 * 1024;

/// Inbound streams queued per node before `open_stream` waits.
pub const INBOUND_QUEUE_DEPTH: usize = 64;

/// A node as seen by the network: its id and the address it dials from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub peer: PeerId,
    pub addr: Option<Multiaddr>,
}

impl Endpoint {
    pub fn new(peer: PeerId, addr: Option<Multiaddr>) -> Self {
        Self { peer, addr }
    }
}

/// One end of an in-memory pipe.
pub struct MemorySubstream {
    io: DuplexStream,
    remote: PeerId,
    observed: Option<Multiaddr>,
}

impl MemorySubstream {
    /// Create connected ends. The first is held by `local`, the second by `remote`;
    /// each end observes the other side's address.
    pub fn pair(local: &Endpoint, remote: &Endpoint) -> (Self, Self) {
        let (near, far) = tokio::io::duplex(PIPE_BUFFER_SIZE);
        let near = Self {
            io: near,
            remote: remote.peer,
            observed: remote.addr.clone(),
        };
        let far = Self {
            io: far,
            remote: local.peer,
            observed: local.addr.clone(),
        };
        (near, far)
    }
}

impl AsyncRead for MemorySubstream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemorySubstream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

impl Substream for MemorySubstream {
    fn remote_peer(&self) -> PeerId {
        self.remote
    }

    fn observed_addr(&self) -> Option<Multiaddr> {
        self.observed.clone()
    }
}

struct MemoryNode {
    addr: Option<Multiaddr>,
    protocols: Vec<String>,
    inbound: mpsc::Sender<InboundStream>,
}

/// Registry of in-memory nodes, shared by every [`MemoryTransport`].
#[derive(Default)]
pub struct MemoryNetwork {
    nodes: DashMap<PeerId, MemoryNode>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a node accepting `protocols`. Returns its outbound handle and
    /// the queue its inbound streams arrive on.
    pub fn listen(self: &Arc<Self>, local: Endpoint, protocols: &[&str]) -> (MemoryTransport, Incoming) {
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        self.nodes.insert(
            local.peer,
            MemoryNode {
                addr: local.addr.clone(),
                protocols: protocols.iter().map(|p| p.to_string()).collect(),
                inbound: tx,
            },
        );
        let transport = MemoryTransport {
            local,
            network: self.clone(),
        };
        (transport, rx)
    }

    /// Remove a node; later streams to it fail as unreachable.
    pub fn disconnect(&self, peer: &PeerId) {
        self.nodes.remove(peer);
    }

    pub fn is_registered(&self, peer: &PeerId) -> bool {
        self.nodes.contains_key(peer)
    }
}

/// Outbound side of one node on a [`MemoryNetwork`].
pub struct MemoryTransport {
    local: Endpoint,
    network: Arc<MemoryNetwork>,
}

impl MemoryTransport {
    pub fn local(&self) -> &Endpoint {
        &self.local
    }
}

#[async_trait]
impl StreamOpener for MemoryTransport {
    async fn open_stream(&self, peer: &PeerId, protocol: &str) -> Result<BoxSubstream, TransportError> {
        // Copy what we need out of the map before awaiting.
        let (inbound, addr) = {
            let node = self
                .network
                .nodes
                .get(peer)
                .ok_or(TransportError::Unreachable(*peer))?;
            if !node.protocols.iter().any(|p| p == protocol) {
                return Err(TransportError::ProtocolNotSupported {
                    peer: *peer,
                    protocol: protocol.to_string(),
                });
            }
            (node.inbound.clone(), node.addr.clone())
        };

        let remote = Endpoint::new(*peer, addr);
        let (near, far) = MemorySubstream::pair(&self.local, &remote);
        inbound
            .send(InboundStream {
                protocol: protocol.to_string(),
                stream: Box::new(far),
            })
            .await
            .map_err(|_| TransportError::Disconnected)?;

        Ok(Box::new(near))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn endpoint(name: &[u8], addr: &[u8]) -> Endpoint {
        Endpoint::new(PeerId::from_public_key(name), Multiaddr::from_wire(addr))
    }

    #[tokio::test]
    async fn test_pair_observes_other_side() {
        let a = endpoint(b"a", &[1]);
        let b = endpoint(b"b", &[2]);
        let (mut near, mut far) = MemorySubstream::pair(&a, &b);

        assert_eq!(near.remote_peer(), b.peer);
        assert_eq!(near.observed_addr(), b.addr);
        assert_eq!(far.remote_peer(), a.peer);
        assert_eq!(far.observed_addr(), a.addr);

        near.write_all(b"hello").await.unwrap();
        near.shutdown().await.unwrap();
        let mut out = Vec::new();
        far.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_open_stream_delivers_far_end() {
        let network = MemoryNetwork::new();
        let (alice, _alice_in) = network.listen(endpoint(b"alice", &[1]), &["/echo/1.0.0"]);
        let (_bob, mut bob_in) = network.listen(endpoint(b"bob", &[2]), &["/echo/1.0.0"]);
        let bob_id = PeerId::from_public_key(b"bob");

        let mut stream = alice.open_stream(&bob_id, "/echo/1.0.0").await.unwrap();
        let inbound = bob_in.recv().await.unwrap();
        assert_eq!(inbound.protocol, "/echo/1.0.0");
        assert_eq!(inbound.stream.remote_peer(), alice.local().peer);

        stream.write_all(b"x").await.unwrap();
        let mut byte = [0u8; 1];
        let mut far = inbound.stream;
        far.read_exact(&mut byte).await.unwrap();
        assert_eq!(&byte, b"x");
    }

    #[tokio::test]
    async fn test_open_stream_errors() {
        let network = MemoryNetwork::new();
        let (alice, _alice_in) = network.listen(endpoint(b"alice", &[1]), &[]);
        let (_bob, bob_in) = network.listen(endpoint(b"bob", &[2]), &["/echo/1.0.0"]);
        let bob_id = PeerId::from_public_key(b"bob");
        let carol_id = PeerId::from_public_key(b"carol");

        assert!(matches!(
            alice.open_stream(&carol_id, "/echo/1.0.0").await,
            Err(TransportError::Unreachable(_))
        ));
        assert!(matches!(
            alice.open_stream(&bob_id, "/other/1.0.0").await,
            Err(TransportError::ProtocolNotSupported { .. })
        ));

        drop(bob_in);
        assert!(matches!(
            alice.open_stream(&bob_id, "/echo/1.0.0").await,
            Err(TransportError::Disconnected)
        ));

        network.disconnect(&bob_id);
        assert!(!network.is_registered(&bob_id));
    }
}
