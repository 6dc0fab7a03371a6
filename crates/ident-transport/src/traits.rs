//! Transport traits consumed by the identify flows.

use async_trait::async_trait;
use ident_proto::{Multiaddr, PeerId};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::framing::FramingError;

/// A negotiated, bidirectional byte stream to one remote peer.
///
/// Protocol selection has already happened by the time a `Substream` exists;
/// the identify flows only read and write message bytes on it.
pub trait Substream: AsyncRead + AsyncWrite + Send + Unpin {
    /// Peer on the other end of the underlying connection.
    fn remote_peer(&self) -> PeerId;

    /// Address the remote peer is connecting from, as observed locally.
    /// `None` when the transport has no address to report.
    fn observed_addr(&self) -> Option<Multiaddr>;
}

impl<S: Substream + ?Sized> Substream for Box<S> {
    fn remote_peer(&self) -> PeerId {
        (**self).remote_peer()
    }

    fn observed_addr(&self) -> Option<Multiaddr> {
        (**self).observed_addr()
    }
}

/// Boxed substream handed between transport and protocol handlers.
pub type BoxSubstream = Box<dyn Substream>;

/// Opens outbound substreams under a given protocol identifier.
#[async_trait]
pub trait StreamOpener: Send + Sync {
    /// Open a stream to `peer` negotiated for `protocol`.
    async fn open_stream(&self, peer: &PeerId, protocol: &str) -> Result<BoxSubstream, TransportError>;
}

/// A stream a remote peer opened, tagged with the protocol it was opened under.
pub struct InboundStream {
    pub protocol: String,
    pub stream: BoxSubstream,
}

/// Receiving side of accepted inbound streams.
pub type Incoming = mpsc::Receiver<InboundStream>;

/// Common transport error type
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Peer unreachable: {0}")]
    Unreachable(PeerId),

    #[error("Protocol {protocol} not supported by peer {peer}")]
    ProtocolNotSupported { peer: PeerId, protocol: String },

    #[error("Transport disconnected")]
    Disconnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),
}
