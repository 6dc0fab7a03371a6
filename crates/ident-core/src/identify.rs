//! Identify exchange: learning a remote peer's key, addresses and protocols.
//!
//! The side that accepts an identify stream speaks first: it writes a single
//! framed `IdentifyInfo` describing itself and closes. The side that opened
//! the stream writes nothing, reads that one message and merges it into its
//! directory.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use ident_proto::consts::IDENTIFY_PROTOCOL;
use ident_proto::message::decode_addrs;
use ident_proto::v1::IdentifyV1;
use ident_proto::{decode, encode, IdentifyInfo, Multiaddr, PeerId};
use ident_transport::{FrameCodec, FramingError, StreamOpener, Substream};

use crate::config::IdentifyConfig;
use crate::directory::{BindError, PeerDirectory, PeerRecord};
use crate::errors::{IdentifyError, IdentifyFailure};
use crate::local::LocalPeer;

/// Result of a successful outbound identify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifyOutcome {
    /// The peer's record right after the merge
    pub peer: PeerRecord,
    /// How the remote sees us, if it said
    pub observed_addr: Option<Multiaddr>,
    pub protocol_version: Option<String>,
    pub agent_version: Option<String>,
}

/// Runs both identify flows and both identify-push flows for one local node.
pub struct IdentifyService {
    pub(crate) config: IdentifyConfig,
    pub(crate) codec: FrameCodec,
    pub(crate) local: Arc<LocalPeer>,
    pub(crate) directory: Arc<dyn PeerDirectory>,
    pub(crate) opener: Arc<dyn StreamOpener>,
}

impl IdentifyService {
    pub fn new(
        config: IdentifyConfig,
        local: Arc<LocalPeer>,
        directory: Arc<dyn PeerDirectory>,
        opener: Arc<dyn StreamOpener>,
    ) -> Self {
        let codec = FrameCodec::new(config.max_message_size);
        Self {
            config,
            codec,
            local,
            directory,
            opener,
        }
    }

    pub fn config(&self) -> &IdentifyConfig {
        &self.config
    }

    pub fn local(&self) -> &Arc<LocalPeer> {
        &self.local
    }

    pub fn directory(&self) -> &Arc<dyn PeerDirectory> {
        &self.directory
    }

    /// Open an identify stream to `peer` and run [`identify`](Self::identify) on it.
    pub async fn identify_peer(&self, peer: &PeerId) -> Result<IdentifyOutcome, IdentifyError> {
        let stream = bounded(self.config.io_timeout(), self.opener.open_stream(peer, IDENTIFY_PROTOCOL))
            .await
            .map_err(IdentifyFailure::from)?;
        self.identify(stream, peer).await
    }

    /// Read the remote's identify response from `stream` and merge it into
    /// the record for `expected`.
    ///
    /// Nothing is written. The directory is only changed when the whole
    /// response is accepted; a key that conflicts with the one bound to
    /// `expected` is [`IdentifyError::IdentityMismatch`].
    pub async fn identify<S>(&self, mut stream: S, expected: &PeerId) -> Result<IdentifyOutcome, IdentifyError>
    where
        S: Substream,
    {
        let read = bounded(self.config.io_timeout(), self.codec.read_frame(&mut stream)).await;
        close(&mut stream).await;

        let frame = read
            .map_err(IdentifyFailure::from)?
            .ok_or(IdentifyFailure::NoResponse)?;
        let msg = decode(&frame).map_err(IdentifyFailure::from)?;
        let observed_addr = msg.observed_addr.as_deref().and_then(Multiaddr::from_wire);

        let key = msg.public_key.as_deref();
        let handle = match self.directory.get(expected) {
            Some(handle) => handle,
            None => {
                // Unknown peers only get a record once the key checks out.
                PeerRecord::new(*expected)
                    .check_identity(key)
                    .map_err(|e| rejected(expected, e))?;
                self.directory.get_or_create(expected)
            }
        };
        let (peer, stats) = {
            let mut record = handle.lock();
            let stats = record
                .merge_identify(key, decode_addrs(&msg.listen_addrs), msg.protocols)
                .map_err(|e| rejected(expected, e))?;
            (record.clone(), stats)
        };

        debug!(
            peer = %expected,
            bound_key = stats.bound_key,
            added_addrs = stats.added_addrs,
            added_protocols = stats.added_protocols,
            "identified peer"
        );

        Ok(IdentifyOutcome {
            peer,
            observed_addr,
            protocol_version: msg.protocol_version,
            agent_version: msg.agent_version,
        })
    }

    /// Answer an inbound identify stream with a snapshot of the local node.
    pub async fn respond<S>(&self, mut stream: S) -> Result<(), IdentifyError>
    where
        S: Substream,
    {
        let peer = stream.remote_peer();
        let snapshot = self.local.snapshot();
        let info = IdentifyInfo {
            protocol_version: self.config.protocol_version.clone(),
            agent_version: self.config.agent_version.clone(),
            public_key: snapshot.public_key.to_vec(),
            listen_addrs: snapshot.listen_addrs,
            observed_addr: stream.observed_addr(),
            protocols: snapshot.protocols,
        };
        let payload = encode(&IdentifyV1::from(info));

        let timeout = self.config.io_timeout();
        let written = bounded(timeout, self.codec.write_frame(&mut stream, &payload)).await;
        let closed = bounded(timeout, shutdown(&mut stream)).await;

        match written.and(closed) {
            Ok(()) => {
                debug!(peer = %peer, bytes = payload.len(), "sent identify response");
                Ok(())
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "failed to send identify response");
                Err(IdentifyError::RespondFailed(e))
            }
        }
    }
}

fn rejected(peer: &PeerId, e: BindError) -> IdentifyError {
    let error = match e {
        BindError::Mismatch => IdentifyError::IdentityMismatch { peer: *peer },
        BindError::MissingKey => IdentifyFailure::MissingPublicKey.into(),
    };
    warn!(peer = %peer, error = %error, "rejected identify response");
    error
}

/// Run `fut` under an optional deadline; expiry becomes `FramingError::Timeout`.
pub(crate) async fn bounded<F, T, E>(limit: Option<Duration>, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<FramingError>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| E::from(FramingError::Timeout))?,
        None => fut.await,
    }
}

pub(crate) async fn shutdown<W>(stream: &mut W) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    stream.shutdown().await?;
    Ok(())
}

/// Shut a stream down after a read; failure only matters for logging.
pub(crate) async fn close<S>(stream: &mut S)
where
    S: Substream + ?Sized,
{
    if let Err(e) = stream.shutdown().await {
        debug!(peer = %stream.remote_peer(), error = %e, "stream shutdown failed");
    }
}
