//! Identify-push: announcing local address and protocol changes.
//!
//! A push is fire-and-forget. The sender opens a stream under the push
//! protocol, writes one framed `PushUpdate` and closes; the receiver replaces
//! its view of the sender's addresses and protocols. Nothing is read back.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use ident_proto::consts::PUSH_PROTOCOL;
use ident_proto::v1::IdentifyV1;
use ident_proto::{decode, encode, PeerId, PushUpdate};
use ident_transport::{FrameCodec, StreamOpener, Substream, TransportError};

use crate::directory::PeerDirectory;
use crate::errors::{IdentifyError, PushFailure};
use crate::identify::{bounded, close, shutdown, IdentifyService};

/// Per-target outcome of one [`IdentifyService::push`] call.
#[derive(Debug, Default)]
pub struct PushReport {
    pub delivered: Vec<PeerId>,
    /// Unknown peers and peers not advertising the push protocol
    pub skipped: Vec<PeerId>,
    pub failed: Vec<PushFailure>,
}

impl PushReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

impl IdentifyService {
    /// Send the current local addresses and protocols to every target that
    /// supports identify-push.
    ///
    /// Sends run concurrently and each target succeeds or fails on its own.
    /// Returns [`IdentifyError::PushFailed`] only when targets were attempted
    /// and none of them succeeded.
    pub async fn push(&self, targets: &[PeerId]) -> Result<PushReport, IdentifyError> {
        let mut report = PushReport::default();
        let mut attempts = Vec::new();
        for peer in targets {
            if attempts.contains(peer) || report.skipped.contains(peer) {
                continue;
            }
            if self.directory.supports(peer, PUSH_PROTOCOL) {
                attempts.push(*peer);
            } else {
                debug!(peer = %peer, "peer does not support identify push, skipping");
                report.skipped.push(*peer);
            }
        }

        if attempts.is_empty() {
            return Ok(report);
        }

        let snapshot = self.local.snapshot();
        let update = PushUpdate {
            listen_addrs: snapshot.listen_addrs,
            protocols: snapshot.protocols,
        };
        let payload = encode(&IdentifyV1::from(update));

        // Handles are kept per peer so a send that panics is still reported.
        let sends: Vec<_> = attempts
            .into_iter()
            .map(|peer| {
                let opener = self.opener.clone();
                let codec = self.codec;
                let timeout = self.config.io_timeout();
                let payload = payload.clone();
                let handle = tokio::spawn(send_push(opener, codec, timeout, peer, payload));
                (peer, handle)
            })
            .collect();

        for (peer, handle) in sends {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(TransportError::Io(io::Error::new(io::ErrorKind::Other, e))),
            };
            match result {
                Ok(()) => {
                    debug!(peer = %peer, "pushed identify update");
                    report.delivered.push(peer);
                }
                Err(error) => {
                    warn!(peer = %peer, error = %error, "identify push failed");
                    report.failed.push(PushFailure { peer, error });
                }
            }
        }

        if report.delivered.is_empty() {
            return Err(IdentifyError::PushFailed(report.failed));
        }
        Ok(report)
    }

    /// Apply an inbound push from `stream.remote_peer()`.
    ///
    /// A stream that closes without a message is not an error. A message that
    /// does not decode leaves the sender's record untouched.
    pub async fn respond_to_push<S>(&self, mut stream: S) -> Result<(), IdentifyError>
    where
        S: Substream,
    {
        let peer = stream.remote_peer();
        let read = bounded(self.config.io_timeout(), self.codec.read_frame(&mut stream)).await;
        close(&mut stream).await;

        let frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(peer = %peer, "identify push stream closed without a message");
                return Ok(());
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "failed to read identify push");
                return Err(IdentifyError::ReceiveFailed(e));
            }
        };

        let update = match decode(&frame) {
            Ok(msg) => PushUpdate::from(msg),
            Err(e) => {
                warn!(peer = %peer, error = %e, "malformed identify push");
                return Err(IdentifyError::MalformedMessage(e));
            }
        };

        let handle = self.directory.get_or_create(&peer);
        let (addrs, protocols) = (update.listen_addrs.len(), update.protocols.len());
        handle.lock().replace_from_push(update.listen_addrs, update.protocols);

        debug!(peer = %peer, addrs, protocols, "applied identify push");
        Ok(())
    }
}

async fn send_push(
    opener: Arc<dyn StreamOpener>,
    codec: FrameCodec,
    timeout: Option<Duration>,
    peer: PeerId,
    payload: Bytes,
) -> Result<(), TransportError> {
    let mut stream = bounded(timeout, opener.open_stream(&peer, PUSH_PROTOCOL)).await?;
    let written = bounded(timeout, codec.write_frame(&mut stream, &payload)).await;
    let closed = bounded(timeout, shutdown(&mut stream)).await;
    written.and(closed)?;
    Ok(())
}
