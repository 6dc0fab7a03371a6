//! Error types for the identify flows.
//!
//! Decode and identity errors are never swallowed inside a flow: they are
//! returned to whoever started the read. Nothing here is retried
//! automatically; retry policy belongs to the owning node.

use thiserror::Error;

use ident_proto::{CodecError, PeerId};
use ident_transport::{FramingError, TransportError};

/// Why an outbound identify produced no usable response.
#[derive(Debug, Error)]
pub enum IdentifyFailure {
    /// Stream closed before any message arrived
    #[error("remote closed the stream without responding")]
    NoResponse,

    /// The response did not parse
    #[error(transparent)]
    Malformed(#[from] CodecError),

    /// No key in the response and none bound for the peer yet
    #[error("response carries no public key and the peer has no bound identity")]
    MissingPublicKey,

    /// Frame could not be read
    #[error("failed to read response: {0}")]
    Framing(#[from] FramingError),

    /// Stream to the peer could not be opened
    #[error("failed to open identify stream: {0}")]
    Transport(#[from] TransportError),
}

/// A push that did not reach one target.
#[derive(Debug, Error)]
#[error("push to {peer} failed: {error}")]
pub struct PushFailure {
    pub peer: PeerId,
    #[source]
    pub error: TransportError,
}

/// Errors returned by the identify and identify-push flows.
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// Bytes do not parse as the identify schema
    #[error(transparent)]
    MalformedMessage(CodecError),

    /// Outbound identify got no usable response; the directory is unchanged
    #[error("identify failed: {0}")]
    IdentifyFailed(#[from] IdentifyFailure),

    /// Received key conflicts with the identity bound to the peer; the directory is unchanged
    #[error("identity mismatch for peer {peer}")]
    IdentityMismatch { peer: PeerId },

    /// An inbound push frame could not be read
    #[error("failed to read identify push: {0}")]
    ReceiveFailed(#[source] FramingError),

    /// Sending an identify response failed
    #[error("failed to send identify response: {0}")]
    RespondFailed(#[source] FramingError),

    /// Every attempted push target failed
    #[error("identify push failed for all {} targets", .0.len())]
    PushFailed(Vec<PushFailure>),

    /// A stream arrived under a protocol with no registered handler
    #[error("no handler registered for protocol {0}")]
    UnregisteredProtocol(String),
}

impl IdentifyError {
    /// Fatal errors must not be retried; the caller decides whether to drop the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IdentifyError::IdentityMismatch { .. })
    }

    /// Whether the error was caused by the remote peer rather than local configuration.
    pub fn is_remote_fault(&self) -> bool {
        match self {
            IdentifyError::MalformedMessage(_)
            | IdentifyError::IdentifyFailed(_)
            | IdentifyError::IdentityMismatch { .. }
            | IdentifyError::ReceiveFailed(_) => true,
            IdentifyError::RespondFailed(_)
            | IdentifyError::PushFailed(_)
            | IdentifyError::UnregisteredProtocol(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let peer = PeerId::from_public_key(b"k");
        let mismatch = IdentifyError::IdentityMismatch { peer };
        assert!(mismatch.is_fatal());
        assert!(mismatch.is_remote_fault());

        let unregistered = IdentifyError::UnregisteredProtocol("/x/1.0.0".into());
        assert!(!unregistered.is_fatal());
        assert!(!unregistered.is_remote_fault());

        let failed = IdentifyError::from(IdentifyFailure::NoResponse);
        assert!(!failed.is_fatal());
        assert!(failed.is_remote_fault());
    }

    #[test]
    fn test_push_failed_display_counts_targets() {
        let failures = vec![
            PushFailure {
                peer: PeerId::from_public_key(b"a"),
                error: TransportError::Disconnected,
            },
            PushFailure {
                peer: PeerId::from_public_key(b"b"),
                error: TransportError::Disconnected,
            },
        ];
        let err = IdentifyError::PushFailed(failures);
        assert_eq!(err.to_string(), "identify push failed for all 2 targets");
    }
}
