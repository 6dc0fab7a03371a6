//! Encode and decode a single identify message.

use bytes::Bytes;
use prost::Message;
use thiserror::Error;

use crate::v1::IdentifyV1;

/// Codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Bytes do not parse as the identify schema
    #[error("malformed identify message: {0}")]
    Malformed(#[from] prost::DecodeError),
}

/// Encode a message. Field order and omission rules are fixed by the
/// schema, so equal messages always produce equal bytes.
pub fn encode(msg: &IdentifyV1) -> Bytes {
    Bytes::from(msg.encode_to_vec())
}

/// Decode a message. Absent fields take their defaults; any parse failure
/// is reported, never a partially populated message.
pub fn decode(bytes: &[u8]) -> Result<IdentifyV1, CodecError> {
    Ok(IdentifyV1::decode(bytes)?)
}
