//! Wire schema and message codec for the identify protocols.
//!
//! This crate provides:
//! - The `IdentifyV1` protobuf message shared by identify and identify-push
//! - Domain variants (`IdentifyInfo`, `PushUpdate`) built on that schema
//! - Peer identifier and opaque address types
//! - Protocol identifiers and wire constants

#![forbid(unsafe_code)]

pub mod v1;
pub mod consts;
pub mod types;
pub mod codec;
pub mod message;

#[cfg(test)]
mod proptests;

pub use codec::{decode, encode, CodecError};
pub use message::{IdentifyInfo, PushUpdate};
pub use types::{Multiaddr, PeerId};
