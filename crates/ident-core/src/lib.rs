//! Identify and identify-push protocol flows.
//!
//! This crate provides:
//! - `IdentifyService`: outbound identify, the inbound responder, push
//!   sending and the inbound push handler
//! - `Dispatcher`: routes inbound streams by protocol identifier
//! - `PeerDirectory`: per-peer records with individually locked state
//! - `LocalPeer`: the addresses and protocols this node advertises
//! - `IdentifyConfig`: file and environment configuration

#![forbid(unsafe_code)]

pub mod config;
pub mod directory;
pub mod dispatch;
pub mod errors;
pub mod identify;
pub mod local;
pub mod push;

pub use config::{ConfigError, IdentifyConfig};
pub use directory::{InMemoryDirectory, PeerDirectory, PeerHandle, PeerRecord};
pub use dispatch::{DispatchStats, DispatchStatsSnapshot, Dispatcher};
pub use errors::{IdentifyError, IdentifyFailure, PushFailure};
pub use identify::{IdentifyOutcome, IdentifyService};
pub use local::{LocalPeer, LocalSnapshot};
pub use push::PushReport;
