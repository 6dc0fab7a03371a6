//! Version 1 of the identify wire schema.
//!
//! The message is declared with proto2 semantics: every scalar field is
//! optional and keeps its presence bit, so an absent field and a field that
//! was sent empty decode to different values. Tags match the identify schema
//! used by other implementations of these protocols.
//!
//! ```text
//! message Identify {
//!   optional bytes  publicKey       = 1;
//!   repeated bytes  listenAddrs     = 2;
//!   repeated string protocols       = 3;
//!   optional bytes  observedAddr    = 4;
//!   optional string protocolVersion = 5;
//!   optional string agentVersion    = 6;
//! }
//! ```

/// A single identify or identify-push message.
///
/// Fields are declared in tag order, which keeps the encoding deterministic.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IdentifyV1 {
    /// Public identity key of the sender, opaque bytes
    #[prost(bytes = "vec", optional, tag = "1")]
    pub public_key: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    /// Addresses the sender is listening on, in the sender's insertion order
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub listen_addrs: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    /// Protocol identifiers the sender supports
    #[prost(string, repeated, tag = "3")]
    pub protocols: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    /// Address the sender observed the receiver connecting from
    #[prost(bytes = "vec", optional, tag = "4")]
    pub observed_addr: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    /// Identify protocol revision
    #[prost(string, optional, tag = "5")]
    pub protocol_version: ::core::option::Option<::prost::alloc::string::String>,
    /// Free-form software name and version
    #[prost(string, optional, tag = "6")]
    pub agent_version: ::core::option::Option<::prost::alloc::string::String>,
}

impl IdentifyV1 {
    /// Whether any identity field (key, protocol version, agent version) is present.
    ///
    /// Push messages leave all three absent.
    pub fn carries_identity(&self) -> bool {
        self.public_key.is_some() || self.protocol_version.is_some() || self.agent_version.is_some()
    }
}
