//! Protocol identifiers and wire constants.

/// Protocol identifier for the identify exchange.
pub const IDENTIFY_PROTOCOL: &str = "/ipfs/id/1.0.0";

/// Protocol identifier for the fire-and-forget identify-push variant.
pub const PUSH_PROTOCOL: &str = "/ipfs/id/push/1.0.0";

/// Default identify protocol revision advertised in responses.
pub const PROTOCOL_VERSION: &str = "ipfs/0.1.0";

/// Default agent string advertised in responses.
pub const AGENT_VERSION: &str = concat!("ident/", env!("CARGO_PKG_VERSION"));

/// Default maximum size of one framed message (4KB).
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024;
