//! Stream abstractions and framing for the identify protocols.
//!
//! Stream multiplexing and connection setup live outside this workspace; this
//! crate only describes what the identify flows need from them, plus an
//! in-memory implementation that tests and the demo run against.

pub mod traits;
pub mod framing;
pub mod memory;

pub use traits::*;
pub use framing::*;
pub use memory::*;
