//! Transport layer for relay communication.

pub mod framing;
pub mod stdio;

pub use stdio::StdioTransport;
