//! Wire and error types used by the relay.

pub mod error;
pub mod message;
pub mod request;

pub use error::*;
pub use message::*;
pub use request::*;
