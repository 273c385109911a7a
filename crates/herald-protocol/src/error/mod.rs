//! Error types for the herald wire protocol.

mod connection;
mod frame;
mod handshake;
mod usage;

pub use connection::*;
pub use frame::*;
pub use handshake::*;
pub use usage::*;
