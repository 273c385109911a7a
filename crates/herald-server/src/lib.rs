//! Herald connection layer.
//!
//! One task per accepted connection pumps protocol events from a
//! [`herald_protocol::FrameStream`] into the shared
//! [`CallbackDispatcher`]; live connections are addressable through
//! [`ConnectionRegistry`] under their request path. The accept loop and
//! the default application wiring (register on open, echo on message, log
//! on error) live in [`Server`].

mod callbacks;
mod connection;
mod error;
mod registry;
mod server;

#[cfg(test)]
mod test_support;

pub use callbacks::CallbackDispatcher;
pub use connection::{Command, Connection, ConnectionHandle};
pub use error::ServerError;
pub use registry::ConnectionRegistry;
pub use server::Server;
