//! Herald distribution layer.
//!
//! The notify bridge publishes the server's reachable address into a
//! shared coordination registry under a well-known key, then serves
//! `notify(channel, message)` calls from any process holding access to
//! that registry. The notify client is the matching producer-side driver.

mod bridge;
mod client;
mod error;
mod registry;

pub use bridge::{NotifyBridge, NotifyRequest, NotifyResponse};
pub use client::{DEFAULT_COUNT, DEFAULT_INTERVAL, NotifyClient};
pub use error::{NotifyError, RegistryError};
pub use registry::{CoordinationRegistry, MemoryRegistry, SqliteRegistry};
