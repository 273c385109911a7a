//! Herald configuration: TOML schema and loader.
//!
//! Two endpoints drive the process: the listener for client connections
//! (`[server]`) and the notify bridge plus coordination registry
//! (`[notify]`). Values in the file may reference environment variables as
//! `${VAR}`.

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{Config, NotifyConfig, ServerConfig};
