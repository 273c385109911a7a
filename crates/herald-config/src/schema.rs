//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Listener configuration for client connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest frame payload a connection accepts, in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

/// Notify bridge and coordination registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Host the notify bridge binds (and advertises).
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the notify bridge listens on.
    #[serde(default = "default_notify_port")]
    pub port: u16,

    /// Path of the shared coordination registry database.
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Well-known key the server publishes its reference under.
    #[serde(default = "default_registry_key")]
    pub registry_key: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_notify_port(),
            registry_path: default_registry_path(),
            registry_key: default_registry_key(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_notify_port() -> u16 {
    8081
}

fn default_max_frame_size() -> usize {
    10 * 1024 * 1024
}

fn default_registry_path() -> String {
    "~/.herald/registry.db".to_string()
}

fn default_registry_key() -> String {
    "herald/server".to_string()
}
