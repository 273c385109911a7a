//! In-process mapping from channel name to live connection.

use dashmap::DashMap;
use uuid::Uuid;

use crate::connection::ConnectionHandle;

/// Channel name to connection handle.
///
/// Entries are unique per name; a new registration for the same channel
/// silently replaces the prior one (last writer wins). Inserts happen on
/// the open path and removals on the close path, always from the owning
/// connection task; the notify bridge only reads.
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection under its channel name, replacing any prior
    /// entry for that name.
    pub fn insert(&self, handle: ConnectionHandle) {
        self.connections
            .insert(handle.channel().to_string(), handle);
    }

    pub fn get(&self, channel: &str) -> Option<ConnectionHandle> {
        self.connections.get(channel).map(|entry| entry.clone())
    }

    /// Remove the entry for `channel`, but only if it still belongs to the
    /// connection identified by `id`. A connection that was replaced by a
    /// newer registration must not tear down its successor's entry.
    pub fn remove(&self, channel: &str, id: Uuid) -> bool {
        self.connections
            .remove_if(channel, |_, handle| handle.id() == id)
            .is_some()
    }

    /// Deliver a text message to the connection on `channel`.
    ///
    /// Returns true iff a connection is registered and accepted the
    /// message; an absent channel or an already-closed connection yields
    /// false, never an error.
    pub async fn deliver(&self, channel: &str, message: &str) -> bool {
        // Clone the handle out of the shard guard before awaiting.
        let Some(handle) = self.get(channel) else {
            return false;
        };
        handle.send(message).await.is_ok()
    }

    pub fn channels(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
