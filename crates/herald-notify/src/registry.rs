//! Shared coordination registry: publish/resolve of the server reference.
//!
//! The registry is the only piece of state shared across process
//! boundaries. The server publishes its notify endpoint under a well-known
//! key once at startup; external notifiers resolve the key each time they
//! want to deliver. Last publish wins, and the entry is never removed; a
//! stale reference fails at the remote-call layer instead.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rusqlite::params;
use tokio_rusqlite::Connection;

use crate::error::RegistryError;

/// Key-value boundary to the external coordination service.
#[async_trait]
pub trait CoordinationRegistry: Send + Sync {
    /// Publish `reference` under `key`, replacing any prior value.
    async fn publish(&self, key: &str, reference: &str) -> Result<(), RegistryError>;

    /// Resolve the reference published under `key`.
    async fn resolve(&self, key: &str) -> Result<Option<String>, RegistryError>;
}

/// In-memory registry for tests and single-process embedding.
#[derive(Default)]
pub struct MemoryRegistry {
    entries: DashMap<String, String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationRegistry for MemoryRegistry {
    async fn publish(&self, key: &str, reference: &str) -> Result<(), RegistryError> {
        self.entries.insert(key.to_string(), reference.to_string());
        Ok(())
    }

    async fn resolve(&self, key: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }
}

/// SQLite-backed registry, shareable between unrelated processes on the
/// same host.
pub struct SqliteRegistry {
    conn: Connection,
}

impl SqliteRegistry {
    /// Open (creating if needed) the registry database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RegistryError::Connection(e.to_string()))?;
        }
        let conn = Connection::open(path)
            .await
            .map_err(|e| RegistryError::Connection(e.to_string()))?;

        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(|e| RegistryError::Query(e.to_string()))?;

        Ok(Self { conn })
    }

    /// An in-memory database, private to this handle.
    pub async fn in_memory() -> Result<Self, RegistryError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RegistryError::Connection(e.to_string()))?;

        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(|e| RegistryError::Query(e.to_string()))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl CoordinationRegistry for SqliteRegistry {
    async fn publish(&self, key: &str, reference: &str) -> Result<(), RegistryError> {
        let key = key.to_string();
        let reference = reference.to_string();
        let published_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO endpoints (key, reference, published_at)
                     VALUES (?1, ?2, ?3)",
                    params![key, reference, published_at],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| RegistryError::Query(e.to_string()))
    }

    async fn resolve(&self, key: &str) -> Result<Option<String>, RegistryError> {
        let key = key.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT reference FROM endpoints WHERE key = ?1")?;
                match stmt.query_row([&key], |row| row.get::<_, String>(0)) {
                    Ok(reference) => Ok(Some(reference)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(|e| RegistryError::Query(e.to_string()))
    }
}

fn init_schema(conn: &rusqlite::Connection) -> Result<(), tokio_rusqlite::Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS endpoints (
    key TEXT PRIMARY KEY,
    reference TEXT NOT NULL,
    published_at TEXT NOT NULL
);
"#;

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
