//! SQLite store setup.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BackendError, StorageError, StorageResult};

use super::schema;

/// SQLite-backed [`EntityStore`](crate::provider::EntityStore).
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteStoreConfig,
    is_memory: bool,
}

impl Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for file databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
        }
    }
}

impl SqliteStore {
    /// Creates a private in-memory database.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteStoreConfig::default())
    }

    /// Opens or creates a file database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteStoreConfig::default())
    }

    /// Creates a store with custom configuration and brings its schema up
    /// to date.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteStoreConfig) -> StorageResult<Self> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";

        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let enable_wal = config.enable_wal && !is_memory;
        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path.as_ref())
        }
        .with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if enable_wal {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            }
            Ok(())
        });

        // Every connection to ":memory:" is its own database, so the pool
        // holds exactly one connection and never recycles it.
        let builder = if is_memory {
            Pool::builder()
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            Pool::builder()
                .max_size(config.max_connections)
                .min_idle(Some(config.min_connections))
        };

        let pool = builder
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| {
                StorageError::Backend(BackendError::Unavailable {
                    backend_name: "sqlite".to_string(),
                    message: e.to_string(),
                })
            })?;

        let store = Self {
            pool,
            config,
            is_memory,
        };
        store.init_schema()?;

        info!(
            path = %path.as_ref().display(),
            is_memory,
            "opened sqlite store"
        );
        Ok(store)
    }

    /// Creates or migrates the schema.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(
        &self,
    ) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    pub fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: SqliteStoreConfig =
            serde_json::from_str(r#"{"max_connections": 4, "enable_wal": false}"#).unwrap();
        assert_eq!(config.max_connections, 4);
        assert!(!config.enable_wal);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert_eq!(config.min_connections, 1);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tessera.db");
        let store = SqliteStore::open(&path).unwrap();
        assert!(!store.is_memory());
        assert!(path.exists());

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.config(), store.config());
    }

    #[test]
    fn test_in_memory() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_memory());
        assert!(store.get_connection().is_ok());
    }
}
