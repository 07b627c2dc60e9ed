//! SQLite entity store.
//!
//! Supports in-memory databases (great for testing) and file databases (for
//! single-node deployments). Rows of every kind and tenant share one table;
//! queries are evaluated by the provider over the rows of one kind and
//! tenant.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_persistence::backends::sqlite::SqliteStore;
//! use tessera_persistence::entities::Content;
//! use tessera_persistence::provider::LocalProvider;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::open("./data/tessera.db")?);
//! let contents = LocalProvider::<Content, _>::new(store);
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE entities (
//!     tenant_id TEXT NOT NULL,
//!     kind TEXT NOT NULL,
//!     id TEXT NOT NULL,
//!     name TEXT NOT NULL DEFAULT '',
//!     state INTEGER NOT NULL,      -- ResourceState ordinal
//!     revision TEXT,               -- compare-and-set witness
//!     created_at TEXT NOT NULL,
//!     last_modified TEXT NOT NULL,
//!     data BLOB NOT NULL,          -- full JSON projection
//!     PRIMARY KEY (tenant_id, kind, id)
//! );
//! CREATE INDEX idx_entities_state ON entities (tenant_id, kind, state);
//! ```

mod backend;
mod schema;
mod storage;

pub use backend::{SqliteStore, SqliteStoreConfig};
