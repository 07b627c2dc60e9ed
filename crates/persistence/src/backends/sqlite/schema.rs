//! SQLite schema definitions and migrations.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

fn migration_error(step: &str, err: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::MigrationError {
        message: format!("{step}: {err}"),
    })
}

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate_schema(conn, 1)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(conn, current_version)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(StorageError::Backend(BackendError::MigrationError {
            message: format!(
                "database schema version {current_version} is newer than supported version {SCHEMA_VERSION}"
            ),
        }));
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| migration_error("create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| migration_error("read schema_version", e))?;

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error("clear schema_version", e))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| migration_error("set schema_version", e))?;
    Ok(())
}

/// Create the initial schema (version 1).
fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entities (
            tenant_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            id TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            state INTEGER NOT NULL,
            revision TEXT,
            created_at TEXT NOT NULL,
            last_modified TEXT NOT NULL,
            data BLOB NOT NULL,
            PRIMARY KEY (tenant_id, kind, id)
        )",
        [],
    )
    .map_err(|e| migration_error("create entities table", e))?;

    Ok(())
}

/// Applies every migration after `from_version`.
fn migrate_schema(conn: &Connection, from_version: i32) -> StorageResult<()> {
    for version in (from_version + 1)..=SCHEMA_VERSION {
        debug!(version, "applying sqlite migration");
        match version {
            2 => migrate_v1_to_v2(conn)?,
            _ => {}
        }
        set_schema_version(conn, version)?;
    }
    Ok(())
}

/// v2: index for state-filtered scans.
fn migrate_v1_to_v2(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entities_state
         ON entities (tenant_id, kind, state)",
        [],
    )
    .map_err(|e| migration_error("create idx_entities_state", e))?;
    Ok(())
}
