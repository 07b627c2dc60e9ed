//! EntityStore implementation for SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{ErrorCode, OptionalExtension, Row, params};
use tracing::debug;

use crate::entity::ResourceState;
use crate::error::{BackendError, ConcurrencyError, ResourceError, StorageError, StorageResult};
use crate::provider::{BackendKind, EntityStore};
use crate::tenant::RequestContext;
use crate::types::StoredResource;

use super::SqliteStore;

fn internal_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

fn serialization_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::SerializationError { message })
}

const SELECT_COLUMNS: &str =
    "id, name, state, revision, created_at, last_modified, data";

/// A row as it comes out of SQLite, before decoding.
struct RawRow {
    id: String,
    name: String,
    state: i64,
    revision: Option<String>,
    created_at: String,
    last_modified: String,
    data: Vec<u8>,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            state: row.get(2)?,
            revision: row.get(3)?,
            created_at: row.get(4)?,
            last_modified: row.get(5)?,
            data: row.get(6)?,
        })
    }

    fn decode(self, kind: &str) -> StorageResult<StoredResource> {
        let state = ResourceState::from_ordinal(self.state).ok_or_else(|| {
            serialization_error(format!(
                "unknown state ordinal {} on {kind}/{}",
                self.state, self.id
            ))
        })?;
        let data = serde_json::from_slice(&self.data).map_err(|e| {
            serialization_error(format!("Failed to deserialize {kind}/{}: {e}", self.id))
        })?;
        Ok(StoredResource::from_storage(
            kind,
            self.id,
            self.name,
            state,
            self.revision,
            parse_time(&self.created_at)?,
            parse_time(&self.last_modified)?,
            data,
        ))
    }
}

fn parse_time(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| internal_error(format!("Failed to parse timestamp '{value}': {e}")))
}

fn encode_data(row: &StoredResource) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(row.data())
        .map_err(|e| serialization_error(format!("Failed to serialize {}: {e}", row.url())))
}

#[async_trait]
impl EntityStore for SqliteStore {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn fetch(
        &self,
        ctx: &RequestContext,
        kind: &str,
        id: &str,
    ) -> StorageResult<Option<StoredResource>> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM entities
             WHERE tenant_id = ?1 AND kind = ?2 AND id = ?3"
        );
        let raw = conn
            .query_row(&sql, params![ctx.tenant_id().as_str(), kind, id], RawRow::read)
            .optional()
            .map_err(|e| internal_error(format!("Failed to read {kind}/{id}: {e}")))?;

        raw.map(|raw| raw.decode(kind)).transpose()
    }

    async fn scan(
        &self,
        ctx: &RequestContext,
        kind: &str,
        state: Option<ResourceState>,
    ) -> StorageResult<Vec<StoredResource>> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM entities
             WHERE tenant_id = ?1 AND kind = ?2 AND (?3 IS NULL OR state = ?3)
             ORDER BY rowid"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| internal_error(format!("Failed to prepare scan: {e}")))?;
        let raws = stmt
            .query_map(
                params![ctx.tenant_id().as_str(), kind, state.map(ResourceState::ordinal)],
                RawRow::read,
            )
            .map_err(|e| internal_error(format!("Failed to scan {kind}: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| internal_error(format!("Failed to scan {kind}: {e}")))?;

        debug!(kind, tenant = %ctx.tenant_id(), rows = raws.len(), "sqlite scan");
        raws.into_iter().map(|raw| raw.decode(kind)).collect()
    }

    async fn insert(&self, ctx: &RequestContext, row: &StoredResource) -> StorageResult<()> {
        let conn = self.get_connection()?;
        let data = encode_data(row)?;

        let result = conn.execute(
            "INSERT INTO entities
                (tenant_id, kind, id, name, state, revision, created_at, last_modified, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                ctx.tenant_id().as_str(),
                row.kind(),
                row.id(),
                row.name(),
                row.state().ordinal(),
                row.revision(),
                row.created_at().to_rfc3339(),
                row.last_modified().to_rfc3339(),
                data,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(ResourceError::duplicate_key(row.kind(), row.id()).into())
            }
            Err(e) => Err(internal_error(format!(
                "Failed to insert {}: {e}",
                row.url()
            ))),
        }
    }

    async fn replace(
        &self,
        ctx: &RequestContext,
        row: &StoredResource,
        expected: Option<&str>,
    ) -> StorageResult<()> {
        let conn = self.get_connection()?;
        let tenant_id = ctx.tenant_id().as_str();
        let data = encode_data(row)?;

        // `IS` compares NULL revisions as equal.
        let changed = conn
            .execute(
                "UPDATE entities
                 SET name = ?1, state = ?2, revision = ?3, created_at = ?4,
                     last_modified = ?5, data = ?6
                 WHERE tenant_id = ?7 AND kind = ?8 AND id = ?9 AND revision IS ?10",
                params![
                    row.name(),
                    row.state().ordinal(),
                    row.revision(),
                    row.created_at().to_rfc3339(),
                    row.last_modified().to_rfc3339(),
                    data,
                    tenant_id,
                    row.kind(),
                    row.id(),
                    expected,
                ],
            )
            .map_err(|e| internal_error(format!("Failed to update {}: {e}", row.url())))?;

        if changed > 0 {
            return Ok(());
        }

        let actual: Option<Option<String>> = conn
            .query_row(
                "SELECT revision FROM entities WHERE tenant_id = ?1 AND kind = ?2 AND id = ?3",
                params![tenant_id, row.kind(), row.id()],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read revision: {e}")))?;

        match actual {
            Some(actual) => Err(ConcurrencyError::RevisionConflict {
                kind: row.kind().to_string(),
                id: row.id().to_string(),
                expected: expected.map(str::to_string),
                actual,
            }
            .into()),
            None => Err(ResourceError::not_found(row.kind(), row.id()).into()),
        }
    }

    async fn count(&self, ctx: &RequestContext, kind: &str) -> StorageResult<u64> {
        let conn = self.get_connection()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM entities WHERE tenant_id = ?1 AND kind = ?2",
                params![ctx.tenant_id().as_str(), kind],
                |row| row.get(0),
            )
            .map_err(|e| internal_error(format!("Failed to count {kind}: {e}")))?;
        Ok(count as u64)
    }

    async fn scan_page(
        &self,
        ctx: &RequestContext,
        kind: &str,
        state: ResourceState,
        offset: u32,
        limit: u32,
    ) -> StorageResult<(Vec<StoredResource>, u64)> {
        let conn = self.get_connection()?;
        let tenant_id = ctx.tenant_id().as_str();
        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM entities WHERE tenant_id = ?1 AND kind = ?2 AND state = ?3",
                params![tenant_id, kind, state.ordinal()],
                |row| row.get(0),
            )
            .map_err(|e| internal_error(format!("Failed to count {kind}: {e}")))?;

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM entities
             WHERE tenant_id = ?1 AND kind = ?2 AND state = ?3
             ORDER BY rowid
             LIMIT ?4 OFFSET ?5"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| internal_error(format!("Failed to prepare scan: {e}")))?;
        let raws = stmt
            .query_map(
                params![tenant_id, kind, state.ordinal(), limit, offset],
                RawRow::read,
            )
            .map_err(|e| internal_error(format!("Failed to scan {kind}: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| internal_error(format!("Failed to scan {kind}: {e}")))?;

        debug!(kind, tenant = %ctx.tenant_id(), offset, rows = raws.len(), total, "sqlite page");
        let rows = raws
            .into_iter()
            .map(|raw| raw.decode(kind))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok((rows, total as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::User;
    use crate::entity::Resource;
    use crate::result::ErrorKind;
    use crate::tenant::TenantId;

    fn ctx(tenant: &str) -> RequestContext {
        RequestContext::for_tenant(TenantId::new(tenant))
    }

    fn row(name: &str) -> StoredResource {
        let mut user = User::new(name);
        user.entity_mut().set_id(name);
        user.entity_mut().prepare_for_saving();
        StoredResource::from_entity(&user).unwrap()
    }

    #[tokio::test]
    async fn test_insert_fetch_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let ctx = ctx("acme");
        let original = row("ada");
        store.insert(&ctx, &original).await.unwrap();

        let fetched = store.fetch(&ctx, "user", "ada").await.unwrap().unwrap();
        assert_eq!(fetched.revision(), original.revision());
        assert_eq!(fetched.data(), original.data());
        assert_eq!(fetched.state(), ResourceState::Normal);
        assert_eq!(
            fetched.created_at().timestamp_micros(),
            original.created_at().timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_key_error() {
        let store = SqliteStore::in_memory().unwrap();
        let ctx = ctx("acme");
        store.insert(&ctx, &row("ada")).await.unwrap();
        let err = store.insert(&ctx, &row("ada")).await.unwrap_err();
        assert_eq!(err.error_kind(), ErrorKind::Key);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&ctx("acme"), &row("ada")).await.unwrap();
        store.insert(&ctx("globex"), &row("ada")).await.unwrap();

        assert!(store.fetch(&ctx("initech"), "user", "ada").await.unwrap().is_none());
        assert_eq!(store.count(&ctx("acme"), "user").await.unwrap(), 1);
        assert_eq!(store.count(&ctx("acme"), "content").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_compares_revision() {
        let store = SqliteStore::in_memory().unwrap();
        let ctx = ctx("acme");
        let original = row("ada");
        store.insert(&ctx, &original).await.unwrap();

        let mut user: User = original.clone().into_entity(Default::default()).unwrap();
        user.set_nickname(Some("countess".to_string()));
        user.entity_mut().prepare_for_saving();
        let next = StoredResource::from_entity(&user).unwrap();

        let err = store.replace(&ctx, &next, Some("stale")).await.unwrap_err();
        assert_eq!(err.error_kind(), ErrorKind::Conflict);

        store.replace(&ctx, &next, original.revision()).await.unwrap();
        let fetched = store.fetch(&ctx, "user", "ada").await.unwrap().unwrap();
        assert_eq!(fetched.revision(), next.revision());
        assert_eq!(fetched.data()["nickname"], "countess");

        let missing = row("nobody");
        let err = store.replace(&ctx, &missing, None).await.unwrap_err();
        assert_eq!(err.error_kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_scan_filters_state_in_storage_order() {
        let store = SqliteStore::in_memory().unwrap();
        let ctx = ctx("acme");
        for name in ["c", "a", "b"] {
            store.insert(&ctx, &row(name)).await.unwrap();
        }
        let mut user: User = row("d").into_entity(Default::default()).unwrap();
        user.entity_mut().set_state(ResourceState::Deleted);
        store
            .insert(&ctx, &StoredResource::from_entity(&user).unwrap())
            .await
            .unwrap();

        let all = store.scan(&ctx, "user", None).await.unwrap();
        let ids: Vec<_> = all.iter().map(StoredResource::id).collect();
        assert_eq!(ids, ["c", "a", "b", "d"]);

        let normal = store
            .scan(&ctx, "user", Some(ResourceState::Normal))
            .await
            .unwrap();
        assert_eq!(normal.len(), 3);

        let deleted = store
            .scan(&ctx, "user", Some(ResourceState::Deleted))
            .await
            .unwrap();
        assert_eq!(deleted[0].id(), "d");
    }

    #[tokio::test]
    async fn test_scan_page_limits_in_sql() {
        let store = SqliteStore::in_memory().unwrap();
        let acme = ctx("acme");
        for name in ["e", "d", "c", "b", "a"] {
            store.insert(&acme, &row(name)).await.unwrap();
        }
        store.insert(&ctx("globex"), &row("z")).await.unwrap();

        let (rows, total) = store
            .scan_page(&acme, "user", ResourceState::Normal, 1, 2)
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(StoredResource::id).collect();
        assert_eq!(ids, ["d", "c"]);
        assert_eq!(total, 5);

        let (rows, total) = store
            .scan_page(&acme, "user", ResourceState::Deleted, 0, 10)
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 0);
    }
}
