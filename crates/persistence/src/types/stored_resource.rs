//! Stored resource rows.
//!
//! A [`StoredResource`] is what a store keeps for one entity: the indexed
//! columns used for filtering and compare-and-set, plus the full JSON
//! projection the entity is rebuilt from.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::entity::{Projection, Resource, ResourceState};
use crate::error::StorageResult;

/// An entity as persisted by a store.
///
/// # Examples
///
/// ```
/// use tessera_persistence::entities::User;
/// use tessera_persistence::entity::Resource;
/// use tessera_persistence::types::StoredResource;
///
/// let mut user = User::new("ada");
/// user.entity_mut().set_id("Ada-1");
///
/// let stored = StoredResource::from_entity(&user).unwrap();
/// assert_eq!(stored.kind(), "user");
/// assert_eq!(stored.id(), "ada-1");
/// assert_eq!(stored.url(), "user/ada-1");
/// ```
#[derive(Debug, Clone)]
pub struct StoredResource {
    kind: String,
    id: String,
    name: String,
    state: ResourceState,
    revision: Option<String>,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    data: Value,
}

impl StoredResource {
    /// Captures the full projection of an entity.
    pub fn from_entity<E: Resource>(entity: &E) -> StorageResult<Self> {
        let core = entity.entity();
        Ok(Self {
            kind: E::KIND.to_string(),
            id: core.id().to_string(),
            name: core.name().to_string(),
            state: core.state(),
            revision: core.revision().map(str::to_string),
            created_at: core.creation_time(),
            last_modified: core.last_modification_time(),
            data: entity.project(Projection::Full)?,
        })
    }

    /// Creates a stored resource from existing data (e.g., loaded from database).
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        kind: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        state: ResourceState,
        revision: Option<String>,
        created_at: DateTime<Utc>,
        last_modified: DateTime<Utc>,
        data: Value,
    ) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            name: name.into(),
            state,
            revision,
            created_at,
            last_modified,
            data,
        }
    }

    /// Rebuilds the entity in the requested projection.
    pub fn into_entity<E: Resource>(self, projection: Projection) -> StorageResult<E> {
        E::from_json(projection.apply::<E>(self.data))
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// The revision token of the persisted row.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// The full JSON projection.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Returns `true` if the entity carries the deleted marker.
    pub fn is_deleted(&self) -> bool {
        self.state == ResourceState::Deleted
    }

    /// Returns the path of this row (e.g., "content/3f2a...").
    pub fn url(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }
}
