//! The provider contract.
//!
//! A [`Provider`] gets, searches and saves entities of one kind. Local
//! providers ([`LocalProvider`]) evaluate everything against an
//! [`EntityStore`]; remote providers forward each call over HTTP. Callers see
//! the same contract either way:
//!
//! - reads return `Err` on faults and `Ok(None)` when nothing matches
//! - mutations never return `Err`; faults are classified into a
//!   [`ChangingResultInfo`]
//!
//! Providers are looked up by entity kind through a [`ProviderRegistry`].
//!
//! [`RemoteProvider`](crate::backends::remote::RemoteProvider) is the HTTP
//! implementation; it lives with its transport under [`crate::backends`].

mod local;
mod registry;
mod storage;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::entity::{Projection, Resource, ResourceState, apply_patch, normalize_id};
use crate::error::{ConcurrencyError, ResourceError, StorageError, StorageResult, ValidationError};
use crate::query::QueryArgs;
use crate::result::ChangingResultInfo;
use crate::tenant::{Operation, RequestContext};
use crate::types::Page;

pub use local::LocalProvider;
pub use registry::{ProviderRegistry, ProviderRegistryBuilder, global, install_global};
pub use storage::EntityStore;

/// Identifies where a provider keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// SQLite database (file-based or in-memory).
    Sqlite,
    /// A remote service reached over HTTP.
    Remote,
    /// Custom or unknown backend.
    Custom(&'static str),
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Remote => write!(f, "remote"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// What must be stored under an id for a [`Provider::put`] to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precondition<'a> {
    /// Create or update, whatever is stored.
    #[default]
    Any,
    /// The stored revision must equal this token.
    Revision(&'a str),
    /// Nothing may be stored under the id, in any state.
    Absent,
}

impl<'a> Precondition<'a> {
    /// The precondition a save sends for an entity with `revision`.
    ///
    /// An entity that was never stored may only be created.
    pub fn for_revision(revision: Option<&'a str>) -> Self {
        match revision {
            Some(revision) => Precondition::Revision(revision),
            None => Precondition::Absent,
        }
    }

    /// The precondition named by an optional `If-Match` token.
    pub fn matching(revision: Option<&'a str>) -> Self {
        revision.map_or(Precondition::Any, Precondition::Revision)
    }
}

/// Get, search and save for one entity kind.
#[async_trait]
pub trait Provider<E: Resource>: Send + Sync {
    fn backend_kind(&self) -> BackendKind;

    /// Fetches one entity in the full projection.
    ///
    /// Without `include_all_states` only `Normal` entities are returned.
    async fn get(
        &self,
        ctx: &RequestContext,
        id: &str,
        include_all_states: bool,
    ) -> StorageResult<Option<E>>;

    /// Runs a query and returns one page in the slim projection.
    async fn search(&self, ctx: &RequestContext, args: &QueryArgs) -> StorageResult<Page<E>>;

    /// Persists `entity`.
    ///
    /// On success the entity carries its new revision token and an empty
    /// change set. On failure the revision token active before the call is
    /// restored and the fault is classified into the result.
    async fn save(&self, ctx: &RequestContext, entity: &mut E) -> ChangingResultInfo;

    /// Moves an entity to the `Deleted` state.
    ///
    /// Deleting an entity that is already deleted is `Unchanged`.
    async fn delete(&self, ctx: &RequestContext, id: &str) -> ChangingResultInfo {
        if let Err(err) = ctx.authorize(Operation::Delete, E::KIND) {
            return ChangingResultInfo::from_error(&err.into());
        }
        let mut entity = match self.get(ctx, id, true).await {
            Ok(Some(entity)) => entity,
            Ok(None) => return not_found::<E>(id),
            Err(err) => return ChangingResultInfo::from_error(&err),
        };
        if entity.entity().state() == ResourceState::Deleted {
            return ChangingResultInfo::unchanged();
        }
        debug!(kind = E::KIND, id = %entity.entity().id(), "deleting entity");
        entity.entity_mut().set_state(ResourceState::Deleted);
        self.save(ctx, &mut entity).await
    }

    /// Applies a partial update to a stored entity.
    ///
    /// A successful result carries the full JSON form of the saved entity as
    /// its data.
    async fn patch(&self, ctx: &RequestContext, id: &str, patch: &Value) -> ChangingResultInfo {
        let mut entity = match self.get(ctx, id, true).await {
            Ok(Some(entity)) => entity,
            Ok(None) => return not_found::<E>(id),
            Err(err) => return ChangingResultInfo::from_error(&err),
        };
        if let Err(err) = apply_patch(&mut entity, patch) {
            return ChangingResultInfo::from_error(&err.into());
        }
        let result = self.save(ctx, &mut entity).await;
        with_full_data(result, &entity)
    }

    /// Creates or updates the entity stored under `id` from a JSON body.
    ///
    /// An existing entity is patched with `body`, so a partial body updates
    /// only the keys it names. A missing entity is built from `body` as a
    /// whole. `precondition` is checked against what is stored, in any
    /// state: a revision mismatch or an existing entity under
    /// [`Precondition::Absent`] is a `Conflict`, and a revision expected of
    /// a missing entity is `NotFound`.
    ///
    /// A successful result carries the full JSON form of the saved entity as
    /// its data.
    async fn put(
        &self,
        ctx: &RequestContext,
        id: &str,
        body: &Value,
        precondition: Precondition<'_>,
    ) -> ChangingResultInfo {
        let Value::Object(fields) = body else {
            let err: StorageError = ValidationError::InvalidPatch {
                message: "body must be a JSON object".to_string(),
            }
            .into();
            return ChangingResultInfo::from_error(&err);
        };
        let id = normalize_id(id);
        if id.is_empty() {
            let err: StorageError = ValidationError::MissingId {
                kind: E::KIND.to_string(),
            }
            .into();
            return ChangingResultInfo::from_error(&err);
        }

        let mut entity = match self.get(ctx, &id, true).await {
            Ok(Some(mut entity)) => {
                let actual = entity.entity().revision();
                let conflict: Option<StorageError> = match precondition {
                    Precondition::Any => None,
                    Precondition::Revision(expected) if actual == Some(expected) => None,
                    Precondition::Revision(expected) => Some(
                        ConcurrencyError::RevisionConflict {
                            kind: E::KIND.to_string(),
                            id: id.clone(),
                            expected: Some(expected.to_string()),
                            actual: actual.map(str::to_string),
                        }
                        .into(),
                    ),
                    Precondition::Absent => Some(
                        ConcurrencyError::Conflict {
                            message: format!("entity already exists: {}/{id}", E::KIND),
                        }
                        .into(),
                    ),
                };
                if let Some(err) = conflict {
                    debug!(kind = E::KIND, id = %id, ?precondition, "put precondition failed");
                    return ChangingResultInfo::from_error(&err);
                }
                if let Err(err) = apply_patch(&mut entity, body) {
                    return ChangingResultInfo::from_error(&err.into());
                }
                entity
            }
            Ok(None) if matches!(precondition, Precondition::Revision(_)) => {
                return not_found::<E>(&id);
            }
            Ok(None) => {
                let mut fields = fields.clone();
                fields.insert("id".to_string(), Value::String(id));
                match E::from_json(Value::Object(fields)) {
                    Ok(entity) => entity,
                    Err(err) => {
                        let err: StorageError = ValidationError::InvalidArgument {
                            message: format!("malformed {} body: {err}", E::KIND),
                        }
                        .into();
                        return ChangingResultInfo::from_error(&err);
                    }
                }
            }
            Err(err) => return ChangingResultInfo::from_error(&err),
        };

        let result = self.save(ctx, &mut entity).await;
        with_full_data(result, &entity)
    }
}

/// Attaches the full JSON form of `entity` to a successful result.
fn with_full_data<E: Resource>(result: ChangingResultInfo, entity: &E) -> ChangingResultInfo {
    if !result.is_successful() {
        return result;
    }
    match entity.project(Projection::Full) {
        Ok(data) => result.with_data(data),
        Err(err) => ChangingResultInfo::from_error(&err),
    }
}

fn not_found<E: Resource>(id: &str) -> ChangingResultInfo {
    let err: StorageError = ResourceError::not_found(E::KIND, &normalize_id(id)).into();
    ChangingResultInfo::from_error(&err)
}
