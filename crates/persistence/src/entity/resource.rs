//! The contract every persisted entity kind implements.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::config::ConfigurableEntity;
use super::core::ResourceEntity;
use crate::error::{StorageResult, ValidationError};
use crate::query::QueryPredication;
use crate::result::ChangeMethod;

/// Which fields an entity serializes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Without the heavy fields listed in [`Resource::SLIM_OMITS`]; used for
    /// search results.
    Slim,
    /// Every field; used for single fetches and storage.
    #[default]
    Full,
}

impl Projection {
    /// Applies the projection of `E` to a full JSON form.
    pub fn apply<E: Resource>(self, mut value: Value) -> Value {
        if self == Projection::Slim {
            if let Value::Object(map) = &mut value {
                for key in E::SLIM_OMITS {
                    map.remove(*key);
                }
            }
        }
        value
    }
}

/// A persisted entity kind.
///
/// Implementors hold a [`ResourceEntity`] (directly or through a
/// [`ConfigurableEntity`]) and serialize to a flat JSON object that carries
/// the entity core fields next to their own.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Storage and routing name of the kind.
    const KIND: &'static str;

    /// JSON keys dropped from the slim projection.
    const SLIM_OMITS: &'static [&'static str] = &[];

    /// Change method reported when an existing entity is updated.
    const UPDATE_METHOD: ChangeMethod = ChangeMethod::Update;

    /// Whether stored entities of this kind reject updates.
    const IMMUTABLE: bool = false;

    fn entity(&self) -> &ResourceEntity;

    fn entity_mut(&mut self) -> &mut ResourceEntity;

    /// The configurable part, for kinds that carry a config payload.
    fn configurable(&self) -> Option<&ConfigurableEntity> {
        None
    }

    fn configurable_mut(&mut self) -> Option<&mut ConfigurableEntity> {
        None
    }

    /// Applies one top-level patch key to a non-config field.
    ///
    /// Returns `Ok(false)` for keys the kind does not patch.
    fn patch_field(&mut self, key: &str, value: &Value) -> Result<bool, ValidationError> {
        super::patch::patch_common_field(self, key, value)
    }

    /// Checks the entity before it is written.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Query keys this kind understands beyond the shared filters.
    fn predication() -> QueryPredication<Self> {
        QueryPredication::new()
    }

    /// Serializes the entity in the given projection.
    fn project(&self, projection: Projection) -> StorageResult<Value> {
        Ok(projection.apply::<Self>(serde_json::to_value(self)?))
    }

    /// Rebuilds an entity from its JSON form.
    fn from_json(value: Value) -> StorageResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
