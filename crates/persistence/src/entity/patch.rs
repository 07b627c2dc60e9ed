//! Partial updates.
//!
//! A patch is a JSON object. Keys of the form `config.<name>` merge into the
//! config payload; every other key is handed to the kind's
//! [`Resource::patch_field`]. Unknown keys and read-only keys (`id`, `rev`,
//! `created`, `modified`) are skipped, so a full entity body is also a valid
//! patch.

use serde_json::{Map, Value};

use super::core::normalize_id;
use super::{Resource, ResourceState};
use crate::error::ValidationError;

const CONFIG_PREFIX: &str = "config.";

/// Parses a patch document.
pub fn parse_patch(body: &str) -> Result<Value, ValidationError> {
    if body.trim().is_empty() {
        return Err(ValidationError::MissingBody);
    }
    let value: Value =
        serde_json::from_str(body).map_err(|err| ValidationError::InvalidPatch {
            message: err.to_string(),
        })?;
    if !value.is_object() {
        return Err(ValidationError::InvalidPatch {
            message: "patch must be a JSON object".to_string(),
        });
    }
    Ok(value)
}

/// Applies a patch to an entity and returns how many keys were applied.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tessera_persistence::entities::Content;
/// use tessera_persistence::entity::{apply_patch, Resource};
///
/// let mut content = Content::new("draft");
/// let applied = apply_patch(&mut content, &json!({
///     "name": "final",
///     "config.layout": {"columns": 2},
///     "rev": "ignored",
/// })).unwrap();
///
/// assert_eq!(applied, 2);
/// assert_eq!(content.entity().name(), "final");
/// assert_eq!(content.config().get_object("layout").map(|o| o.len()), Some(1));
/// ```
pub fn apply_patch<E: Resource>(entity: &mut E, patch: &Value) -> Result<usize, ValidationError> {
    let Value::Object(fields) = patch else {
        return Err(ValidationError::InvalidPatch {
            message: "patch must be a JSON object".to_string(),
        });
    };

    let mut applied = 0;
    for (key, value) in fields {
        if let Some(name) = key.strip_prefix(CONFIG_PREFIX) {
            if name.is_empty() {
                return Err(ValidationError::InvalidPatch {
                    message: "empty config key".to_string(),
                });
            }
            let configurable =
                entity
                    .configurable_mut()
                    .ok_or_else(|| ValidationError::InvalidPatch {
                        message: format!("{} has no config", E::KIND),
                    })?;
            configurable.config_payload_mut().merge_key(name, value);
            applied += 1;
        } else if entity.patch_field(key, value)? {
            applied += 1;
        }
    }
    Ok(applied)
}

/// Patches the fields every entity shares: `name`, `state` and `config`.
pub fn patch_common_field<E: Resource>(
    entity: &mut E,
    key: &str,
    value: &Value,
) -> Result<bool, ValidationError> {
    match key {
        "name" => {
            let name = string_field(key, value)?;
            entity.entity_mut().set_name(name);
            Ok(true)
        }
        "state" => {
            let state: ResourceState =
                serde_json::from_value(value.clone()).map_err(|err| {
                    ValidationError::InvalidField {
                        field: key.to_string(),
                        message: err.to_string(),
                    }
                })?;
            entity.entity_mut().set_state(state);
            Ok(true)
        }
        "config" => {
            let Some(configurable) = entity.configurable_mut() else {
                return Ok(false);
            };
            match value {
                Value::Object(object) => configurable.set_config(object.clone()),
                Value::String(raw) => configurable.set_config_string(raw.as_str()),
                Value::Null => configurable.set_config(Map::new()),
                _ => {
                    return Err(ValidationError::InvalidField {
                        field: key.to_string(),
                        message: "expected an object or a string".to_string(),
                    });
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Reads a string field; `null` reads as empty.
pub fn string_field(field: &str, value: &Value) -> Result<String, ValidationError> {
    Ok(optional_string_field(field, value)?.unwrap_or_default())
}

/// Reads an optional string field; `null` and `""` read as `None`.
pub fn optional_string_field(field: &str, value: &Value) -> Result<Option<String>, ValidationError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(ValidationError::InvalidField {
            field: field.to_string(),
            message: "expected a string".to_string(),
        }),
    }
}

/// Reads an optional entity id, normalized.
pub fn id_field(field: &str, value: &Value) -> Result<Option<String>, ValidationError> {
    Ok(optional_string_field(field, value)?
        .map(|id| normalize_id(&id))
        .filter(|id| !id.is_empty()))
}
