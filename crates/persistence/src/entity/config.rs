//! JSON configuration attached to configurable entities.
//!
//! The payload is held either as the raw string it was loaded from or as a
//! parsed object, never both as sources of truth. Reading the other
//! representation fills a cache; writing either one discards the other.

use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use super::core::ResourceEntity;

/// A JSON object.
pub type JsonObject = Map<String, Value>;

/// Config key that is never copied to other entities.
pub const PRIVATE_CONFIG_KEY: &str = "private";

#[derive(Debug, Clone)]
enum ConfigState {
    Raw {
        raw: String,
        parsed: OnceLock<JsonObject>,
    },
    Parsed {
        object: JsonObject,
        raw: OnceLock<String>,
    },
}

impl Default for ConfigState {
    fn default() -> Self {
        ConfigState::Parsed {
            object: JsonObject::new(),
            raw: OnceLock::new(),
        }
    }
}

/// Parses a raw config string; anything but a JSON object becomes `{}`.
fn parse_object(raw: &str) -> JsonObject {
    if raw.trim().is_empty() {
        return JsonObject::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(object)) => object,
        Ok(_) => {
            debug!("config is not a JSON object, using empty config");
            JsonObject::new()
        }
        Err(err) => {
            debug!(error = %err, "malformed config JSON, using empty config");
            JsonObject::new()
        }
    }
}

/// The configuration payload.
///
/// # Examples
///
/// ```
/// use tessera_persistence::entity::ConfigPayload;
///
/// let payload = ConfigPayload::from_raw(r#"{"theme": "dark", "size": 3}"#);
/// assert_eq!(payload.get_str("theme"), Some("dark"));
/// assert_eq!(payload.get_i32("size"), Some(3));
/// assert_eq!(payload.get_bool("size"), None);
///
/// let broken = ConfigPayload::from_raw("{not json");
/// assert!(broken.object().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigPayload {
    state: ConfigState,
}

impl ConfigPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            state: ConfigState::Raw {
                raw: raw.into(),
                parsed: OnceLock::new(),
            },
        }
    }

    pub fn from_object(object: JsonObject) -> Self {
        Self {
            state: ConfigState::Parsed {
                object,
                raw: OnceLock::new(),
            },
        }
    }

    /// The parsed object, parsing the raw string once if needed.
    pub fn object(&self) -> &JsonObject {
        match &self.state {
            ConfigState::Raw { raw, parsed } => parsed.get_or_init(|| parse_object(raw)),
            ConfigState::Parsed { object, .. } => object,
        }
    }

    /// The raw string, serializing the object once if needed.
    pub fn raw(&self) -> &str {
        match &self.state {
            ConfigState::Raw { raw, .. } => raw,
            ConfigState::Parsed { object, raw } => raw.get_or_init(|| {
                serde_json::to_string(object).unwrap_or_else(|_| String::from("{}"))
            }),
        }
    }

    /// Mutable access to the object; the raw cache is discarded.
    pub fn object_mut(&mut self) -> &mut JsonObject {
        let object = match std::mem::take(&mut self.state) {
            ConfigState::Raw { raw, parsed } => {
                parsed.into_inner().unwrap_or_else(|| parse_object(&raw))
            }
            ConfigState::Parsed { object, .. } => object,
        };
        self.state = ConfigState::Parsed {
            object,
            raw: OnceLock::new(),
        };
        match &mut self.state {
            ConfigState::Parsed { object, .. } => object,
            ConfigState::Raw { .. } => unreachable!("config state was just parsed"),
        }
    }

    pub fn set_object(&mut self, object: JsonObject) {
        *self = Self::from_object(object);
    }

    pub fn set_raw(&mut self, raw: impl Into<String>) {
        *self = Self::from_raw(raw);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.object().get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get_i64(key).and_then(|n| i32::try_from(n).ok())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_i64()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_f64()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    pub fn get_object(&self, key: &str) -> Option<&JsonObject> {
        self.get(key)?.as_object()
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.get(key)?.as_array()
    }

    /// Deserializes a value into `T`; `None` when missing or mismatched.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        serde_json::from_value(self.get(key)?.clone()).ok()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.object_mut().insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.object_mut().remove(key)
    }

    /// Merges `value` into `key` following JSON merge patch rules.
    ///
    /// `null` removes the key; an object merges into an existing object;
    /// anything else replaces the value.
    pub fn merge_key(&mut self, key: &str, value: &Value) {
        let object = self.object_mut();
        if value.is_null() {
            object.remove(key);
            return;
        }
        if let Some(existing) = object.get_mut(key) {
            if existing.is_object() && value.is_object() {
                json_patch::merge(existing, value);
                return;
            }
        }
        object.insert(key.to_string(), value.clone());
    }

    /// Copy of the object without the private key and `extra_keys`.
    pub fn shareable_copy(&self, extra_keys: &[&str]) -> JsonObject {
        let mut copy = self.object().clone();
        copy.remove(PRIVATE_CONFIG_KEY);
        for key in extra_keys {
            copy.remove(*key);
        }
        copy
    }
}

impl PartialEq for ConfigPayload {
    fn eq(&self, other: &Self) -> bool {
        self.object() == other.object()
    }
}

impl Serialize for ConfigPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.object().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfigPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(object) => Self::from_object(object),
            Value::String(raw) => Self::from_raw(raw),
            _ => Self::new(),
        })
    }
}

/// An entity core with a configuration payload.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tessera_persistence::entity::ConfigurableEntity;
///
/// let mut entity = ConfigurableEntity::new();
/// entity.set_config(json!({"a": 1}).as_object().unwrap().clone());
/// let reparsed: serde_json::Value = serde_json::from_str(entity.config_string()).unwrap();
/// assert_eq!(reparsed, json!({"a": 1}));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurableEntity {
    #[serde(flatten)]
    entity: ResourceEntity,

    #[serde(default)]
    config: ConfigPayload,
}

impl ConfigurableEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            entity: ResourceEntity::with_name(name),
            config: ConfigPayload::new(),
        }
    }

    pub fn entity(&self) -> &ResourceEntity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut ResourceEntity {
        &mut self.entity
    }

    /// The parsed config object.
    pub fn config(&self) -> &JsonObject {
        self.config.object()
    }

    /// The config serialized as a string.
    pub fn config_string(&self) -> &str {
        self.config.raw()
    }

    /// Typed read access to the config.
    pub fn config_payload(&self) -> &ConfigPayload {
        &self.config
    }

    /// Write access to the config; records a config change.
    pub fn config_payload_mut(&mut self) -> &mut ConfigPayload {
        self.entity.mark_changed("config");
        &mut self.config
    }

    pub fn set_config(&mut self, object: JsonObject) {
        if self.config.object() != &object {
            self.config.set_object(object);
            self.entity.mark_changed("config");
        }
    }

    pub fn set_config_string(&mut self, raw: impl Into<String>) {
        self.config.set_raw(raw);
        self.entity.mark_changed("config");
    }

    /// Re-assigns the config without the private key and `extra_keys`.
    pub fn copy_config_itself(&mut self, extra_keys: &[&str]) {
        let copy = self.config.shareable_copy(extra_keys);
        self.set_config(copy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_malformed_raw_recovers_to_empty() {
        let mut entity = ConfigurableEntity::new();
        entity.set_config_string("{not json");
        assert!(entity.config().is_empty());
        assert_eq!(entity.config_string(), "{not json");
    }

    #[test]
    fn test_object_write_then_string_read() {
        let mut entity = ConfigurableEntity::new();
        entity.set_config(object(json!({"a": 1})));
        let reparsed: Value = serde_json::from_str(entity.config_string()).unwrap();
        assert_eq!(reparsed, json!({"a": 1}));
    }

    #[test]
    fn test_string_write_then_object_read() {
        let mut entity = ConfigurableEntity::new();
        entity.set_config_string(r#"{"b": [1, 2]}"#);
        assert_eq!(entity.config_payload().get_array("b").map(Vec::len), Some(2));
        assert!(entity.entity().changes().contains("config"));
    }

    #[test]
    fn test_mutation_invalidates_raw_cache() {
        let mut payload = ConfigPayload::from_raw(r#"{"a": 1}"#);
        assert_eq!(payload.raw(), r#"{"a": 1}"#);
        payload.set("b", true);
        let reparsed: Value = serde_json::from_str(payload.raw()).unwrap();
        assert_eq!(reparsed, json!({"a": 1, "b": true}));
    }

    #[test]
    fn test_typed_getters() {
        let payload = ConfigPayload::from_object(object(json!({
            "s": "text",
            "big": 5_000_000_000i64,
            "f": 1.5,
            "o": {"k": "v"},
        })));
        assert_eq!(payload.get_str("s"), Some("text"));
        assert_eq!(payload.get_i32("big"), None);
        assert_eq!(payload.get_i64("big"), Some(5_000_000_000));
        assert_eq!(payload.get_f64("f"), Some(1.5));
        assert_eq!(payload.get_object("o").and_then(|o| o.get("k")), Some(&json!("v")));
        assert_eq!(payload.get_str("missing"), None);
        assert_eq!(payload.get_as::<Vec<String>>("s"), None);
        assert_eq!(payload.get_as::<String>("s").as_deref(), Some("text"));
    }

    #[test]
    fn test_merge_key() {
        let mut payload = ConfigPayload::from_object(object(json!({
            "ui": {"theme": "dark", "font": 12},
            "gone": true,
        })));
        payload.merge_key("ui", &json!({"font": null, "lang": "en"}));
        payload.merge_key("gone", &Value::Null);
        payload.merge_key("new", &json!(3));
        assert_eq!(
            Value::Object(payload.object().clone()),
            json!({"ui": {"theme": "dark", "lang": "en"}, "new": 3})
        );
    }

    #[test]
    fn test_copy_config_itself_drops_private() {
        let mut entity = ConfigurableEntity::new();
        entity.set_config(object(json!({"private": {"token": "t"}, "keep": 1, "drop": 2})));
        entity.copy_config_itself(&["drop"]);
        assert_eq!(Value::Object(entity.config().clone()), json!({"keep": 1}));
    }

    #[test]
    fn test_serde_flattens_entity() {
        let mut entity = ConfigurableEntity::with_name("cfg");
        entity.entity_mut().set_id("c1");
        entity.set_config(object(json!({"x": 1})));
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["id"], "c1");
        assert_eq!(value["config"], json!({"x": 1}));

        let parsed: ConfigurableEntity = serde_json::from_value(json!({
            "id": "c1",
            "name": "cfg",
            "config": "{\"x\": 2}",
        }))
        .unwrap();
        assert_eq!(parsed.config_payload().get_i64("x"), Some(2));
        assert!(!parsed.entity().has_changes());
    }
}
