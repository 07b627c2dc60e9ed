//! Content items and their revisions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{
    ConfigPayload, ConfigurableEntity, Resource, ResourceEntity, ResourceState, assign, id_field,
    optional_string_field, patch_common_field,
};
use crate::error::ValidationError;
use crate::query::QueryPredication;
use crate::revision::{Revision, Versioned};

/// Fields shared by content items and their revisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentFields {
    /// Id of the publishing user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Id of the parent content item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// Template the body is rendered with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,

    /// The body. Omitted from slim projections.
    #[serde(rename = "content", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ContentFields {
    /// Patches one field, recording the change on `entity`.
    fn patch(
        &mut self,
        entity: &mut ResourceEntity,
        key: &str,
        value: &Value,
    ) -> Result<bool, ValidationError> {
        match key {
            "publisher" => assign(&mut self.publisher, id_field(key, value)?, entity, "publisher"),
            "parent" => assign(&mut self.parent, id_field(key, value)?, entity, "parent"),
            "thumbnail" => assign(
                &mut self.thumbnail,
                optional_string_field(key, value)?,
                entity,
                "thumbnail",
            ),
            "template" => assign(
                &mut self.template,
                optional_string_field(key, value)?,
                entity,
                "template",
            ),
            "intro" => assign(
                &mut self.intro,
                optional_string_field(key, value)?,
                entity,
                "intro",
            ),
            "content" => assign(
                &mut self.body,
                optional_string_field(key, value)?,
                entity,
                "content",
            ),
            _ => return Ok(false),
        };
        Ok(true)
    }
}

/// A published or drafted content item.
///
/// # Examples
///
/// ```
/// use tessera_persistence::entities::Content;
/// use tessera_persistence::entity::{Projection, Resource};
///
/// let mut post = Content::new("hello");
/// post.set_body(Some("long text".to_string()));
///
/// let full = post.project(Projection::Full).unwrap();
/// let slim = post.project(Projection::Slim).unwrap();
/// assert_eq!(full["content"], "long text");
/// assert!(slim.get("content").is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(flatten)]
    base: ConfigurableEntity,

    #[serde(flatten)]
    fields: ContentFields,
}

macro_rules! content_accessors {
    ($($field:ident, $setter:ident, $wire:literal;)+) => {
        $(
            pub fn $field(&self) -> Option<&str> {
                self.fields.$field.as_deref()
            }

            pub fn $setter(&mut self, value: Option<String>) {
                assign(&mut self.fields.$field, value, self.base.entity_mut(), $wire);
            }
        )+
    };
}

impl Content {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ConfigurableEntity::with_name(name),
            fields: ContentFields::default(),
        }
    }

    content_accessors! {
        publisher, set_publisher, "publisher";
        parent, set_parent, "parent";
        thumbnail, set_thumbnail, "thumbnail";
        template, set_template, "template";
        intro, set_intro, "intro";
        body, set_body, "content";
    }

    pub fn fields(&self) -> &ContentFields {
        &self.fields
    }

    pub fn config(&self) -> &ConfigPayload {
        self.base.config_payload()
    }

    pub fn config_payload_mut(&mut self) -> &mut ConfigPayload {
        self.base.config_payload_mut()
    }
}

impl Resource for Content {
    const KIND: &'static str = "content";
    const SLIM_OMITS: &'static [&'static str] = &["content"];

    fn entity(&self) -> &ResourceEntity {
        self.base.entity()
    }

    fn entity_mut(&mut self) -> &mut ResourceEntity {
        self.base.entity_mut()
    }

    fn configurable(&self) -> Option<&ConfigurableEntity> {
        Some(&self.base)
    }

    fn configurable_mut(&mut self) -> Option<&mut ConfigurableEntity> {
        Some(&mut self.base)
    }

    fn patch_field(&mut self, key: &str, value: &Value) -> Result<bool, ValidationError> {
        if self.fields.patch(self.base.entity_mut(), key, value)? {
            return Ok(true);
        }
        patch_common_field(self, key, value)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.fields.parent.as_deref() == Some(self.entity().id()) {
            return Err(ValidationError::InvalidField {
                field: "parent".to_string(),
                message: "content cannot be its own parent".to_string(),
            });
        }
        Ok(())
    }

    fn predication() -> QueryPredication<Self> {
        QueryPredication::new()
            .with("publisher", |c: &Content, value| c.publisher() == Some(value))
            .with("parent", |c: &Content, value| c.parent() == Some(value))
            .with("template", |c: &Content, value| c.template() == Some(value))
    }
}

impl Versioned for Content {
    type Revision = ContentRevision;

    fn create_revision(&self, message: impl Into<String>) -> ContentRevision {
        let mut base = ConfigurableEntity::with_name(self.entity().name());
        base.set_config(self.base.config().clone());
        ContentRevision {
            base,
            fields: self.fields.clone(),
            source_id: self.entity().id().to_string(),
            message: message.into(),
        }
    }

    fn restore_from(&mut self, revision: &ContentRevision) {
        self.base.entity_mut().set_name(revision.entity().name());
        self.base.set_config(revision.base.config().clone());
        let fields = revision.fields.clone();
        let entity = self.base.entity_mut();
        assign(&mut self.fields.publisher, fields.publisher, entity, "publisher");
        assign(&mut self.fields.parent, fields.parent, entity, "parent");
        assign(&mut self.fields.thumbnail, fields.thumbnail, entity, "thumbnail");
        assign(&mut self.fields.template, fields.template, entity, "template");
        assign(&mut self.fields.intro, fields.intro, entity, "intro");
        assign(&mut self.fields.body, fields.body, entity, "content");
    }
}

/// An immutable snapshot of a [`Content`] item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentRevision {
    #[serde(flatten)]
    base: ConfigurableEntity,

    #[serde(flatten)]
    fields: ContentFields,

    #[serde(rename = "source", default)]
    source_id: String,

    #[serde(default)]
    message: String,
}

impl ContentRevision {
    pub fn fields(&self) -> &ContentFields {
        &self.fields
    }

    pub fn body(&self) -> Option<&str> {
        self.fields.body.as_deref()
    }

    pub fn config(&self) -> &ConfigPayload {
        self.base.config_payload()
    }
}

impl Resource for ContentRevision {
    const KIND: &'static str = "content-revision";
    const SLIM_OMITS: &'static [&'static str] = &["content"];
    const IMMUTABLE: bool = true;

    fn entity(&self) -> &ResourceEntity {
        self.base.entity()
    }

    fn entity_mut(&mut self) -> &mut ResourceEntity {
        self.base.entity_mut()
    }

    fn configurable(&self) -> Option<&ConfigurableEntity> {
        Some(&self.base)
    }

    fn configurable_mut(&mut self) -> Option<&mut ConfigurableEntity> {
        Some(&mut self.base)
    }

    fn patch_field(&mut self, key: &str, value: &Value) -> Result<bool, ValidationError> {
        if self.fields.patch(self.base.entity_mut(), key, value)? {
            return Ok(true);
        }
        match key {
            "message" => {
                let message = optional_string_field(key, value)?.unwrap_or_default();
                assign(&mut self.message, message, self.base.entity_mut(), "message");
                Ok(true)
            }
            "source" => Ok(false),
            _ => patch_common_field(self, key, value),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.source_id.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "source".to_string(),
                message: "a revision needs a source".to_string(),
            });
        }
        if self.entity().state() != ResourceState::Normal {
            return Err(ValidationError::InvalidField {
                field: "state".to_string(),
                message: "revisions are always normal".to_string(),
            });
        }
        Ok(())
    }

    fn predication() -> QueryPredication<Self> {
        QueryPredication::new()
            .with("source", |r: &ContentRevision, value| r.source_id == value)
            .with("publisher", |r: &ContentRevision, value| {
                r.fields.publisher.as_deref() == Some(value)
            })
    }
}

impl Revision for ContentRevision {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn message(&self) -> &str {
        &self.message
    }
}
