//! Comments on content.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Content, User};
use crate::entity::{
    ConfigurableEntity, Relationship, Resource, ResourceEntity, assign, optional_string_field,
    patch_common_field,
};
use crate::error::ValidationError;
use crate::query::QueryPredication;

/// A user's comment on a content item: owner = user, target = content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(flatten)]
    base: ConfigurableEntity,

    #[serde(flatten)]
    link: Relationship<User, Content>,

    #[serde(rename = "content", default)]
    body: String,
}

impl Comment {
    pub fn new(author: Arc<User>, content: Arc<Content>, body: impl Into<String>) -> Self {
        let link = Relationship::new(author, content);
        let name = link.suggested_name().unwrap_or_default();
        Self {
            base: ConfigurableEntity::with_name(name),
            link,
            body: body.into(),
        }
    }

    pub fn from_ids(author_id: &str, content_id: &str, body: impl Into<String>) -> Self {
        Self {
            base: ConfigurableEntity::new(),
            link: Relationship::from_ids(author_id, content_id),
            body: body.into(),
        }
    }

    pub fn author_id(&self) -> &str {
        self.link.owner_id()
    }

    pub fn content_id(&self) -> &str {
        self.link.target_id()
    }

    pub fn author(&self) -> Option<&Arc<User>> {
        self.link.owner()
    }

    pub fn content(&self) -> Option<&Arc<Content>> {
        self.link.target()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        assign(&mut self.body, body.into(), self.base.entity_mut(), "content");
    }

    pub fn rebind(&self, author: Option<Arc<User>>, content: Option<Arc<Content>>) -> Self {
        Self {
            base: self.base.clone(),
            link: self.link.rebind(author, content),
            body: self.body.clone(),
        }
    }
}

impl Resource for Comment {
    const KIND: &'static str = "comment";

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
        match key {
            "content" => {
                self.set_body(optional_string_field(key, value)?.unwrap_or_default());
                Ok(true)
            }
            "owner" | "ownerType" | "target" => Ok(false),
            _ => patch_common_field(self, key, value),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.author_id().is_empty() || self.content_id().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "target".to_string(),
                message: "a comment needs an author and a content item".to_string(),
            });
        }
        if self.body.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "content".to_string(),
                message: "empty comment".to_string(),
            });
        }
        Ok(())
    }

    fn predication() -> QueryPredication<Self> {
        QueryPredication::new()
            .with("owner", |c: &Comment, value| c.author_id() == value)
            .with("target", |c: &Comment, value| c.content_id() == value)
    }
}
