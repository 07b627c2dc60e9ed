//! Users.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{
    ConfigPayload, ConfigurableEntity, Resource, ResourceEntity, SecurityEntity,
    SecurityEntityType, assign, optional_string_field, patch_common_field,
};
use crate::error::ValidationError;
use crate::query::QueryPredication;

/// A user account.
///
/// # Examples
///
/// ```
/// use tessera_persistence::entities::User;
/// use tessera_persistence::entity::Resource;
///
/// let mut user = User::new("ada");
/// user.set_email(Some("ada@example.org".to_string()));
/// assert!(user.entity().changes().contains("email"));
///
/// let json = serde_json::to_value(&user).unwrap();
/// assert_eq!(json["name"], "ada");
/// assert_eq!(json["email"], "ada@example.org");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    base: ConfigurableEntity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    nickname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar: Option<String>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ConfigurableEntity::with_name(name),
            ..Self::default()
        }
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    pub fn set_nickname(&mut self, nickname: Option<String>) {
        assign(&mut self.nickname, nickname, self.base.entity_mut(), "nickname");
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn set_email(&mut self, email: Option<String>) {
        let email = email.map(|e| e.trim().to_lowercase());
        assign(&mut self.email, email, self.base.entity_mut(), "email");
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub fn set_avatar(&mut self, avatar: Option<String>) {
        assign(&mut self.avatar, avatar, self.base.entity_mut(), "avatar");
    }

    pub fn config(&self) -> &ConfigPayload {
        self.base.config_payload()
    }
}

impl Resource for User {
    const KIND: &'static str = "user";

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
            "nickname" => self.set_nickname(optional_string_field(key, value)?),
            "email" => self.set_email(optional_string_field(key, value)?),
            "avatar" => self.set_avatar(optional_string_field(key, value)?),
            _ => return patch_common_field(self, key, value),
        }
        Ok(true)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.entity().name().trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "name".to_string(),
                message: "a user needs a name".to_string(),
            });
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(ValidationError::InvalidField {
                    field: "email".to_string(),
                    message: format!("not an email address: {email}"),
                });
            }
        }
        Ok(())
    }

    fn predication() -> QueryPredication<Self> {
        QueryPredication::new().with("email", |user: &User, value| {
            user.email().is_some_and(|email| email.eq_ignore_ascii_case(value))
        })
    }
}

impl SecurityEntity for User {
    const SECURITY_TYPE: SecurityEntityType = SecurityEntityType::User;
}
