//! User groups and group memberships.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::User;
use crate::entity::{
    ConfigPayload, ConfigurableEntity, Relationship, Resource, ResourceEntity, SecurityEntity,
    SecurityEntityType, assign, optional_string_field, patch_common_field,
};
use crate::error::ValidationError;
use crate::query::QueryPredication;
use crate::result::ChangeMethod;
use crate::types::wire::wire_enum;

/// A named group of users.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserGroup {
    #[serde(flatten)]
    base: ConfigurableEntity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar: Option<String>,
}

impl UserGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ConfigurableEntity::with_name(name),
            ..Self::default()
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        assign(
            &mut self.description,
            description,
            self.base.entity_mut(),
            "description",
        );
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

impl Resource for UserGroup {
    const KIND: &'static str = "group";
    const SLIM_OMITS: &'static [&'static str] = &["description"];

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
            "description" => self.set_description(optional_string_field(key, value)?),
            "avatar" => self.set_avatar(optional_string_field(key, value)?),
            _ => return patch_common_field(self, key, value),
        }
        Ok(true)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.entity().name().trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "name".to_string(),
                message: "a group needs a name".to_string(),
            });
        }
        Ok(())
    }
}

impl SecurityEntity for UserGroup {
    const SECURITY_TYPE: SecurityEntityType = SecurityEntityType::Group;
}

wire_enum! {
    /// Role of a user within a group.
    pub enum MemberRole as name {
        Member = 0 => "member",
        Manager = 1 => "manager",
        Owner = 2 => "owner",
    }
}

impl Default for MemberRole {
    fn default() -> Self {
        MemberRole::Member
    }
}

/// A user's membership in a group: owner = group, target = user.
///
/// Updates of an existing membership report
/// [`ChangeMethod::MemberModify`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    #[serde(flatten)]
    base: ConfigurableEntity,

    #[serde(flatten)]
    link: Relationship<UserGroup, User>,

    #[serde(default)]
    role: MemberRole,
}

impl Membership {
    /// Links `user` into `group`; the membership takes the user's name.
    pub fn new(group: Arc<UserGroup>, user: Arc<User>) -> Self {
        let link = Relationship::new(group, user);
        let name = link.suggested_name().unwrap_or_default();
        Self {
            base: ConfigurableEntity::with_name(name),
            link,
            role: MemberRole::default(),
        }
    }

    pub fn from_ids(group_id: &str, user_id: &str) -> Self {
        Self {
            base: ConfigurableEntity::new(),
            link: Relationship::from_ids(group_id, user_id),
            role: MemberRole::default(),
        }
    }

    pub fn group_id(&self) -> &str {
        self.link.owner_id()
    }

    pub fn user_id(&self) -> &str {
        self.link.target_id()
    }

    pub fn group(&self) -> Option<&Arc<UserGroup>> {
        self.link.owner()
    }

    pub fn user(&self) -> Option<&Arc<User>> {
        self.link.target()
    }

    pub fn relationship(&self) -> &Relationship<UserGroup, User> {
        &self.link
    }

    pub fn role(&self) -> MemberRole {
        self.role
    }

    pub fn set_role(&mut self, role: MemberRole) {
        assign(&mut self.role, role, self.base.entity_mut(), "role");
    }

    /// A copy of this membership bound to freshly fetched references.
    pub fn rebind(&self, group: Option<Arc<UserGroup>>, user: Option<Arc<User>>) -> Self {
        Self {
            base: self.base.clone(),
            link: self.link.rebind(group, user),
            role: self.role,
        }
    }
}

impl Resource for Membership {
    const KIND: &'static str = "membership";
    const UPDATE_METHOD: ChangeMethod = ChangeMethod::MemberModify;

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
            "role" => {
                let role = serde_json::from_value(value.clone()).map_err(|err| {
                    ValidationError::InvalidField {
                        field: key.to_string(),
                        message: err.to_string(),
                    }
                })?;
                self.set_role(role);
                Ok(true)
            }
            // Members are moved by creating a new membership.
            "owner" | "ownerType" | "target" => Ok(false),
            _ => patch_common_field(self, key, value),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.group_id().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "owner".to_string(),
                message: "a membership needs a group".to_string(),
            });
        }
        if self.user_id().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "target".to_string(),
                message: "a membership needs a user".to_string(),
            });
        }
        Ok(())
    }

    fn predication() -> QueryPredication<Self> {
        QueryPredication::new()
            .with("group", |m: &Membership, value| m.group_id() == value)
            .with("user", |m: &Membership, value| m.user_id() == value)
            .with("role", |m: &Membership, value| {
                MemberRole::parse_name(value) == Some(m.role())
            })
    }
}
