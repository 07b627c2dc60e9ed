//! Ownership and relationships between entities.
//!
//! References are stored as ids. A resolved in-memory reference may ride
//! along, but it is never persisted and only counts while it still matches the
//! stored id (and, for owners, the security type tag).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use super::Resource;
use super::core::normalize_id;
use crate::types::wire::wire_enum;

wire_enum! {
    /// Kind of principal an owner reference points at.
    pub enum SecurityEntityType as ordinal {
        Unknown = 0 => "unknown",
        User = 1 => "user",
        Group = 2 => "group",
        Client = 3 => "client",
    }
}

impl Default for SecurityEntityType {
    fn default() -> Self {
        SecurityEntityType::Unknown
    }
}

/// An entity that can own other entities.
pub trait SecurityEntity: Resource {
    const SECURITY_TYPE: SecurityEntityType;
}

/// Reads a stored id in its normalized form.
fn normalized_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|id| normalize_id(&id))
}

fn security_type<O: SecurityEntity>() -> SecurityEntityType {
    O::SECURITY_TYPE
}

/// Reference to the owner of an entity.
///
/// Serializes as `{"owner": id, "ownerType": n}`. When decoding, the id is
/// normalized and an absent `ownerType` means `O`'s own type.
#[derive(Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = "O: SecurityEntity"))]
pub struct OwnerRef<O> {
    #[serde(rename = "owner", default, deserialize_with = "normalized_id")]
    owner_id: String,

    #[serde(rename = "ownerType", default = "security_type::<O>")]
    owner_type: SecurityEntityType,

    #[serde(skip)]
    owner: Option<Arc<O>>,
}

impl<O: SecurityEntity> OwnerRef<O> {
    /// References a resolved owner.
    pub fn new(owner: Arc<O>) -> Self {
        Self {
            owner_id: owner.entity().id().to_string(),
            owner_type: O::SECURITY_TYPE,
            owner: Some(owner),
        }
    }

    /// References an owner by id only.
    pub fn from_id(owner_id: &str) -> Self {
        Self {
            owner_id: normalize_id(owner_id),
            owner_type: O::SECURITY_TYPE,
            owner: None,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn owner_type(&self) -> SecurityEntityType {
        self.owner_type
    }

    /// The resolved owner, if it still matches the stored id and type.
    pub fn owner(&self) -> Option<&Arc<O>> {
        self.owner.as_ref().filter(|owner| {
            owner.entity().id() == self.owner_id && O::SECURITY_TYPE == self.owner_type
        })
    }

    /// Returns `true` when `entity` is the stored owner, by id and type.
    pub fn is_owner<P: SecurityEntity>(&self, entity: &P) -> bool {
        P::SECURITY_TYPE == self.owner_type && entity.entity().id() == self.owner_id
    }

    /// Attaches a freshly fetched owner without changing the stored id.
    pub fn rebind(&self, owner: Option<Arc<O>>) -> Self {
        Self {
            owner_id: self.owner_id.clone(),
            owner_type: self.owner_type,
            owner,
        }
    }
}

impl<O> Clone for OwnerRef<O> {
    fn clone(&self) -> Self {
        Self {
            owner_id: self.owner_id.clone(),
            owner_type: self.owner_type,
            owner: self.owner.clone(),
        }
    }
}

impl<O> fmt::Debug for OwnerRef<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerRef")
            .field("owner_id", &self.owner_id)
            .field("owner_type", &self.owner_type)
            .field("resolved", &self.owner.is_some())
            .finish()
    }
}

impl<O> PartialEq for OwnerRef<O> {
    fn eq(&self, other: &Self) -> bool {
        self.owner_id == other.owner_id && self.owner_type == other.owner_type
    }
}

/// An owner plus a target.
///
/// Serializes as the owner fields plus `{"target": id}`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tessera_persistence::entities::{User, UserGroup};
/// use tessera_persistence::entity::{Relationship, Resource};
///
/// let group = Arc::new(UserGroup::new("editors"));
/// let user = Arc::new(User::new("ada"));
/// let link = Relationship::new(group.clone(), user.clone());
///
/// assert!(link.is_owner(group.as_ref()));
/// assert!(!link.is_owner(user.as_ref()));
/// assert_eq!(link.suggested_name().as_deref(), Some("ada"));
/// ```
#[derive(Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = "O: SecurityEntity"))]
pub struct Relationship<O, T> {
    #[serde(flatten)]
    owner: OwnerRef<O>,

    #[serde(rename = "target", default, deserialize_with = "normalized_id")]
    target_id: String,

    #[serde(skip)]
    target: Option<Arc<T>>,
}

impl<O: SecurityEntity, T: Resource> Relationship<O, T> {
    pub fn new(owner: Arc<O>, target: Arc<T>) -> Self {
        Self {
            owner: OwnerRef::new(owner),
            target_id: target.entity().id().to_string(),
            target: Some(target),
        }
    }

    pub fn from_ids(owner_id: &str, target_id: &str) -> Self {
        Self {
            owner: OwnerRef::from_id(owner_id),
            target_id: normalize_id(target_id),
            target: None,
        }
    }

    pub fn owner_ref(&self) -> &OwnerRef<O> {
        &self.owner
    }

    pub fn owner_id(&self) -> &str {
        self.owner.owner_id()
    }

    pub fn owner(&self) -> Option<&Arc<O>> {
        self.owner.owner()
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// The resolved target, if it still matches the stored id.
    pub fn target(&self) -> Option<&Arc<T>> {
        self.target
            .as_ref()
            .filter(|target| target.entity().id() == self.target_id)
    }

    pub fn is_owner<P: SecurityEntity>(&self, entity: &P) -> bool {
        self.owner.is_owner(entity)
    }

    /// Name a new relationship takes when none is given: the target's name.
    pub fn suggested_name(&self) -> Option<String> {
        self.target()
            .map(|target| target.entity().name().to_string())
            .filter(|name| !name.is_empty())
    }

    /// Keeps the stored ids and attaches freshly fetched references.
    pub fn rebind(&self, owner: Option<Arc<O>>, target: Option<Arc<T>>) -> Self {
        Self {
            owner: self.owner.rebind(owner),
            target_id: self.target_id.clone(),
            target,
        }
    }
}

impl<O, T> Clone for Relationship<O, T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            target_id: self.target_id.clone(),
            target: self.target.clone(),
        }
    }
}

impl<O, T> fmt::Debug for Relationship<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relationship")
            .field("owner", &self.owner)
            .field("target_id", &self.target_id)
            .field("target_resolved", &self.target.is_some())
            .finish()
    }
}

impl<O, T> PartialEq for Relationship<O, T> {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.target_id == other.target_id
    }
}
