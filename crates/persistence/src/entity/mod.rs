//! The entity model.
//!
//! - [`ResourceEntity`] - Identity, state, timestamps and revision of every entity
//! - [`ConfigurableEntity`], [`ConfigPayload`] - JSON configuration with typed access
//! - [`Resource`] - The trait providers work against
//! - [`OwnerRef`], [`Relationship`] - Ownership and owner/target links
//! - [`apply_patch`] - Partial updates shared by every provider

mod config;
mod core;
mod patch;
mod relation;
mod resource;
mod state;

pub use config::{ConfigPayload, ConfigurableEntity, JsonObject, PRIVATE_CONFIG_KEY};
pub use self::core::{ChangeSet, ResourceEntity, assign, new_entity_id, normalize_id};
pub use patch::{
    apply_patch, id_field, optional_string_field, parse_patch, patch_common_field, string_field,
};
pub use relation::{OwnerRef, Relationship, SecurityEntity, SecurityEntityType};
pub use resource::{Projection, Resource};
pub use state::ResourceState;
