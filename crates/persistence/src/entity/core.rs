//! Identity, lifecycle state and revision tracking shared by every entity.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::ResourceState;

/// Generates a 64 hex character entity id.
pub fn new_entity_id() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn new_revision_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Trims and lower-cases an id.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Fields modified since the entity was loaded or last saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    fields: BTreeSet<&'static str>,
    notifications: u64,
}

impl ChangeSet {
    /// Records a change of `field`.
    pub fn mark(&mut self, field: &'static str) {
        self.fields.insert(field);
        self.notifications += 1;
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().copied()
    }

    /// Total number of change notifications, including repeated fields.
    pub fn notifications(&self) -> u64 {
        self.notifications
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.notifications = 0;
    }
}

/// Assigns `value` to `slot` and records the change when it differs.
///
/// Returns whether anything changed.
pub fn assign<T: PartialEq>(
    slot: &mut T,
    value: T,
    entity: &mut ResourceEntity,
    field: &'static str,
) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    entity.mark_changed(field);
    true
}

/// The identity and lifecycle part of every entity.
///
/// # Examples
///
/// ```
/// use tessera_persistence::entity::ResourceEntity;
///
/// let mut entity = ResourceEntity::new();
/// let first = entity.id().to_string();
/// assert_eq!(first.len(), 64);
/// assert_eq!(entity.id(), first);
/// assert!(entity.is_new());
///
/// entity.set_id("  ABC ");
/// assert_eq!(entity.id(), "abc");
/// assert!(!entity.is_new());
/// ```
#[derive(Debug, Clone)]
pub struct ResourceEntity {
    id: OnceLock<String>,
    id_assigned: bool,
    name: String,
    state: ResourceState,
    creation_time: DateTime<Utc>,
    last_modification_time: DateTime<Utc>,
    revision: Option<String>,
    /// Token active before the last `prepare_for_saving`.
    saving_backup: Option<Option<String>>,
    changes: ChangeSet,
}

impl ResourceEntity {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: OnceLock::new(),
            id_assigned: false,
            name: String::new(),
            state: ResourceState::Normal,
            creation_time: now,
            last_modification_time: now,
            revision: None,
            saving_backup: None,
            changes: ChangeSet::default(),
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        let mut entity = Self::new();
        entity.name = name.into();
        entity
    }

    /// The entity id; generated on first read when none was assigned.
    pub fn id(&self) -> &str {
        self.id.get_or_init(new_entity_id)
    }

    /// Assigns the id, trimmed and lower-cased.
    pub fn set_id(&mut self, id: &str) {
        let id = normalize_id(id);
        if self.id_assigned && self.id.get() == Some(&id) {
            return;
        }
        self.id = OnceLock::from(id);
        self.id_assigned = true;
        self.changes.mark("id");
    }

    /// Returns `true` until an id is assigned or the entity is saved.
    pub fn is_new(&self) -> bool {
        !self.id_assigned
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.name != name {
            self.name = name;
            self.changes.mark("name");
        }
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn set_state(&mut self, state: ResourceState) {
        if self.state != state {
            self.state = state;
            self.changes.mark("state");
        }
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn last_modification_time(&self) -> DateTime<Utc> {
        self.last_modification_time
    }

    /// The current revision token; `None` before the first save.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Overrides the revision token without recording a change.
    ///
    /// Used when a caller states which revision it expects to overwrite.
    pub fn set_revision(&mut self, revision: Option<String>) {
        self.revision = revision;
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn mark_changed(&mut self, field: &'static str) {
        self.changes.mark(field);
    }

    /// Issues a fresh revision token and refreshes the modification time.
    pub fn prepare_for_saving(&mut self) {
        let previous = self.revision.clone();
        let mut next = new_revision_token();
        while previous.as_deref() == Some(next.as_str()) {
            next = new_revision_token();
        }
        self.saving_backup = Some(previous);
        self.revision = Some(next);
        self.last_modification_time = Utc::now();
    }

    /// Restores the token that was active before the last
    /// [`prepare_for_saving`](Self::prepare_for_saving).
    pub fn rollback_saving(&mut self) {
        if let Some(previous) = self.saving_backup.take() {
            self.revision = previous;
        }
    }

    /// Marks a save as durable: the id is fixed and the change set is cleared.
    pub fn commit_saving(&mut self) {
        let id = self.id().to_string();
        self.id = OnceLock::from(id);
        self.id_assigned = true;
        self.saving_backup = None;
        self.changes.clear();
    }

    /// Takes the stored revision and timestamps reported by a store.
    pub fn adopt_persisted(&mut self, persisted: &ResourceEntity) {
        self.revision = persisted.revision.clone();
        self.creation_time = persisted.creation_time;
        self.last_modification_time = persisted.last_modification_time;
    }
}

impl Default for ResourceEntity {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EntityWireRef<'a> {
    id: &'a str,
    name: &'a str,
    state: ResourceState,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rev: Option<&'a str>,
}

#[derive(Deserialize)]
struct EntityWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: ResourceState,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    modified: Option<DateTime<Utc>>,
    #[serde(default)]
    rev: Option<String>,
}

impl Serialize for ResourceEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EntityWireRef {
            id: self.id(),
            name: &self.name,
            state: self.state,
            created: self.creation_time,
            modified: self.last_modification_time,
            rev: self.revision.as_deref(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceEntity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = EntityWire::deserialize(deserializer)?;
        let mut entity = ResourceEntity::new();
        if let Some(id) = wire.id.as_deref().map(normalize_id).filter(|id| !id.is_empty()) {
            entity.id = OnceLock::from(id);
            entity.id_assigned = true;
        }
        entity.name = wire.name;
        entity.state = wire.state;
        if let Some(created) = wire.created {
            entity.creation_time = created;
        }
        entity.last_modification_time = wire.modified.unwrap_or(entity.creation_time);
        entity.revision = wire.rev;
        Ok(entity)
    }
}
