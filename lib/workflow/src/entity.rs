//! The engine's view of content entities.
//!
//! Entities belong to the host CMS. The engine only needs their identity,
//! owner, label and the workflow fields it reads and writes through a
//! `FieldAccessor`.

use nodeflow_core::{EntityId, EntityType, StateId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field name used for a workflow attached to the entity itself rather than
/// to one of its fields.
pub const BARE_FIELD: &str = "";

/// Language code for content without a language.
pub const UNDEFINED_LANGUAGE: &str = "und";

/// A content entity as seen by the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity type, e.g. `node`.
    pub entity_type: EntityType,
    /// Entity ID; `None` until the entity is first saved.
    pub id: Option<EntityId>,
    /// Revision ID, if the entity type is revisioned.
    pub revision: Option<u64>,
    /// Language code.
    pub language: String,
    /// Owner; granted the AUTHOR pseudo-role.
    pub owner: Option<UserId>,
    /// Human-readable label.
    pub label: String,
    /// Workflow field values.
    #[serde(default)]
    pub fields: BTreeMap<String, StateId>,
}

impl Entity {
    /// Creates a new, unsaved entity.
    #[must_use]
    pub fn new(entity_type: EntityType, label: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: None,
            revision: None,
            language: UNDEFINED_LANGUAGE.to_string(),
            owner: None,
            label: label.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Sets the entity ID.
    #[must_use]
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the owner.
    #[must_use]
    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sets a workflow field value.
    #[must_use]
    pub fn with_field(mut self, field_name: impl Into<String>, state: StateId) -> Self {
        self.fields.insert(field_name.into(), state);
        self
    }

    /// Returns true if the entity has never been saved.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Returns true if `user` owns the entity.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == Some(user)
    }

    /// Returns the slot of one of this entity's fields, once it has an ID.
    #[must_use]
    pub fn slot(&self, field_name: &str) -> Option<FieldSlot> {
        self.id.as_ref().map(|id| FieldSlot {
            entity_type: self.entity_type.clone(),
            entity_id: id.clone(),
            field_name: field_name.to_string(),
        })
    }
}

/// One workflow value slot: an entity's field.
///
/// Slots key the scheduled store and the per-field locks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldSlot {
    /// Entity type.
    pub entity_type: EntityType,
    /// Entity ID.
    pub entity_id: EntityId,
    /// Field name; empty for a bare-entity workflow.
    pub field_name: String,
}

impl FieldSlot {
    /// Creates a slot.
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        entity_id: EntityId,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            field_name: field_name.into(),
        }
    }

    /// Returns true if the slot belongs to a bare-entity workflow.
    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.field_name == BARE_FIELD
    }
}

impl fmt::Display for FieldSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bare() {
            write!(f, "{}/{}", self.entity_type, self.entity_id)
        } else {
            write!(f, "{}/{}/{}", self.entity_type, self.entity_id, self.field_name)
        }
    }
}

/// Reads and writes workflow values on one kind of entity.
pub trait FieldAccessor: Send + Sync {
    /// Returns the current state stored in `field_name`.
    fn get(&self, entity: &Entity, field_name: &str) -> Option<StateId>;

    /// Stores `state` in `field_name`; `None` clears the field.
    fn set(&self, entity: &mut Entity, field_name: &str, state: Option<StateId>);
}

/// Field accessor over `Entity::fields`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMapAccessor;

impl FieldAccessor for FieldMapAccessor {
    fn get(&self, entity: &Entity, field_name: &str) -> Option<StateId> {
        entity.fields.get(field_name).cloned()
    }

    fn set(&self, entity: &mut Entity, field_name: &str, state: Option<StateId>) {
        match state {
            Some(state) => {
                entity.fields.insert(field_name.to_string(), state);
            }
            None => {
                entity.fields.remove(field_name);
            }
        }
    }
}
