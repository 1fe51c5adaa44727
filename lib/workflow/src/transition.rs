//! Transition instances.
//!
//! A `Transition` is one request to move an entity field from one state to
//! another. It walks a small state machine of its own:
//!
//! ```text
//! Created → Validated → Authorized → Executed
//!                                  → Scheduled
//!         (any step)               → Rejected
//! ```
//!
//! Executed, Scheduled and Rejected are terminal.

use crate::entity::{Entity, FieldSlot};
use crate::error::Rejection;
use chrono::{DateTime, Utc};
use nodeflow_core::{EntityId, EntityType, StateId, TransitionId, UserId};
use serde::{Deserialize, Serialize};

/// Execution phase of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPhase {
    /// Built but not yet checked.
    #[default]
    Created,
    /// Entity and states resolved.
    Validated,
    /// Permission granted.
    Authorized,
    /// Applied and recorded.
    Executed,
    /// Stored for later execution.
    Scheduled,
    /// Declined; see `Transition::rejection`.
    Rejected,
}

impl TransitionPhase {
    /// Returns true for Executed, Scheduled and Rejected.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Scheduled | Self::Rejected)
    }
}

/// The entity field a transition applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTarget {
    /// Entity type.
    pub entity_type: EntityType,
    /// Entity ID; `None` while the entity is unsaved.
    pub entity_id: Option<EntityId>,
    /// Entity revision.
    pub revision: Option<u64>,
    /// Workflow field name; empty for a bare-entity workflow.
    pub field_name: String,
    /// Language code.
    pub language: String,
}

impl TransitionTarget {
    /// Describes `field_name` on `entity`.
    #[must_use]
    pub fn of(entity: &Entity, field_name: &str) -> Self {
        Self {
            entity_type: entity.entity_type.clone(),
            entity_id: entity.id.clone(),
            revision: entity.revision,
            field_name: field_name.to_string(),
            language: entity.language.clone(),
        }
    }

    /// Returns the slot, once the entity has an ID.
    #[must_use]
    pub fn slot(&self) -> Option<FieldSlot> {
        self.entity_id.as_ref().map(|id| {
            FieldSlot::new(self.entity_type.clone(), id.clone(), self.field_name.clone())
        })
    }
}

/// A transition of one entity field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Unique ID of this transition instance.
    pub id: TransitionId,
    /// The entity field; `None` only for a transition built without entity.
    pub target: Option<TransitionTarget>,
    /// State before the transition.
    pub from_sid: StateId,
    /// Requested state.
    pub to_sid: StateId,
    /// Acting user.
    pub uid: UserId,
    /// When the transition happened or is due, at second granularity.
    pub timestamp: DateTime<Utc>,
    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
    /// Execute at `timestamp` rather than now.
    #[serde(default)]
    pub scheduled: bool,
    /// Set once applied.
    #[serde(default)]
    pub executed: bool,
    /// Bypass permission checks.
    #[serde(default)]
    pub forced: bool,
    /// Execution phase.
    #[serde(default)]
    pub phase: TransitionPhase,
    #[serde(skip)]
    rejection: Option<Rejection>,
    #[serde(skip)]
    entity: Option<Entity>,
}

impl Transition {
    /// Creates a transition in the Created phase.
    #[must_use]
    pub fn new(from_sid: StateId, to_sid: StateId, uid: UserId, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: TransitionId::new(),
            target: None,
            from_sid,
            to_sid,
            uid,
            timestamp,
            comment: String::new(),
            scheduled: false,
            executed: false,
            forced: false,
            phase: TransitionPhase::Created,
            rejection: None,
            entity: None,
        }
    }

    /// Attaches the entity and field.
    #[must_use]
    pub fn for_entity(mut self, entity: Entity, field_name: &str) -> Self {
        self.target = Some(TransitionTarget::of(&entity, field_name));
        self.entity = Some(entity);
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Sets the forced flag.
    #[must_use]
    pub fn with_force(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    /// Marks the transition as scheduled.
    #[must_use]
    pub fn scheduled(mut self, scheduled: bool) -> Self {
        self.scheduled = scheduled;
        self
    }

    /// Returns the attached entity.
    #[must_use]
    pub fn entity(&self) -> Option<&Entity> {
        self.entity.as_ref()
    }

    /// Returns the attached entity mutably.
    pub fn entity_mut(&mut self) -> Option<&mut Entity> {
        self.entity.as_mut()
    }

    /// Replaces the attached entity and refreshes the target.
    pub fn attach_entity(&mut self, entity: Entity) {
        let field_name = self
            .target
            .as_ref()
            .map(|target| target.field_name.clone())
            .unwrap_or_default();
        self.target = Some(TransitionTarget::of(&entity, &field_name));
        self.entity = Some(entity);
    }

    /// Returns the field name, empty when unknown.
    #[must_use]
    pub fn field_name(&self) -> &str {
        self.target
            .as_ref()
            .map_or("", |target| target.field_name.as_str())
    }

    /// Returns the entity ID, once known.
    #[must_use]
    pub fn entity_id(&self) -> Option<&EntityId> {
        self.target.as_ref().and_then(|t| t.entity_id.as_ref())
    }

    /// Returns the slot this transition applies to.
    #[must_use]
    pub fn slot(&self) -> Option<FieldSlot> {
        self.target.as_ref().and_then(TransitionTarget::slot)
    }

    /// Returns true if from and to differ.
    #[must_use]
    pub fn has_state_change(&self) -> bool {
        self.from_sid != self.to_sid
    }

    /// Returns true if a comment is attached.
    #[must_use]
    pub fn has_comment(&self) -> bool {
        !self.comment.is_empty()
    }

    /// Returns the rejection reason of a Rejected transition.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        self.rejection.as_ref()
    }

    /// Returns true if the transition was declined.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.phase == TransitionPhase::Rejected
    }

    /// Moves to a non-rejected phase.
    pub(crate) fn advance(&mut self, phase: TransitionPhase) {
        self.phase = phase;
    }

    /// Moves to Rejected and records why.
    pub(crate) fn reject(&mut self, rejection: Rejection) {
        self.phase = TransitionPhase::Rejected;
        self.rejection = Some(rejection);
    }

    /// Resolved state to write to the entity: from while still pending,
    /// to once executed.
    #[must_use]
    pub fn resolved_sid(&self) -> &StateId {
        if self.scheduled && !self.executed {
            &self.from_sid
        } else {
            &self.to_sid
        }
    }
}

/// One entry of a state option list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOption {
    /// Target state.
    pub state_id: StateId,
    /// Target state label.
    pub label: String,
}
