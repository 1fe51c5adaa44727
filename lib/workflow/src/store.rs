//! Collaborator store traits.
//!
//! The engine never touches a database directly. Every persistence concern
//! is one of these traits, implemented by the host. In-memory implementations
//! live in `crate::memory`.

use crate::config_transition::ConfigTransition;
use crate::definition::WorkflowConfig;
use crate::entity::{Entity, FieldSlot};
use crate::history::{HistoryEntry, HistoryQuery};
use crate::state::State;
use crate::transition::Transition;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeflow_access::RoleSet;
use nodeflow_core::{EntityId, EntityType, Result, StateId, StoreError, WorkflowId};

/// Workflow, state and configured-transition storage.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Loads a workflow configuration.
    async fn workflow(&self, id: &WorkflowId) -> Result<Option<WorkflowConfig>, StoreError>;

    /// Lists every workflow configuration.
    async fn workflows(&self) -> Result<Vec<WorkflowConfig>, StoreError>;

    /// Inserts or replaces a workflow configuration.
    async fn save_workflow(&self, config: &WorkflowConfig) -> Result<(), StoreError>;

    /// Lists the states of a workflow, active or not.
    async fn states(&self, workflow_id: &WorkflowId) -> Result<Vec<State>, StoreError>;

    /// Loads a state.
    async fn state(&self, id: &StateId) -> Result<Option<State>, StoreError>;

    /// Inserts or replaces a state.
    async fn save_state(&self, state: &State) -> Result<(), StoreError>;

    /// Lists the configured transitions of a workflow in store order.
    async fn transitions(&self, workflow_id: &WorkflowId)
    -> Result<Vec<ConfigTransition>, StoreError>;

    /// Lists the configured transitions leaving `from` in store order.
    async fn transitions_from(&self, from: &StateId) -> Result<Vec<ConfigTransition>, StoreError>;

    /// Inserts a configured transition and assigns its ID.
    async fn insert_transition(
        &self,
        workflow_id: &WorkflowId,
        from: &StateId,
        to: &StateId,
        roles: RoleSet,
    ) -> Result<ConfigTransition, StoreError>;

    /// Replaces a configured transition.
    async fn update_transition(&self, transition: &ConfigTransition) -> Result<(), StoreError>;

    /// Deletes every configured transition from or to `state`.
    ///
    /// Returns the number of deleted transitions.
    async fn delete_transitions_for_state(&self, state: &StateId) -> Result<usize, StoreError>;
}

/// Host entity storage.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Loads an entity.
    async fn load(&self, entity_type: &EntityType, id: &EntityId)
    -> Result<Option<Entity>, StoreError>;

    /// Saves an entity, assigning an ID to a new one.
    ///
    /// Returns false if the host refused the save.
    async fn save(&self, entity: &mut Entity) -> Result<bool, StoreError>;

    /// Lists every entity field currently holding `state`.
    async fn entities_in_state(&self, state: &StateId) -> Result<Vec<FieldSlot>, StoreError>;
}

/// Append-only audit log.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends an executed transition and assigns the entry ID.
    async fn record(&self, transition: &Transition) -> Result<HistoryEntry, StoreError>;

    /// Runs a history query.
    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Returns the most recent entry of an entity field.
    async fn latest(&self, slot: &FieldSlot) -> Result<Option<HistoryEntry>, StoreError> {
        let query = HistoryQuery::new(slot.entity_type.clone())
            .entity(slot.entity_id.clone())
            .field(slot.field_name.clone())
            .limit(1);
        Ok(self.query(&query).await?.into_iter().next())
    }
}

/// Pending scheduled transitions, one per entity field.
#[async_trait]
pub trait ScheduledTransitionStore: Send + Sync {
    /// Stores a scheduled transition, replacing any earlier one for the
    /// same entity field.
    async fn save(&self, transition: &Transition) -> Result<(), StoreError>;

    /// Returns the pending transition of an entity field.
    async fn for_slot(&self, slot: &FieldSlot) -> Result<Option<Transition>, StoreError>;

    /// Lists transitions due strictly between `start` and `end`, earliest
    /// first.
    async fn due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transition>, StoreError>;

    /// Deletes the pending transition of an entity field.
    ///
    /// Returns false if there was none.
    async fn delete(&self, slot: &FieldSlot) -> Result<bool, StoreError>;
}
