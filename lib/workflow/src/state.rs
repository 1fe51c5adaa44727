//! Workflow states.
//!
//! Every workflow owns an ordered list of states. Exactly one of them is the
//! creation state: the synthetic "not yet assigned" state every new entity
//! starts from. States are never hard-deleted while content may reference
//! them; they are deactivated instead.

use nodeflow_core::{StateId, WorkflowId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Label given to every creation state.
pub const CREATION_STATE_LABEL: &str = "(creation)";

/// Weight given to every creation state, so it sorts first.
pub const CREATION_STATE_WEIGHT: i32 = -50;

/// Returns the id of a workflow's creation state.
#[must_use]
pub fn creation_state_id(workflow_id: &WorkflowId) -> StateId {
    StateId::new(format!("{workflow_id}_creation"))
}

/// A state in a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Unique state ID.
    pub id: StateId,
    /// The owning workflow.
    pub workflow_id: WorkflowId,
    /// Human-readable label.
    pub label: String,
    /// Sort order; lower weights come first.
    pub weight: i32,
    /// Inactive states are kept for history but offered nowhere.
    pub active: bool,
    /// Marks the creation state.
    pub creation: bool,
}

impl State {
    /// Creates an active, non-creation state with weight 0.
    #[must_use]
    pub fn new(id: StateId, workflow_id: WorkflowId, label: impl Into<String>) -> Self {
        Self {
            id,
            workflow_id,
            label: label.into(),
            weight: 0,
            active: true,
            creation: false,
        }
    }

    /// Creates the creation state of a workflow.
    #[must_use]
    pub fn creation(workflow_id: WorkflowId) -> Self {
        Self {
            id: creation_state_id(&workflow_id),
            workflow_id,
            label: CREATION_STATE_LABEL.to_string(),
            weight: CREATION_STATE_WEIGHT,
            active: true,
            creation: true,
        }
    }

    /// Sets the weight.
    #[must_use]
    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    /// Returns true if the state is the creation state.
    #[must_use]
    pub fn is_creation(&self) -> bool {
        self.creation
    }

    /// Returns true if the state is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Orders states by weight, then by id.
    #[must_use]
    pub fn display_order(&self, other: &State) -> Ordering {
        self.weight
            .cmp(&other.weight)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Which states a lookup returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMode {
    /// Every state, active or not.
    All,
    /// Active states other than the creation state.
    #[default]
    ActiveOnly,
    /// Active states including the creation state.
    ActivePlusCreation,
}

impl StateMode {
    /// Returns true if `state` is included in this mode.
    #[must_use]
    pub fn admits(&self, state: &State) -> bool {
        match self {
            Self::All => true,
            Self::ActiveOnly => state.active && !state.creation,
            Self::ActivePlusCreation => state.active,
        }
    }
}

/// Sorts states into display order.
pub fn sort_states(states: &mut [State]) {
    states.sort_by(State::display_order);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editorial() -> WorkflowId {
        WorkflowId::new("editorial")
    }

    #[test]
    fn creation_state_shape() {
        let state = State::creation(editorial());
        assert_eq!(state.id.as_str(), "editorial_creation");
        assert_eq!(state.label, CREATION_STATE_LABEL);
        assert_eq!(state.weight, CREATION_STATE_WEIGHT);
        assert!(state.is_creation());
        assert!(state.is_active());
    }

    #[test]
    fn modes_filter_states() {
        let creation = State::creation(editorial());
        let draft = State::new(StateId::new("draft"), editorial(), "Draft");
        let mut archived = State::new(StateId::new("archived"), editorial(), "Archived");
        archived.active = false;

        assert!(StateMode::All.admits(&archived));
        assert!(!StateMode::ActiveOnly.admits(&archived));
        assert!(!StateMode::ActiveOnly.admits(&creation));
        assert!(StateMode::ActiveOnly.admits(&draft));
        assert!(StateMode::ActivePlusCreation.admits(&creation));
        assert!(!StateMode::ActivePlusCreation.admits(&archived));
    }

    #[test]
    fn states_sort_by_weight_then_id() {
        let mut states = vec![
            State::new(StateId::new("published"), editorial(), "Published").with_weight(10),
            State::new(StateId::new("review"), editorial(), "Review"),
            State::new(StateId::new("draft"), editorial(), "Draft"),
            State::creation(editorial()),
        ];
        sort_states(&mut states);
        let ids: Vec<_> = states.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["editorial_creation", "draft", "review", "published"]);
    }
}
