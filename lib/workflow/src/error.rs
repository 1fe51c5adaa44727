//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ConfigurationError`: invalid or missing workflow/state configuration.
//!   Fatal; surfaced to site builders and never retried.
//! - `ValidationError`: a transition request that cannot be built.
//!   Rejected before any side effect.
//! - `Rejection`: why the engine declined to run a transition. Rejections
//!   are soft: they are logged and recorded on the transition, and the
//!   caller receives the unchanged from-state.
//! - `WorkflowError`: high-level wrapper used as `.context()` when lower
//!   errors (store, permission backend) propagate.

use nodeflow_core::{EntityType, StateId, UserId, WorkflowId};
use std::fmt;

/// Errors in workflow configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Workflow with the given ID does not exist.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// State with the given ID does not exist.
    StateNotFound { state_id: StateId },
    /// A state with this ID already exists.
    DuplicateState { state_id: StateId },
    /// The identifier is not a valid machine name.
    InvalidMachineName { value: String },
    /// The creation state cannot be deactivated.
    CreationStateImmutable { state_id: StateId },
    /// The replacement for a deactivated state is unusable.
    InvalidReplacement {
        state_id: StateId,
        replacement: StateId,
    },
    /// The state belongs to another workflow.
    ForeignState {
        state_id: StateId,
        workflow_id: WorkflowId,
    },
    /// A workflow has more or fewer than one creation state.
    CreationStateCount { workflow_id: WorkflowId, count: usize },
    /// No workflow is attached to this entity field.
    FieldNotBound {
        entity_type: EntityType,
        field_name: String,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::StateNotFound { state_id } => write!(f, "state not found: {state_id}"),
            Self::DuplicateState { state_id } => {
                write!(f, "state already exists: {state_id}")
            }
            Self::InvalidMachineName { value } => {
                write!(f, "'{value}' is not a valid machine name")
            }
            Self::CreationStateImmutable { state_id } => {
                write!(f, "creation state {state_id} cannot be deactivated")
            }
            Self::InvalidReplacement {
                state_id,
                replacement,
            } => {
                write!(
                    f,
                    "state {replacement} cannot replace {state_id}: it must be another active state of the same workflow"
                )
            }
            Self::ForeignState {
                state_id,
                workflow_id,
            } => {
                write!(f, "state {state_id} does not belong to workflow {workflow_id}")
            }
            Self::CreationStateCount { workflow_id, count } => {
                write!(
                    f,
                    "workflow {workflow_id} has {count} creation states, expected exactly one"
                )
            }
            Self::FieldNotBound {
                entity_type,
                field_name,
            } => {
                write!(f, "no workflow attached to {entity_type}.{field_name}")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Errors building a transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither an entity nor any state was supplied.
    AmbiguousConstruction,
    /// The transition is scheduled but the workflow does not allow scheduling.
    SchedulingDisabled { workflow_id: WorkflowId },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousConstruction => {
                write!(f, "a transition needs an entity or a from/to state")
            }
            Self::SchedulingDisabled { workflow_id } => {
                write!(f, "workflow {workflow_id} does not allow scheduled transitions")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Why the engine declined to run a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The transition failed validation.
    Invalid { reason: String },
    /// The acting user may not take this edge.
    NotAuthorized {
        actor: UserId,
        from: StateId,
        to: StateId,
    },
    /// An observer vetoed the transition.
    Vetoed { observer: String, reason: String },
    /// The entity is no longer in the transition's from-state.
    Conflict {
        expected: StateId,
        actual: Option<StateId>,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { reason } => write!(f, "invalid transition: {reason}"),
            Self::NotAuthorized { actor, from, to } => {
                write!(f, "user {actor} is not allowed to move content from {from} to {to}")
            }
            Self::Vetoed { observer, reason } => {
                write!(f, "transition vetoed by {observer}: {reason}")
            }
            Self::Conflict { expected, actual } => match actual {
                Some(actual) => {
                    write!(f, "content moved to {actual} while expected in {expected}")
                }
                None => write!(f, "content has no state while expected in {expected}"),
            },
        }
    }
}

impl std::error::Error for Rejection {}

/// High-level workflow errors.
///
/// Use these to add workflow context when wrapping lower-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Configuration is invalid.
    Configuration(ConfigurationError),
    /// A transition request is malformed.
    Validation(ValidationError),
    /// A store operation failed (use as context wrapper).
    Store { operation: &'static str },
    /// The permission backend failed (use as context wrapper).
    Permission { operation: &'static str },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration error: {e}"),
            Self::Validation(e) => write!(f, "validation error: {e}"),
            Self::Store { operation } => write!(f, "store operation failed: {operation}"),
            Self::Permission { operation } => {
                write!(f, "permission check failed: {operation}")
            }
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<ConfigurationError> for WorkflowError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<ValidationError> for WorkflowError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_display() {
        let err = ConfigurationError::WorkflowNotFound {
            workflow_id: WorkflowId::new("editorial"),
        };
        assert!(err.to_string().contains("workflow not found: editorial"));
    }

    #[test]
    fn replacement_error_names_both_states() {
        let err = ConfigurationError::InvalidReplacement {
            state_id: StateId::new("review"),
            replacement: StateId::new("review"),
        };
        assert!(err.to_string().contains("cannot replace review"));
    }

    #[test]
    fn rejection_display() {
        let err = Rejection::NotAuthorized {
            actor: UserId::new(),
            from: StateId::new("review"),
            to: StateId::new("published"),
        };
        assert!(err.to_string().contains("from review to published"));

        let err = Rejection::Conflict {
            expected: StateId::new("draft"),
            actual: None,
        };
        assert!(err.to_string().contains("no state"));
    }

    #[test]
    fn workflow_error_wraps_lower_errors() {
        let err = WorkflowError::from(ValidationError::AmbiguousConstruction);
        assert!(err.to_string().starts_with("validation error"));

        let err = WorkflowError::Store {
            operation: "load entity",
        };
        assert!(err.to_string().contains("load entity"));
    }
}
