//! Workflow definition types.
//!
//! A workflow is a named state machine that consists of:
//! - Configuration (label and option bag)
//! - An ordered list of states, exactly one of them the creation state
//! - The configured transitions between those states

use crate::config_transition::ConfigTransition;
use crate::error::ConfigurationError;
use crate::state::{State, StateMode, sort_states};
use nodeflow_core::{StateId, WorkflowId};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};

/// Whether the transition form asks for a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentVisibility {
    /// No comment field.
    Hidden,
    /// Comment is optional.
    #[default]
    Optional,
    /// Comment is required.
    Required,
}

/// How the state options are presented to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
    /// Radio buttons.
    #[default]
    Radios,
    /// Drop-down list.
    Select,
    /// One button per target state.
    Buttons,
}

/// The workflow option bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Comment field visibility.
    #[serde(default)]
    pub comment_visibility: CommentVisibility,
    /// Whether transitions may be scheduled for later.
    #[serde(default = "default_true")]
    pub schedule_enabled: bool,
    /// Emit an operational log line for every executed transition.
    #[serde(default = "default_true")]
    pub watchdog_log: bool,
    /// Option widget style.
    #[serde(default)]
    pub widget: Widget,
}

fn default_true() -> bool {
    true
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            comment_visibility: CommentVisibility::default(),
            schedule_enabled: true,
            watchdog_log: true,
            widget: Widget::default(),
        }
    }
}

/// Stored configuration of a workflow, without its states and transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Machine name.
    pub id: WorkflowId,
    /// Human-readable label.
    pub label: String,
    /// Option bag.
    #[serde(default)]
    pub options: WorkflowOptions,
}

impl WorkflowConfig {
    /// Creates a workflow configuration with default options.
    #[must_use]
    pub fn new(id: WorkflowId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            options: WorkflowOptions::default(),
        }
    }

    /// Replaces the option bag.
    #[must_use]
    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    /// Enables or disables scheduling.
    #[must_use]
    pub fn with_scheduling(mut self, enabled: bool) -> Self {
        self.options.schedule_enabled = enabled;
        self
    }

    /// Enables or disables the watchdog log.
    #[must_use]
    pub fn with_watchdog(mut self, enabled: bool) -> Self {
        self.options.watchdog_log = enabled;
        self
    }
}

/// A workflow with its states and configured transitions loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Stored configuration.
    pub config: WorkflowConfig,
    /// States in display order.
    states: Vec<State>,
    /// Configured transitions in store order.
    transitions: Vec<ConfigTransition>,
}

impl Workflow {
    /// Assembles a workflow. States are put into display order.
    #[must_use]
    pub fn new(
        config: WorkflowConfig,
        mut states: Vec<State>,
        transitions: Vec<ConfigTransition>,
    ) -> Self {
        sort_states(&mut states);
        Self {
            config,
            states,
            transitions,
        }
    }

    /// Returns the workflow ID.
    #[must_use]
    pub fn id(&self) -> &WorkflowId {
        &self.config.id
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// Returns the option bag.
    #[must_use]
    pub fn options(&self) -> &WorkflowOptions {
        &self.config.options
    }

    /// Returns the states selected by `mode`, in display order.
    pub fn states(&self, mode: StateMode) -> impl Iterator<Item = &State> {
        self.states.iter().filter(move |state| mode.admits(state))
    }

    /// Looks up a state by ID.
    #[must_use]
    pub fn state(&self, id: &StateId) -> Option<&State> {
        self.states.iter().find(|state| &state.id == id)
    }

    /// Returns the creation state, if the workflow has one.
    #[must_use]
    pub fn creation_state(&self) -> Option<&State> {
        self.states.iter().find(|state| state.creation)
    }

    /// Returns all configured transitions.
    #[must_use]
    pub fn transitions(&self) -> &[ConfigTransition] {
        &self.transitions
    }

    /// Returns the first configured transition from `from` to `to`.
    #[must_use]
    pub fn transition(&self, from: &StateId, to: &StateId) -> Option<&ConfigTransition> {
        self.transitions.iter().find(|t| t.connects(from, to))
    }

    /// Checks the creation-state invariant.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::CreationStateCount` unless exactly one
    /// state is marked as the creation state.
    pub fn validate(&self) -> Result<(), Report<ConfigurationError>> {
        match self.creation_state_violation() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    pub(crate) fn creation_state_violation(&self) -> Option<ConfigurationError> {
        let count = self.states.iter().filter(|state| state.creation).count();
        (count != 1).then(|| ConfigurationError::CreationStateCount {
            workflow_id: self.config.id.clone(),
            count,
        })
    }

    /// Returns true if content can actually enter this workflow.
    ///
    /// That requires a valid creation state, at least one other active state
    /// and at least one transition out of creation open to the AUTHOR role.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        if self.validate().is_err() {
            return false;
        }
        let Some(creation) = self.creation_state() else {
            return false;
        };
        let has_target = self.states(StateMode::ActiveOnly).next().is_some();
        let author_can_leave = self
            .transitions
            .iter()
            .any(|t| t.from == creation.id && !t.is_self() && t.roles.has_author());
        has_target && author_can_leave
    }
}
