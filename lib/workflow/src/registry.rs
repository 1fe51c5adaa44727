//! State registry: states per workflow and their lifecycle.

use crate::context::RequestContext;
use crate::definition::Workflow;
use crate::engine::{TransitionEngine, TransitionRequest};
use crate::error::{ConfigurationError, WorkflowError};
use crate::repository::ConfigTransitionRepository;
use crate::runtime::Runtime;
use crate::state::{State, StateMode};
use nodeflow_access::Account;
use nodeflow_core::{Result, StateId, WorkflowId, is_machine_name};
use rootcause::prelude::ResultExt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of a state deactivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deactivation {
    /// Entity fields moved to the replacement state.
    pub reassigned: usize,
    /// Entity fields whose workflow value was cleared.
    pub cleared: usize,
    /// Entity fields a forced transition could not move.
    pub failed: usize,
    /// Configured transitions removed with the state.
    pub transitions_removed: usize,
}

/// Loads and manages workflow states.
#[derive(Debug, Clone)]
pub struct StateRegistry {
    runtime: Arc<Runtime>,
}

impl StateRegistry {
    /// Creates a registry over `runtime`.
    #[must_use]
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }

    /// Loads a workflow with its states and configured transitions.
    ///
    /// The creation state is created on first access. Results are cached in
    /// `ctx`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::WorkflowNotFound` for an unknown workflow,
    /// `ConfigurationError::CreationStateCount` if the stored states hold
    /// more than one creation state, or a store error.
    #[instrument(skip(self, ctx), fields(workflow = %workflow_id))]
    pub async fn workflow(
        &self,
        ctx: &mut RequestContext,
        workflow_id: &WorkflowId,
    ) -> Result<Workflow, WorkflowError> {
        if let Some(workflow) = ctx.workflow(workflow_id) {
            return Ok(workflow.clone());
        }
        let config = self
            .runtime
            .config()
            .workflow(workflow_id)
            .await
            .context(WorkflowError::Store {
                operation: "load workflow",
            })?
            .ok_or_else(|| {
                WorkflowError::from(ConfigurationError::WorkflowNotFound {
                    workflow_id: workflow_id.clone(),
                })
            })?;

        let mut states = self
            .runtime
            .config()
            .states(workflow_id)
            .await
            .context(WorkflowError::Store {
                operation: "load states",
            })?;
        if !states.iter().any(State::is_creation) {
            let creation = State::creation(workflow_id.clone());
            self.runtime
                .config()
                .save_state(&creation)
                .await
                .context(WorkflowError::Store {
                    operation: "save creation state",
                })?;
            info!(state = %creation.id, "created creation state");
            states.push(creation);
        }

        let transitions = self
            .runtime
            .config()
            .transitions(workflow_id)
            .await
            .context(WorkflowError::Store {
                operation: "load config transitions",
            })?;

        let workflow = Workflow::new(config, states, transitions);
        if let Some(violation) = workflow.creation_state_violation() {
            error!(error = %violation, "workflow configuration is inconsistent");
            return Err(WorkflowError::from(violation).into());
        }
        ctx.cache_workflow(workflow.clone());
        Ok(workflow)
    }

    /// Returns the states of a workflow selected by `mode`, in display order.
    ///
    /// # Errors
    ///
    /// Same as [`StateRegistry::workflow`].
    pub async fn get_states(
        &self,
        ctx: &mut RequestContext,
        workflow_id: &WorkflowId,
        mode: StateMode,
    ) -> Result<Vec<State>, WorkflowError> {
        let workflow = self.workflow(ctx, workflow_id).await?;
        Ok(workflow.states(mode).cloned().collect())
    }

    /// Returns the creation state of a workflow, creating it if absent.
    ///
    /// # Errors
    ///
    /// Same as [`StateRegistry::workflow`].
    pub async fn get_creation_state(
        &self,
        ctx: &mut RequestContext,
        workflow_id: &WorkflowId,
    ) -> Result<State, WorkflowError> {
        let workflow = self.workflow(ctx, workflow_id).await?;
        workflow.creation_state().cloned().ok_or_else(|| {
            WorkflowError::from(ConfigurationError::CreationStateCount {
                workflow_id: workflow_id.clone(),
                count: 0,
            })
            .into()
        })
    }

    /// Loads a single state.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn state(&self, state_id: &StateId) -> Result<Option<State>, WorkflowError> {
        self.runtime
            .config()
            .state(state_id)
            .await
            .context(WorkflowError::Store {
                operation: "load state",
            })
    }

    /// Loads a single state, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::StateNotFound`, or a store error.
    pub async fn require_state(&self, state_id: &StateId) -> Result<State, WorkflowError> {
        self.state(state_id).await?.ok_or_else(|| {
            WorkflowError::from(ConfigurationError::StateNotFound {
                state_id: state_id.clone(),
            })
            .into()
        })
    }

    /// Creates an active state in a workflow.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the ID is not a machine name, is
    /// already taken or the workflow does not exist.
    #[instrument(skip(self, ctx, label), fields(workflow = %workflow_id, state = %state_id))]
    pub async fn create_state(
        &self,
        ctx: &mut RequestContext,
        workflow_id: &WorkflowId,
        state_id: StateId,
        label: impl Into<String> + Send,
        weight: i32,
    ) -> Result<State, WorkflowError> {
        if !is_machine_name(state_id.as_str()) {
            return Err(WorkflowError::from(ConfigurationError::InvalidMachineName {
                value: state_id.to_string(),
            })
            .into());
        }
        // Loading also guarantees the creation state exists.
        self.workflow(ctx, workflow_id).await?;
        if self.state(&state_id).await?.is_some() {
            return Err(WorkflowError::from(ConfigurationError::DuplicateState { state_id }).into());
        }

        let state = State::new(state_id, workflow_id.clone(), label).with_weight(weight);
        self.runtime
            .config()
            .save_state(&state)
            .await
            .context(WorkflowError::Store {
                operation: "save state",
            })?;
        ctx.invalidate_workflow(workflow_id);
        self.workflow(ctx, workflow_id).await?;
        debug!("state created");
        Ok(state)
    }

    /// Counts the entity fields currently in a state.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn entity_count(&self, state_id: &StateId) -> Result<usize, WorkflowError> {
        let slots = self
            .runtime
            .entities()
            .entities_in_state(state_id)
            .await
            .context(WorkflowError::Store {
                operation: "count entities in state",
            })?;
        Ok(slots.len())
    }

    /// Deactivates a state.
    ///
    /// Content in the state is moved to `replacement` by a forced transition
    /// per entity field, acting as `account`. Without a replacement the
    /// field is cleared and nothing is recorded. Every configured transition
    /// touching the state is removed, and the state is marked inactive.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the state is unknown or is the
    /// creation state, or if the replacement is not another active state of
    /// the same workflow.
    #[instrument(skip(self, ctx, account), fields(state = %state_id))]
    pub async fn deactivate(
        &self,
        ctx: &mut RequestContext,
        state_id: &StateId,
        replacement: Option<&StateId>,
        account: &Account,
    ) -> Result<Deactivation, WorkflowError> {
        let mut state = self.require_state(state_id).await?;
        if state.is_creation() {
            return Err(WorkflowError::from(ConfigurationError::CreationStateImmutable {
                state_id: state_id.clone(),
            })
            .into());
        }
        if let Some(replacement_id) = replacement {
            let usable = match self.state(replacement_id).await? {
                Some(candidate) => {
                    candidate.id != state.id
                        && candidate.workflow_id == state.workflow_id
                        && candidate.is_active()
                }
                None => false,
            };
            if !usable {
                return Err(WorkflowError::from(ConfigurationError::InvalidReplacement {
                    state_id: state_id.clone(),
                    replacement: replacement_id.clone(),
                })
                .into());
            }
        }

        let mut report = Deactivation::default();
        let slots = self
            .runtime
            .entities()
            .entities_in_state(state_id)
            .await
            .context(WorkflowError::Store {
                operation: "list entities in state",
            })?;
        let engine = TransitionEngine::new(Arc::clone(&self.runtime));

        for slot in slots {
            let Some(mut entity) = self
                .runtime
                .entities()
                .load(&slot.entity_type, &slot.entity_id)
                .await
                .context(WorkflowError::Store {
                    operation: "load entity",
                })?
            else {
                continue;
            };

            let Some(replacement_id) = replacement else {
                self.runtime
                    .accessor(&slot.entity_type)
                    .set(&mut entity, &slot.field_name, None);
                self.runtime
                    .entities()
                    .save(&mut entity)
                    .await
                    .context(WorkflowError::Store {
                        operation: "save entity",
                    })?;
                report.cleared += 1;
                continue;
            };

            let request = TransitionRequest::new(account.id())
                .entity(entity)
                .field(slot.field_name.clone())
                .from(state_id.clone())
                .to(replacement_id.clone())
                .force(true);
            let mut transition = engine.create(ctx, request).await?;
            let result = engine.apply(ctx, &mut transition, account, true).await?;
            if &result == replacement_id {
                report.reassigned += 1;
            } else {
                warn!(
                    %slot,
                    rejection = ?transition.rejection(),
                    "could not move content out of deactivated state"
                );
                report.failed += 1;
            }
        }

        report.transitions_removed = ConfigTransitionRepository::new(Arc::clone(&self.runtime))
            .delete_for_state(ctx, &state)
            .await?;

        state.active = false;
        self.runtime
            .config()
            .save_state(&state)
            .await
            .context(WorkflowError::Store {
                operation: "save state",
            })?;
        ctx.invalidate_workflow(&state.workflow_id);
        self.workflow(ctx, &state.workflow_id).await?;

        info!(
            reassigned = report.reassigned,
            cleared = report.cleared,
            failed = report.failed,
            transitions_removed = report.transitions_removed,
            "state deactivated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowConfig;
    use crate::fixture::{editor, editorial, writer};
    use crate::state::CREATION_STATE_LABEL;
    use crate::store::ConfigStore;
    use nodeflow_core::UserId;

    #[tokio::test]
    async fn workflow_gets_a_creation_state_on_first_load() {
        let ed = editorial().await;
        let registry = StateRegistry::new(Arc::clone(&ed.runtime));
        let mut ctx = RequestContext::new();

        let creation = registry
            .get_creation_state(&mut ctx, &ed.workflow_id)
            .await
            .unwrap();
        assert_eq!(creation.id, ed.creation);
        assert_eq!(creation.label, CREATION_STATE_LABEL);

        let all: Vec<StateId> = registry
            .get_states(&mut ctx, &ed.workflow_id, StateMode::All)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(
            all,
            vec![
                ed.creation.clone(),
                ed.draft.clone(),
                ed.review.clone(),
                ed.published.clone()
            ]
        );

        let active = registry
            .get_states(&mut ctx, &ed.workflow_id, StateMode::ActiveOnly)
            .await
            .unwrap();
        assert_eq!(active.len(), 3);
    }

    #[tokio::test]
    async fn second_creation_state_is_refused_on_load() {
        let ed = editorial().await;
        let support = WorkflowId::new("support");
        ed.stores
            .config
            .save_workflow(&WorkflowConfig::new(support.clone(), "Support"))
            .await
            .unwrap();
        for id in ["new", "triage"] {
            let state = State {
                creation: true,
                ..State::new(StateId::new(id), support.clone(), id)
            };
            ed.stores.config.save_state(&state).await.unwrap();
        }
        let registry = StateRegistry::new(Arc::clone(&ed.runtime));
        let mut ctx = RequestContext::new();

        let err = registry.workflow(&mut ctx, &support).await.unwrap_err();
        assert!(format!("{err}").contains("workflow support has 2 creation states"));

        let err = registry
            .create_state(&mut ctx, &support, StateId::new("closed"), "Closed", 5)
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("has 2 creation states"));
        assert!(
            ed.stores
                .config
                .state(&StateId::new("closed"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn saves_keep_exactly_one_creation_state() {
        let ed = editorial().await;
        let registry = StateRegistry::new(Arc::clone(&ed.runtime));
        let mut ctx = RequestContext::new();

        registry
            .create_state(
                &mut ctx,
                &ed.workflow_id,
                StateId::new("archived"),
                "Archived",
                9,
            )
            .await
            .unwrap();
        let workflow = registry.workflow(&mut ctx, &ed.workflow_id).await.unwrap();
        assert!(workflow.validate().is_ok());

        let root = Account::new(UserId::new(), "root").superuser();
        registry
            .deactivate(&mut ctx, &StateId::new("archived"), None, &root)
            .await
            .unwrap();
        let workflow = registry.workflow(&mut ctx, &ed.workflow_id).await.unwrap();
        assert!(workflow.validate().is_ok());
        assert_eq!(
            workflow.creation_state().map(|s| s.id.clone()),
            Some(ed.creation.clone())
        );
    }

    #[tokio::test]
    async fn unknown_workflow_is_a_configuration_error() {
        let ed = editorial().await;
        let registry = StateRegistry::new(Arc::clone(&ed.runtime));
        let mut ctx = RequestContext::new();
        let err = registry
            .workflow(&mut ctx, &WorkflowId::new("support"))
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("workflow not found: support"));
    }

    #[tokio::test]
    async fn create_state_checks_the_id() {
        let ed = editorial().await;
        let registry = StateRegistry::new(Arc::clone(&ed.runtime));
        let mut ctx = RequestContext::new();

        let err = registry
            .create_state(
                &mut ctx,
                &ed.workflow_id,
                StateId::new("Needs Work"),
                "Needs work",
                3,
            )
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("not a valid machine name"));

        let err = registry
            .create_state(&mut ctx, &ed.workflow_id, ed.review.clone(), "Review", 3)
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("state already exists: review"));
    }

    #[tokio::test]
    async fn create_state_refreshes_the_cached_workflow() {
        let ed = editorial().await;
        let registry = StateRegistry::new(Arc::clone(&ed.runtime));
        let mut ctx = RequestContext::new();
        registry.workflow(&mut ctx, &ed.workflow_id).await.unwrap();

        registry
            .create_state(
                &mut ctx,
                &ed.workflow_id,
                StateId::new("archived"),
                "Archived",
                9,
            )
            .await
            .unwrap();
        let states = registry
            .get_states(&mut ctx, &ed.workflow_id, StateMode::ActiveOnly)
            .await
            .unwrap();
        assert_eq!(states.last().map(|s| s.id.as_str()), Some("archived"));
    }

    #[tokio::test]
    async fn deactivation_moves_content_to_the_replacement() {
        let ed = editorial().await;
        let registry = StateRegistry::new(Arc::clone(&ed.runtime));
        let first = ed.article(UserId::new(), &ed.review).await;
        let second = ed.article(UserId::new(), &ed.review).await;
        let untouched = ed.article(UserId::new(), &ed.published).await;
        let mut ctx = RequestContext::new();

        let report = registry
            .deactivate(&mut ctx, &ed.review, Some(&ed.draft), &editor())
            .await
            .unwrap();
        assert_eq!(
            report,
            Deactivation {
                reassigned: 2,
                cleared: 0,
                failed: 0,
                transitions_removed: 2,
            }
        );
        assert_eq!(ed.state_of(&first).await, Some(ed.draft.clone()));
        assert_eq!(ed.state_of(&second).await, Some(ed.draft.clone()));
        assert_eq!(ed.state_of(&untouched).await, Some(ed.published.clone()));
        assert_eq!(ed.stores.history.len().await, 2);

        let review = registry.require_state(&ed.review).await.unwrap();
        assert!(!review.is_active());
        let workflow = registry.workflow(&mut ctx, &ed.workflow_id).await.unwrap();
        assert!(workflow.transition(&ed.draft, &ed.review).is_none());
        assert_eq!(registry.entity_count(&ed.review).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deactivation_without_replacement_clears_the_field() {
        let ed = editorial().await;
        let registry = StateRegistry::new(Arc::clone(&ed.runtime));
        let article = ed.article(UserId::new(), &ed.published).await;
        let mut ctx = RequestContext::new();

        let report = registry
            .deactivate(&mut ctx, &ed.published, None, &editor())
            .await
            .unwrap();
        assert_eq!(report.cleared, 1);
        assert_eq!(ed.state_of(&article).await, None);
        assert!(ed.stores.history.is_empty().await);
    }

    #[tokio::test]
    async fn deactivation_guards() {
        let ed = editorial().await;
        let registry = StateRegistry::new(Arc::clone(&ed.runtime));
        let mut ctx = RequestContext::new();
        let account = writer();

        let err = registry
            .deactivate(&mut ctx, &ed.creation, None, &account)
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("cannot be deactivated"));

        for replacement in [&ed.review, &StateId::new("missing")] {
            let err = registry
                .deactivate(&mut ctx, &ed.review, Some(replacement), &account)
                .await
                .unwrap_err();
            assert!(format!("{err}").contains("cannot replace review"));
        }
    }
}
