//! Workflow aggregate: which states a user may move content to.

use crate::context::{OptionKey, RequestContext};
use crate::entity::Entity;
use crate::error::WorkflowError;
use crate::hooks::OptionScope;
use crate::registry::StateRegistry;
use crate::repository::ConfigTransitionRepository;
use crate::runtime::Runtime;
use crate::state::StateMode;
use crate::transition::TransitionOption;
use nodeflow_access::{Account, RoleFilter};
use nodeflow_core::{Result, StateId};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Resolves state options for users.
#[derive(Debug, Clone)]
pub struct WorkflowAggregate {
    runtime: Arc<Runtime>,
    registry: StateRegistry,
    repository: ConfigTransitionRepository,
}

impl WorkflowAggregate {
    /// Creates an aggregate over `runtime`.
    #[must_use]
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            registry: StateRegistry::new(Arc::clone(&runtime)),
            repository: ConfigTransitionRepository::new(Arc::clone(&runtime)),
            runtime,
        }
    }

    /// Returns the role filter `account` is evaluated with for `entity`.
    ///
    /// Forced evaluation and the superuser bypass roles entirely. Otherwise
    /// the AUTHOR pseudo-role is granted for new content and for content the
    /// user owns.
    #[must_use]
    pub fn role_filter(account: &Account, entity: Option<&Entity>, force: bool) -> RoleFilter {
        if force || account.is_superuser() {
            return RoleFilter::All;
        }
        let filter = account.role_filter();
        match entity {
            None => filter.with_author(),
            Some(entity) if entity.is_new() || entity.is_owned_by(account.id()) => {
                filter.with_author()
            }
            Some(_) => filter,
        }
    }

    /// Returns the states `account` may move the field to from `from`.
    ///
    /// Options follow the workflow's state order. The current state is
    /// offered as a no-op unless it is the creation state. Results are
    /// cached in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::StateNotFound` if `from` is unknown, or a
    /// store error.
    #[instrument(skip(self, ctx, entity, account), fields(from = %from, user = %account.id()))]
    pub async fn get_options(
        &self,
        ctx: &mut RequestContext,
        from: &StateId,
        entity: Option<&Entity>,
        field_name: &str,
        account: &Account,
        force: bool,
    ) -> Result<Vec<TransitionOption>, WorkflowError> {
        let key = OptionKey::new(
            entity.and_then(|e| e.id.as_ref()),
            field_name,
            account.id(),
            force,
            from,
        );
        if let Some(options) = ctx.options(&key) {
            return Ok(options.clone());
        }

        let current = self.registry.require_state(from).await?;
        let workflow = self.registry.workflow(ctx, &current.workflow_id).await?;

        let filter = Self::role_filter(account, entity, force);
        let candidates = self.repository.get_transitions_from(from, &filter).await?;
        let scope = OptionScope {
            from,
            entity,
            field_name,
            account,
            force,
        };
        let permitted = self.runtime.hooks().permitted(candidates, &scope);

        let options: Vec<TransitionOption> = workflow
            .states(StateMode::All)
            .filter(|state| {
                if state.id == current.id {
                    !state.is_creation()
                } else {
                    state.is_active()
                        && !state.is_creation()
                        && permitted.iter().any(|t| t.to == state.id)
                }
            })
            .map(|state| TransitionOption {
                state_id: state.id.clone(),
                label: state.label.clone(),
            })
            .collect();

        debug!(count = options.len(), "state options resolved");
        ctx.cache_options(key, options.clone());
        Ok(options)
    }

    /// Returns the first state new content in `field_name` may enter.
    ///
    /// Returns `None`, and logs, when the creation state has no usable
    /// transition for this user.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::FieldNotBound` if no workflow is attached
    /// to the field, or a store error.
    pub async fn get_first_available_state_id(
        &self,
        ctx: &mut RequestContext,
        entity: &Entity,
        field_name: &str,
        account: &Account,
        force: bool,
    ) -> Result<Option<StateId>, WorkflowError> {
        let workflow_id = self
            .runtime
            .bound_workflow(&entity.entity_type, field_name)?;
        let creation = self.registry.get_creation_state(ctx, &workflow_id).await?;
        let options = self
            .get_options(ctx, &creation.id, Some(entity), field_name, account, force)
            .await?;
        let first = options.into_iter().next().map(|option| option.state_id);
        if first.is_none() {
            error!(
                workflow = %workflow_id,
                user = %account.id(),
                "no transition out of the creation state is available; check the workflow configuration"
            );
        }
        Ok(first)
    }
}
