//! Configured transition repository: the from → to matrix and its roles.

use crate::config_transition::ConfigTransition;
use crate::context::RequestContext;
use crate::error::{ConfigurationError, WorkflowError};
use crate::runtime::Runtime;
use crate::state::State;
use nodeflow_access::{RoleFilter, RoleSet};
use nodeflow_core::{Result, StateId};
use rootcause::prelude::ResultExt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Reads and edits configured transitions.
#[derive(Debug, Clone)]
pub struct ConfigTransitionRepository {
    runtime: Arc<Runtime>,
}

impl ConfigTransitionRepository {
    /// Creates a repository over `runtime`.
    #[must_use]
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }

    /// Returns the edges leaving `from` that `filter` may take, in store order.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn get_transitions_from(
        &self,
        from: &StateId,
        filter: &RoleFilter,
    ) -> Result<Vec<ConfigTransition>, WorkflowError> {
        let transitions = self
            .runtime
            .config()
            .transitions_from(from)
            .await
            .context(WorkflowError::Store {
                operation: "load config transitions",
            })?;
        Ok(transitions
            .into_iter()
            .filter(|t| Self::is_allowed(t, filter))
            .collect())
    }

    /// Returns true if `filter` may take `transition`.
    ///
    /// `RoleFilter::All` and an empty role set both allow everything.
    #[must_use]
    pub fn is_allowed(transition: &ConfigTransition, filter: &RoleFilter) -> bool {
        transition.is_allowed(filter)
    }

    /// Returns the edge from `from` to `to`.
    ///
    /// Should several match, the first in store order wins.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn get(
        &self,
        from: &StateId,
        to: &StateId,
    ) -> Result<Option<ConfigTransition>, WorkflowError> {
        let transitions = self
            .runtime
            .config()
            .transitions_from(from)
            .await
            .context(WorkflowError::Store {
                operation: "load config transitions",
            })?;
        Ok(transitions.into_iter().find(|t| &t.to == to))
    }

    /// Returns the edge from `from` to `to`, creating it with no roles if
    /// it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if either state is unknown or they
    /// belong to different workflows, or a store error.
    #[instrument(skip(self, ctx), fields(from = %from, to = %to))]
    pub async fn create_or_get(
        &self,
        ctx: &mut RequestContext,
        from: &StateId,
        to: &StateId,
    ) -> Result<ConfigTransition, WorkflowError> {
        if let Some(existing) = self.get(from, to).await? {
            return Ok(existing);
        }
        let from_state = self.require_state(from).await?;
        let to_state = self.require_state(to).await?;
        if from_state.workflow_id != to_state.workflow_id {
            return Err(WorkflowError::from(ConfigurationError::ForeignState {
                state_id: to.clone(),
                workflow_id: from_state.workflow_id,
            })
            .into());
        }

        let created = self
            .runtime
            .config()
            .insert_transition(&from_state.workflow_id, from, to, RoleSet::none())
            .await
            .context(WorkflowError::Store {
                operation: "insert config transition",
            })?;
        ctx.invalidate_workflow(&from_state.workflow_id);
        debug!(id = %created.id, "config transition created");
        Ok(created)
    }

    /// Sets the roles allowed to take the edge from `from` to `to`,
    /// creating the edge if needed.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigTransitionRepository::create_or_get`].
    pub async fn set_roles(
        &self,
        ctx: &mut RequestContext,
        from: &StateId,
        to: &StateId,
        roles: RoleSet,
    ) -> Result<ConfigTransition, WorkflowError> {
        let mut transition = self.create_or_get(ctx, from, to).await?;
        transition.roles = roles;
        self.runtime
            .config()
            .update_transition(&transition)
            .await
            .context(WorkflowError::Store {
                operation: "update config transition",
            })?;
        ctx.invalidate_workflow(&transition.workflow_id);
        Ok(transition)
    }

    /// Deletes every edge from or to `state`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn delete_for_state(
        &self,
        ctx: &mut RequestContext,
        state: &State,
    ) -> Result<usize, WorkflowError> {
        let removed = self
            .runtime
            .config()
            .delete_transitions_for_state(&state.id)
            .await
            .context(WorkflowError::Store {
                operation: "delete config transitions",
            })?;
        ctx.invalidate_workflow(&state.workflow_id);
        Ok(removed)
    }

    async fn require_state(&self, id: &StateId) -> Result<State, WorkflowError> {
        self.runtime
            .config()
            .state(id)
            .await
            .context(WorkflowError::Store {
                operation: "load state",
            })?
            .ok_or_else(|| {
                WorkflowError::from(ConfigurationError::StateNotFound {
                    state_id: id.clone(),
                })
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowConfig;
    use crate::fixture::{editorial, writer};
    use crate::registry::StateRegistry;
    use crate::store::ConfigStore;
    use nodeflow_access::Account;
    use nodeflow_core::{UserId, WorkflowId};

    #[tokio::test]
    async fn create_or_get_is_idempotent() {
        let ed = editorial().await;
        let repository = ConfigTransitionRepository::new(Arc::clone(&ed.runtime));
        let mut ctx = RequestContext::new();

        let first = repository
            .create_or_get(&mut ctx, &ed.review, &ed.draft)
            .await
            .unwrap();
        let second = repository
            .create_or_get(&mut ctx, &ed.review, &ed.draft)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.roles.is_empty());

        let existing = repository
            .create_or_get(&mut ctx, &ed.draft, &ed.review)
            .await
            .unwrap();
        assert!(existing.roles.has_author());
    }

    #[tokio::test]
    async fn role_less_users_pass_every_edge() {
        let ed = editorial().await;
        let repository = ConfigTransitionRepository::new(Arc::clone(&ed.runtime));
        let mut ctx = RequestContext::new();
        let nobody = Account::new(UserId::new(), "nobody").role_filter();
        let writer = writer().role_filter();

        assert!(
            repository
                .get_transitions_from(&ed.review, &writer)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            repository
                .get_transitions_from(&ed.review, &nobody)
                .await
                .unwrap()
                .len(),
            1
        );

        repository
            .create_or_get(&mut ctx, &ed.review, &ed.draft)
            .await
            .unwrap();
        assert!(
            repository
                .get_transitions_from(&ed.review, &writer)
                .await
                .unwrap()
                .is_empty()
        );

        let open = repository
            .get_transitions_from(&ed.review, &nobody)
            .await
            .unwrap();
        assert_eq!(open.len(), 2);
        assert_eq!(open[1].to, ed.draft);
        assert_eq!(
            repository
                .get_transitions_from(&ed.review, &RoleFilter::All)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn set_roles_updates_the_edge() {
        let ed = editorial().await;
        let repository = ConfigTransitionRepository::new(Arc::clone(&ed.runtime));
        let mut ctx = RequestContext::new();

        let roles: RoleSet = ["writer"].into_iter().collect();
        repository
            .set_roles(&mut ctx, &ed.review, &ed.published, roles)
            .await
            .unwrap();

        let edge = repository
            .get(&ed.review, &ed.published)
            .await
            .unwrap()
            .unwrap();
        assert!(ConfigTransitionRepository::is_allowed(&edge, &writer().role_filter()));
    }

    #[tokio::test]
    async fn edges_stay_inside_one_workflow() {
        let ed = editorial().await;
        let support = WorkflowId::new("support");
        ed.stores
            .config
            .save_workflow(&WorkflowConfig::new(support.clone(), "Support"))
            .await
            .unwrap();
        let mut ctx = RequestContext::new();
        let open = StateRegistry::new(Arc::clone(&ed.runtime))
            .create_state(&mut ctx, &support, StateId::new("open"), "Open", 0)
            .await
            .unwrap();

        let repository = ConfigTransitionRepository::new(Arc::clone(&ed.runtime));
        let err = repository
            .create_or_get(&mut ctx, &ed.draft, &open.id)
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("does not belong to workflow editorial"));

        let err = repository
            .create_or_get(&mut ctx, &ed.draft, &StateId::new("missing"))
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("state not found: missing"));
    }
}
