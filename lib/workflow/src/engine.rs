//! The transition engine.
//!
//! The engine builds, validates, authorizes and executes transitions of a
//! single entity field:
//!
//! 1. `create` builds a transition in the Created phase
//! 2. `execute` validates, authorizes, asks the pre-transition hooks, then
//!    either stores the transition for later or records it in history
//! 3. `update_entity` writes the resulting state into the entity and saves it
//! 4. `post_execute` notifies observers once the entity is saved
//!
//! `apply` runs 2–4 under the field's lock after checking that the stored
//! state still matches the transition's from-state.
//!
//! Permission failures and vetoes are not errors: `execute` returns the
//! unchanged from-state and records the reason on the transition. Callers
//! detect success by comparing the result with `to_sid`.

use crate::context::RequestContext;
use crate::entity::Entity;
use crate::error::{Rejection, ValidationError, WorkflowError};
use crate::registry::StateRegistry;
use crate::repository::ConfigTransitionRepository;
use crate::runtime::Runtime;
use crate::state::State;
use crate::transition::{Transition, TransitionPhase};
use chrono::{DateTime, Utc};
use nodeflow_access::{Account, Permission, author_role};
use nodeflow_core::{Result, StateId, UserId, truncate_to_seconds};
use rootcause::prelude::ResultExt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Log target of the operational transition log.
pub const WATCHDOG_TARGET: &str = "nodeflow::watchdog";

/// Parameters of a new transition.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    entity: Option<Entity>,
    field_name: String,
    from: Option<StateId>,
    to: Option<StateId>,
    uid: UserId,
    timestamp: Option<DateTime<Utc>>,
    comment: String,
    force: bool,
    scheduled: bool,
}

impl TransitionRequest {
    /// Starts a request on behalf of `uid`.
    #[must_use]
    pub fn new(uid: UserId) -> Self {
        Self {
            entity: None,
            field_name: String::new(),
            from: None,
            to: None,
            uid,
            timestamp: None,
            comment: String::new(),
            force: false,
            scheduled: false,
        }
    }

    /// Sets the entity.
    #[must_use]
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Sets the workflow field name.
    #[must_use]
    pub fn field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    /// Sets the from-state; defaults to the field's current state.
    #[must_use]
    pub fn from(mut self, from: StateId) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the to-state; defaults to the from-state.
    #[must_use]
    pub fn to(mut self, to: StateId) -> Self {
        self.to = Some(to);
        self
    }

    /// Sets the timestamp; defaults to now.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Bypasses permission checks.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Schedules the transition for `timestamp` instead of running it now.
    #[must_use]
    pub fn schedule_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.scheduled = true;
        self.timestamp = Some(timestamp);
        self
    }
}

/// Builds and runs transitions.
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    runtime: Arc<Runtime>,
    registry: StateRegistry,
    repository: ConfigTransitionRepository,
}

impl TransitionEngine {
    /// Creates an engine over `runtime`.
    #[must_use]
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            registry: StateRegistry::new(Arc::clone(&runtime)),
            repository: ConfigTransitionRepository::new(Arc::clone(&runtime)),
            runtime,
        }
    }

    /// Builds a transition in the Created phase.
    ///
    /// A missing from-state is read from the entity field, falling back to
    /// the creation state of the field's workflow. A missing to-state
    /// defaults to the from-state.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::AmbiguousConstruction` when neither an
    /// entity nor a state is given, `ValidationError::SchedulingDisabled`
    /// when scheduling on a workflow that does not allow it, and
    /// configuration or store errors while resolving the from-state.
    pub async fn create(
        &self,
        ctx: &mut RequestContext,
        request: TransitionRequest,
    ) -> Result<Transition, WorkflowError> {
        let TransitionRequest {
            entity,
            field_name,
            from,
            to,
            uid,
            timestamp,
            comment,
            force,
            scheduled,
        } = request;

        let from = match (from, &entity) {
            (Some(from), _) => from,
            (None, Some(entity)) => match self
                .runtime
                .accessor(&entity.entity_type)
                .get(entity, &field_name)
            {
                Some(current) => current,
                None => {
                    let workflow_id = self
                        .runtime
                        .bound_workflow(&entity.entity_type, &field_name)?;
                    self.registry
                        .get_creation_state(ctx, &workflow_id)
                        .await?
                        .id
                }
            },
            (None, None) => match &to {
                Some(to) => to.clone(),
                None => {
                    return Err(WorkflowError::from(ValidationError::AmbiguousConstruction).into());
                }
            },
        };
        let to = to.unwrap_or_else(|| from.clone());

        if scheduled {
            if let Some(state) = self.registry.state(&from).await? {
                let workflow = self.registry.workflow(ctx, &state.workflow_id).await?;
                if !workflow.options().schedule_enabled {
                    return Err(WorkflowError::from(ValidationError::SchedulingDisabled {
                        workflow_id: state.workflow_id,
                    })
                    .into());
                }
            }
        }

        let timestamp =
            truncate_to_seconds(timestamp.unwrap_or_else(|| self.runtime.clock().now()));
        let mut transition = Transition::new(from, to, uid, timestamp)
            .with_comment(comment)
            .with_force(force)
            .scheduled(scheduled);
        if let Some(entity) = entity {
            transition = transition.for_entity(entity, &field_name);
        }
        Ok(transition)
    }

    /// Checks that the transition can run at all: the entity is present and
    /// saved, both states exist in the same workflow and the target is
    /// active. Moves the transition to Validated on success.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn is_valid(&self, transition: &mut Transition) -> Result<bool, WorkflowError> {
        match self.validate(transition).await? {
            Ok(()) => {
                transition.advance(TransitionPhase::Validated);
                Ok(true)
            }
            Err(reason) => {
                error!(
                    transition = %transition.id,
                    from = %transition.from_sid,
                    to = %transition.to_sid,
                    %reason,
                    "invalid transition"
                );
                transition.reject(Rejection::Invalid { reason });
                Ok(false)
            }
        }
    }

    async fn validate(
        &self,
        transition: &Transition,
    ) -> Result<std::result::Result<(), String>, WorkflowError> {
        let Some(entity) = transition.entity() else {
            return Ok(Err("no entity given".to_string()));
        };
        if entity.is_new() {
            return Ok(Err(format!("{} has not been saved", entity.label)));
        }
        let Some(from) = self.registry.state(&transition.from_sid).await? else {
            return Ok(Err(format!("unknown state {}", transition.from_sid)));
        };
        if !transition.has_state_change() {
            return Ok(Ok(()));
        }
        let Some(to) = self.registry.state(&transition.to_sid).await? else {
            return Ok(Err(format!("unknown state {}", transition.to_sid)));
        };
        if from.workflow_id != to.workflow_id {
            return Ok(Err(format!(
                "{} and {} belong to different workflows",
                from.id, to.id
            )));
        }
        if !to.is_active() {
            return Ok(Err(format!("state {} is inactive", to.id)));
        }
        Ok(Ok(()))
    }

    /// Checks whether `account` may take the transition and moves it to
    /// Authorized on success.
    ///
    /// Forced transitions, self transitions and holders of the workflow's
    /// bypass permission always pass. Otherwise the configured edge must
    /// admit the account's roles, whether the transition is immediate or
    /// scheduled.
    ///
    /// # Errors
    ///
    /// Returns a store or permission-backend error.
    #[instrument(
        skip(self, transition, account),
        fields(transition = %transition.id, user = %account.id())
    )]
    pub async fn is_allowed(
        &self,
        transition: &mut Transition,
        account: &Account,
        force: bool,
    ) -> Result<bool, WorkflowError> {
        if force || !transition.has_state_change() {
            transition.advance(TransitionPhase::Authorized);
            return Ok(true);
        }
        let Some(from) = self.registry.state(&transition.from_sid).await? else {
            transition.reject(Rejection::Invalid {
                reason: format!("unknown state {}", transition.from_sid),
            });
            return Ok(false);
        };

        if self
            .has_permission(account, &Permission::bypass(&from.workflow_id))
            .await?
        {
            debug!("bypass permission held");
            transition.advance(TransitionPhase::Authorized);
            return Ok(true);
        }

        let filter = account.role_filter();
        let allowed = match self
            .repository
            .get(&transition.from_sid, &transition.to_sid)
            .await?
        {
            Some(edge) => edge.is_allowed(&filter),
            None => false,
        };

        if allowed {
            transition.advance(TransitionPhase::Authorized);
        } else {
            transition.reject(Rejection::NotAuthorized {
                actor: account.id(),
                from: transition.from_sid.clone(),
                to: transition.to_sid.clone(),
            });
        }
        Ok(allowed)
    }

    async fn has_permission(
        &self,
        account: &Account,
        permission: &Permission,
    ) -> Result<bool, WorkflowError> {
        self.runtime
            .permissions()
            .user_has_permission(account, permission)
            .await
            .context(WorkflowError::Permission {
                operation: "check transition permission",
            })
    }

    /// Runs a transition.
    ///
    /// Returns `to_sid` when the transition was applied, and `from_sid` when
    /// it was scheduled or declined. A declined transition carries its
    /// reason in [`Transition::rejection`]. Running the same transition
    /// twice within one request returns the first result without side
    /// effects.
    ///
    /// The entity itself is not saved; call [`TransitionEngine::update_entity`]
    /// and then [`TransitionEngine::post_execute`], or use
    /// [`TransitionEngine::apply`].
    ///
    /// # Errors
    ///
    /// Returns a store or permission-backend error.
    #[instrument(
        skip(self, ctx, transition, account),
        fields(
            transition = %transition.id,
            from = %transition.from_sid,
            to = %transition.to_sid
        )
    )]
    pub async fn execute(
        &self,
        ctx: &mut RequestContext,
        transition: &mut Transition,
        account: &Account,
        force: bool,
    ) -> Result<StateId, WorkflowError> {
        let force = force || transition.forced;
        if let Some(previous) = ctx.executed(transition.id, transition.entity_id()) {
            info!(result = %previous, "transition already executed in this request");
            return Ok(previous.clone());
        }

        let result = self.run(ctx, transition, account, force).await?;
        ctx.remember_executed(transition.id, transition.entity_id().cloned(), result.clone());
        Ok(result)
    }

    async fn run(
        &self,
        ctx: &mut RequestContext,
        transition: &mut Transition,
        account: &Account,
        force: bool,
    ) -> Result<StateId, WorkflowError> {
        if !self.is_valid(transition).await? {
            return Ok(transition.from_sid.clone());
        }

        if transition.has_state_change() {
            let actor = if force {
                account.clone()
            } else {
                account.clone().with_role(author_role())
            };
            if !self.is_allowed(transition, &actor, force).await? {
                error!(
                    actor = %account.id(),
                    actor_name = account.name(),
                    old_state = %transition.from_sid,
                    new_state = %transition.to_sid,
                    "user is not allowed to perform this transition"
                );
                return Ok(transition.from_sid.clone());
            }
        } else {
            transition.advance(TransitionPhase::Authorized);
        }

        if let Some(rejection) = self.runtime.hooks().pre(transition) {
            warn!(%rejection, "transition vetoed");
            transition.reject(rejection);
            return Ok(transition.from_sid.clone());
        }

        if transition.scheduled {
            transition.advance(TransitionPhase::Scheduled);
            self.runtime
                .scheduled()
                .save(transition)
                .await
                .context(WorkflowError::Store {
                    operation: "save scheduled transition",
                })?;
            info!(due = %transition.timestamp, "transition scheduled");
            return Ok(transition.from_sid.clone());
        }

        transition.comment = self.runtime.hooks().alter_comment(transition);
        transition.executed = true;

        if transition.has_state_change() || transition.has_comment() {
            let entry = self
                .runtime
                .history()
                .record(transition)
                .await
                .context(WorkflowError::Store {
                    operation: "record history",
                })?;
            debug!(history = %entry.id, "transition recorded");
            self.watchdog(ctx, transition).await?;
        }

        if transition.has_state_change() {
            if let Some(slot) = transition.slot() {
                let cancelled = self
                    .runtime
                    .scheduled()
                    .delete(&slot)
                    .await
                    .context(WorkflowError::Store {
                        operation: "delete scheduled transition",
                    })?;
                if cancelled {
                    debug!(%slot, "pending scheduled transition superseded");
                }
            }
        }

        if transition.slot().is_some_and(|slot| slot.is_bare()) {
            ctx.mark_bare_entity_executed();
        }
        transition.advance(TransitionPhase::Executed);
        Ok(transition.to_sid.clone())
    }

    async fn watchdog(
        &self,
        ctx: &mut RequestContext,
        transition: &Transition,
    ) -> Result<(), WorkflowError> {
        let Some(to) = self.registry.state(&transition.to_sid).await? else {
            return Ok(());
        };
        let workflow = self.registry.workflow(ctx, &to.workflow_id).await?;
        if workflow.options().watchdog_log {
            let label = transition.entity().map_or("", |e| e.label.as_str());
            info!(
                target: WATCHDOG_TARGET,
                entity = label,
                state = %to.label,
                user = %transition.uid,
                "state of {label} set to {}",
                to.label
            );
        }
        Ok(())
    }

    /// Notifies observers of an applied transition.
    ///
    /// Call after the entity has been saved. Nothing happens unless the
    /// transition was executed and changed the state or carries a comment.
    pub fn post_execute(&self, transition: &Transition) {
        if transition.executed && (transition.has_state_change() || transition.has_comment()) {
            self.runtime.hooks().post(transition);
        }
    }

    /// Writes the resolved state into the entity and saves it.
    ///
    /// The resolved state is the from-state while the transition is still
    /// pending, and the to-state once executed.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn update_entity(&self, transition: &mut Transition) -> Result<bool, WorkflowError> {
        let state = transition.resolved_sid().clone();
        let field_name = transition.field_name().to_string();
        let Some(entity) = transition.entity_mut() else {
            warn!("transition has no entity to update");
            return Ok(false);
        };
        self.runtime
            .accessor(&entity.entity_type)
            .set(entity, &field_name, Some(state));
        let saved = self
            .runtime
            .entities()
            .save(entity)
            .await
            .context(WorkflowError::Store {
                operation: "save entity",
            })?;
        let entity = entity.clone();
        transition.attach_entity(entity);
        Ok(saved)
    }

    /// Runs a transition end to end under the field's lock.
    ///
    /// The entity is reloaded and its stored state compared with the
    /// transition's from-state; a mismatch rejects the transition with
    /// `Rejection::Conflict`. Otherwise the transition is executed, the
    /// entity updated and saved, and observers notified.
    ///
    /// # Errors
    ///
    /// Returns a store or permission-backend error.
    pub async fn apply(
        &self,
        ctx: &mut RequestContext,
        transition: &mut Transition,
        account: &Account,
        force: bool,
    ) -> Result<StateId, WorkflowError> {
        if let Some(previous) = ctx.executed(transition.id, transition.entity_id()) {
            return Ok(previous.clone());
        }
        let Some(slot) = transition.slot() else {
            return self.execute(ctx, transition, account, force).await;
        };
        let _guard = self.runtime.locks().acquire(&slot).await;

        let stored = self
            .runtime
            .entities()
            .load(&slot.entity_type, &slot.entity_id)
            .await
            .context(WorkflowError::Store {
                operation: "load entity",
            })?;
        let Some(entity) = stored else {
            transition.reject(Rejection::Invalid {
                reason: format!("{slot} no longer exists"),
            });
            return Ok(transition.from_sid.clone());
        };

        let current = self
            .runtime
            .accessor(&slot.entity_type)
            .get(&entity, &slot.field_name);
        if !self.matches_current(ctx, transition, current.as_ref()).await? {
            warn!(
                %slot,
                expected = %transition.from_sid,
                actual = ?current,
                "content changed state concurrently"
            );
            transition.reject(Rejection::Conflict {
                expected: transition.from_sid.clone(),
                actual: current,
            });
            return Ok(transition.from_sid.clone());
        }
        transition.attach_entity(entity);

        let result = self.execute(ctx, transition, account, force).await?;
        if matches!(
            transition.phase,
            TransitionPhase::Executed | TransitionPhase::Scheduled
        ) {
            self.update_entity(transition).await?;
            self.post_execute(transition);
        }
        Ok(result)
    }

    /// A field without a value still counts as being in the creation state.
    async fn matches_current(
        &self,
        ctx: &mut RequestContext,
        transition: &Transition,
        current: Option<&StateId>,
    ) -> Result<bool, WorkflowError> {
        match current {
            Some(current) => Ok(current == &transition.from_sid),
            None => {
                let from: Option<State> = self.registry.state(&transition.from_sid).await?;
                match from {
                    Some(from) => {
                        let workflow = self.registry.workflow(ctx, &from.workflow_id).await?;
                        Ok(workflow
                            .creation_state()
                            .is_some_and(|creation| creation.id == from.id))
                    }
                    None => Ok(false),
                }
            }
        }
    }
}
