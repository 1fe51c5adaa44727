//! Request-scoped caches.
//!
//! A `RequestContext` lives for one logical request: one form submission, one
//! API call, one scheduler sweep. It is never shared between requests. The
//! caches it holds are:
//! - loaded workflows, keyed by workflow ID
//! - computed option lists, keyed by `OptionKey`
//! - results of executed transitions, guarding against duplicate submits
//! - whether a bare-entity transition was executed

use crate::definition::Workflow;
use crate::transition::TransitionOption;
use nodeflow_core::{EntityId, StateId, TransitionId, UserId, WorkflowId};
use std::collections::HashMap;

/// Placeholder used in option keys for unsaved entities.
pub const NEW_ENTITY_KEY: &str = "__new__";

/// Cache key of a computed option list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionKey {
    /// Entity ID, or `NEW_ENTITY_KEY`.
    pub entity: String,
    /// Workflow field name.
    pub field_name: String,
    /// User the options were computed for.
    pub user: UserId,
    /// Whether permissions were bypassed.
    pub force: bool,
    /// State the options start from.
    pub from: StateId,
}

impl OptionKey {
    /// Builds a key.
    #[must_use]
    pub fn new(
        entity_id: Option<&EntityId>,
        field_name: &str,
        user: UserId,
        force: bool,
        from: &StateId,
    ) -> Self {
        Self {
            entity: entity_id.map_or_else(|| NEW_ENTITY_KEY.to_string(), ToString::to_string),
            field_name: field_name.to_string(),
            user,
            force,
            from: from.clone(),
        }
    }
}

/// Caches for one request.
#[derive(Debug, Default)]
pub struct RequestContext {
    workflows: HashMap<WorkflowId, Workflow>,
    options: HashMap<OptionKey, Vec<TransitionOption>>,
    executed: HashMap<(TransitionId, Option<EntityId>), StateId>,
    bare_entity_executed: bool,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a cached workflow.
    #[must_use]
    pub fn workflow(&self, id: &WorkflowId) -> Option<&Workflow> {
        self.workflows.get(id)
    }

    /// Caches a loaded workflow.
    pub fn cache_workflow(&mut self, workflow: Workflow) {
        self.workflows.insert(workflow.id().clone(), workflow);
    }

    /// Drops a cached workflow together with every option list, since
    /// options depend on the workflow's states.
    pub fn invalidate_workflow(&mut self, id: &WorkflowId) {
        self.workflows.remove(id);
        self.options.clear();
    }

    /// Returns cached options.
    #[must_use]
    pub fn options(&self, key: &OptionKey) -> Option<&Vec<TransitionOption>> {
        self.options.get(key)
    }

    /// Caches an option list.
    pub fn cache_options(&mut self, key: OptionKey, options: Vec<TransitionOption>) {
        self.options.insert(key, options);
    }

    /// Returns the result of a transition already executed in this request.
    #[must_use]
    pub fn executed(&self, id: TransitionId, entity_id: Option<&EntityId>) -> Option<&StateId> {
        self.executed.get(&(id, entity_id.cloned()))
    }

    /// Remembers the result of an executed transition.
    pub fn remember_executed(
        &mut self,
        id: TransitionId,
        entity_id: Option<EntityId>,
        result: StateId,
    ) {
        self.executed.insert((id, entity_id), result);
    }

    /// Records that a bare-entity transition was executed.
    pub fn mark_bare_entity_executed(&mut self) {
        self.bare_entity_executed = true;
    }

    /// Returns true if a bare-entity transition was executed.
    #[must_use]
    pub fn bare_entity_executed(&self) -> bool {
        self.bare_entity_executed
    }

    /// Clears every cache.
    pub fn reset(&mut self) {
        self.workflows.clear();
        self.options.clear();
        self.executed.clear();
        self.bare_entity_executed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowConfig;

    fn option(id: &str) -> TransitionOption {
        TransitionOption {
            state_id: StateId::new(id),
            label: id.to_string(),
        }
    }

    #[test]
    fn option_key_uses_placeholder_for_new_entities() {
        let user = UserId::new();
        let from = StateId::new("draft");
        let key = OptionKey::new(None, "field_status", user, false, &from);
        assert_eq!(key.entity, NEW_ENTITY_KEY);

        let saved = OptionKey::new(Some(&EntityId::new("4")), "field_status", user, false, &from);
        assert_eq!(saved.entity, "4");
        assert_ne!(key, saved);
    }

    #[test]
    fn caches_and_reset() {
        let mut context = RequestContext::new();
        let wid = WorkflowId::new("editorial");
        context.cache_workflow(Workflow::new(
            WorkflowConfig::new(wid.clone(), "Editorial"),
            vec![],
            vec![],
        ));
        let key = OptionKey::new(None, "", UserId::new(), true, &StateId::new("draft"));
        context.cache_options(key.clone(), vec![option("review")]);
        let tid = TransitionId::new();
        context.remember_executed(tid, None, StateId::new("review"));
        context.mark_bare_entity_executed();

        assert!(context.workflow(&wid).is_some());
        assert_eq!(context.options(&key).map(Vec::len), Some(1));
        assert_eq!(context.executed(tid, None), Some(&StateId::new("review")));
        assert!(context.bare_entity_executed());

        context.reset();
        assert!(context.workflow(&wid).is_none());
        assert!(context.options(&key).is_none());
        assert!(context.executed(tid, None).is_none());
        assert!(!context.bare_entity_executed());
    }

    #[test]
    fn invalidating_a_workflow_drops_options() {
        let mut context = RequestContext::new();
        let wid = WorkflowId::new("editorial");
        context.cache_workflow(Workflow::new(
            WorkflowConfig::new(wid.clone(), "Editorial"),
            vec![],
            vec![],
        ));
        let key = OptionKey::new(None, "", UserId::new(), false, &StateId::new("draft"));
        context.cache_options(key.clone(), vec![option("review")]);

        context.invalidate_workflow(&wid);
        assert!(context.workflow(&wid).is_none());
        assert!(context.options(&key).is_none());
    }
}
