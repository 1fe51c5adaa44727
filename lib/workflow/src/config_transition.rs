//! Configured transitions: the allowed from → to matrix of a workflow.

use nodeflow_access::{RoleFilter, RoleSet};
use nodeflow_core::{StateId, WorkflowId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of a configured transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTransitionId(u64);

impl ConfigTransitionId {
    /// Wraps a raw store id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw store id.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConfigTransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An edge of a workflow's transition matrix.
///
/// The role set lists who may take the edge. The AUTHOR pseudo-role stands
/// for the owner of the content being moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTransition {
    /// Store-assigned ID.
    pub id: ConfigTransitionId,
    /// The owning workflow.
    pub workflow_id: WorkflowId,
    /// Source state.
    pub from: StateId,
    /// Target state.
    pub to: StateId,
    /// Roles allowed to take this edge.
    pub roles: RoleSet,
}

impl ConfigTransition {
    /// Creates an edge no role may take yet.
    #[must_use]
    pub fn new(
        id: ConfigTransitionId,
        workflow_id: WorkflowId,
        from: StateId,
        to: StateId,
    ) -> Self {
        Self {
            id,
            workflow_id,
            from,
            to,
            roles: RoleSet::none(),
        }
    }

    /// Sets the authorized roles.
    #[must_use]
    pub fn with_roles(mut self, roles: RoleSet) -> Self {
        self.roles = roles;
        self
    }

    /// Returns true if this edge goes from `from` to `to`.
    #[must_use]
    pub fn connects(&self, from: &StateId, to: &StateId) -> bool {
        &self.from == from && &self.to == to
    }

    /// Returns true for a self transition.
    #[must_use]
    pub fn is_self(&self) -> bool {
        self.from == self.to
    }

    /// Returns true if a user evaluated with `filter` may take this edge.
    ///
    /// `RoleFilter::All` always passes, and so does an empty role set: no
    /// requested roles means no restriction.
    #[must_use]
    pub fn is_allowed(&self, filter: &RoleFilter) -> bool {
        filter.admits(&self.roles)
    }
}
