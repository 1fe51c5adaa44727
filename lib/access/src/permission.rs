//! Workflow permission strings and the permission checker seam.
//!
//! Permissions are plain strings so that they can live in the host's
//! permission registry:
//! - `"<verb> <workflow> workflow_transition"` for per-workflow verbs
//! - `"bypass <workflow> workflow_transition access"` to skip role gating

use crate::account::Account;
use crate::error::AuthorizationError;
use crate::role::RoleSet;
use async_trait::async_trait;
use nodeflow_core::{RoleId, WorkflowId};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

/// Verbs a user can be granted on a workflow's transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionVerb {
    /// Create scheduled transitions.
    Schedule,
}

impl TransitionVerb {
    /// Returns the verb as used in permission strings.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
        }
    }
}

/// A permission on a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Permission {
    /// A verb on a workflow's transitions.
    Transition {
        verb: TransitionVerb,
        workflow: WorkflowId,
    },
    /// Bypass role checks on a workflow's transitions.
    Bypass { workflow: WorkflowId },
}

impl Permission {
    /// Creates a transition-verb permission.
    #[must_use]
    pub fn transition(verb: TransitionVerb, workflow: &WorkflowId) -> Self {
        Self::Transition {
            verb,
            workflow: workflow.clone(),
        }
    }

    /// Creates a bypass permission.
    #[must_use]
    pub fn bypass(workflow: &WorkflowId) -> Self {
        Self::Bypass {
            workflow: workflow.clone(),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transition { verb, workflow } => {
                write!(f, "{} {workflow} workflow_transition", verb.as_str())
            }
            Self::Bypass { workflow } => {
                write!(f, "bypass {workflow} workflow_transition access")
            }
        }
    }
}

/// Answers permission questions for the engine.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Returns whether `account` holds `permission`.
    async fn user_has_permission(
        &self,
        account: &Account,
        permission: &Permission,
    ) -> Result<bool, Report<AuthorizationError>>;

    /// Checks a permission and returns an error if it is not held.
    async fn require_permission(
        &self,
        account: &Account,
        permission: &Permission,
    ) -> Result<(), Report<AuthorizationError>> {
        if !self.user_has_permission(account, permission).await? {
            return Err(AuthorizationError::PermissionDenied {
                user_id: account.id(),
                permission: permission.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Permission checker backed by a static role → permission-string table.
///
/// The superuser holds every permission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolePermissions {
    grants: HashMap<RoleId, BTreeSet<String>>,
}

impl RolePermissions {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants a permission to a role.
    pub fn grant(&mut self, role: impl Into<RoleId>, permission: &Permission) {
        self.grants
            .entry(role.into())
            .or_default()
            .insert(permission.to_string());
    }

    /// Revokes a permission from a role.
    pub fn revoke(&mut self, role: &RoleId, permission: &Permission) {
        if let Some(granted) = self.grants.get_mut(role) {
            granted.remove(&permission.to_string());
        }
    }

    /// Returns true if any of `roles` holds `permission`.
    #[must_use]
    pub fn any_role_has(&self, roles: &RoleSet, permission: &Permission) -> bool {
        let wanted = permission.to_string();
        roles.iter().any(|role| {
            self.grants
                .get(role)
                .is_some_and(|granted| granted.contains(&wanted))
        })
    }
}

#[async_trait]
impl PermissionChecker for RolePermissions {
    async fn user_has_permission(
        &self,
        account: &Account,
        permission: &Permission,
    ) -> Result<bool, Report<AuthorizationError>> {
        let allowed = account.is_superuser() || self.any_role_has(account.roles(), permission);
        debug!(user = %account.id(), %permission, allowed, "permission check result");
        Ok(allowed)
    }
}
