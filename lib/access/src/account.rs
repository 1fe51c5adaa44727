//! The acting user of a transition.
//!
//! An `Account` is the engine's view of a CMS user: an id, a display name,
//! the site roles they hold and whether they are the superuser. Loading
//! accounts is the host's job; the engine only reads them.

use crate::role::{RoleFilter, RoleSet};
use nodeflow_core::{RoleId, UserId};
use serde::{Deserialize, Serialize};

/// A user acting on workflow content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// User ID.
    id: UserId,
    /// Display name used in log messages and default comments.
    name: String,
    /// Site roles held by the user.
    roles: RoleSet,
    /// Superusers bypass role gating when options are computed.
    superuser: bool,
}

impl Account {
    /// Creates an account with no roles.
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            roles: RoleSet::none(),
            superuser: false,
        }
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<RoleId>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Replaces the role set.
    #[must_use]
    pub fn with_roles(mut self, roles: RoleSet) -> Self {
        self.roles = roles;
        self
    }

    /// Marks the account as the superuser.
    #[must_use]
    pub fn superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    /// Returns the user ID.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the user's roles.
    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Returns true if the account is the superuser.
    #[must_use]
    pub fn is_superuser(&self) -> bool {
        self.superuser
    }

    /// Returns the user's roles as a concrete filter.
    #[must_use]
    pub fn role_filter(&self) -> RoleFilter {
        RoleFilter::Roles(self.roles.clone())
    }
}
