//! Role sets and role filters for transition authorization.
//!
//! Every config transition carries the set of roles allowed to use it. Users
//! hold a set of roles too, and an owner of a piece of content is granted the
//! AUTHOR pseudo-role while their permissions are evaluated.
//!
//! A `RoleFilter` is what the engine evaluates against a transition's
//! authorized roles: either every role (`All`, used for forced transitions and
//! superusers) or a concrete set.

use nodeflow_core::RoleId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Machine name of the AUTHOR pseudo-role.
pub const AUTHOR_ROLE: &str = "author";

/// Returns the AUTHOR pseudo-role id.
#[must_use]
pub fn author_role() -> RoleId {
    RoleId::new(AUTHOR_ROLE)
}

/// An ordered set of role ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet {
    roles: BTreeSet<RoleId>,
}

impl RoleSet {
    /// Creates an empty role set.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a role set holding only the AUTHOR pseudo-role.
    #[must_use]
    pub fn author() -> Self {
        Self::none().with_author()
    }

    /// Returns a copy of this set with the AUTHOR pseudo-role added.
    #[must_use]
    pub fn with_author(mut self) -> Self {
        self.roles.insert(author_role());
        self
    }

    /// Adds a role.
    pub fn insert(&mut self, role: RoleId) -> bool {
        self.roles.insert(role)
    }

    /// Removes a role.
    pub fn remove(&mut self, role: &RoleId) -> bool {
        self.roles.remove(role)
    }

    /// Returns true if the set contains `role`.
    #[must_use]
    pub fn contains(&self, role: &RoleId) -> bool {
        self.roles.contains(role)
    }

    /// Returns true if the set holds the AUTHOR pseudo-role.
    #[must_use]
    pub fn has_author(&self) -> bool {
        self.roles.contains(&author_role())
    }

    /// Returns true if the two sets share at least one role.
    #[must_use]
    pub fn intersects(&self, other: &RoleSet) -> bool {
        self.roles.intersection(&other.roles).next().is_some()
    }

    /// Returns the union of the two sets.
    #[must_use]
    pub fn union(&self, other: &RoleSet) -> RoleSet {
        Self {
            roles: self.roles.union(&other.roles).cloned().collect(),
        }
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Returns the number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Iterates over the roles in order.
    pub fn iter(&self) -> impl Iterator<Item = &RoleId> {
        self.roles.iter()
    }
}

impl<R: Into<RoleId>> FromIterator<R> for RoleSet {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self {
            roles: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// The roles a permission evaluation runs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "roles", rename_all = "snake_case")]
pub enum RoleFilter {
    /// Bypass role gating entirely.
    All,
    /// Evaluate against a concrete set of roles.
    Roles(RoleSet),
}

impl RoleFilter {
    /// Returns true if this filter admits a transition authorized for `authorized`.
    ///
    /// An empty role set admits everything, the same as `All`. Callers that
    /// want a deny-by-default must check for the empty set themselves.
    #[must_use]
    pub fn admits(&self, authorized: &RoleSet) -> bool {
        match self {
            Self::All => true,
            Self::Roles(roles) if roles.is_empty() => true,
            Self::Roles(roles) => roles.intersects(authorized),
        }
    }

    /// Returns true if this is the `All` filter.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Returns this filter with the AUTHOR pseudo-role granted.
    ///
    /// `All` is returned unchanged.
    #[must_use]
    pub fn with_author(self) -> Self {
        match self {
            Self::All => Self::All,
            Self::Roles(roles) => Self::Roles(roles.with_author()),
        }
    }
}

impl From<RoleSet> for RoleFilter {
    fn from(roles: RoleSet) -> Self {
        Self::Roles(roles)
    }
}
