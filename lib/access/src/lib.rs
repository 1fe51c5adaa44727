//! Roles, accounts and permission checks for nodeflow workflows.
//!
//! This crate provides:
//! - Role sets and the `RoleFilter` evaluated against config transitions
//! - The AUTHOR pseudo-role granted to content owners
//! - The `Account` view of the acting user
//! - Workflow permission strings and the `PermissionChecker` seam
//!
//! # Example
//!
//! ```
//! use nodeflow_access::{Account, RoleFilter, RoleSet};
//! use nodeflow_core::UserId;
//!
//! let account = Account::new(UserId::new(), "ada").with_role("editor");
//! let authorized: RoleSet = ["editor", "author"].into_iter().collect();
//!
//! assert!(account.role_filter().admits(&authorized));
//! assert!(RoleFilter::All.admits(&RoleSet::none()));
//! ```

pub mod account;
pub mod error;
pub mod permission;
pub mod role;

pub use account::Account;
pub use error::AuthorizationError;
pub use permission::{Permission, PermissionChecker, RolePermissions, TransitionVerb};
pub use role::{AUTHOR_ROLE, RoleFilter, RoleSet, author_role};
