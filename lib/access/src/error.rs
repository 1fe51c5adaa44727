//! Error types for the access crate.

use nodeflow_core::UserId;
use std::fmt;

/// Errors from permission checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// User lacks the required permission.
    PermissionDenied {
        user_id: UserId,
        permission: String,
    },
    /// The permission backend could not answer.
    CheckFailed { reason: String },
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied {
                user_id,
                permission,
            } => {
                write!(f, "user {user_id} lacks permission '{permission}'")
            }
            Self::CheckFailed { reason } => {
                write!(f, "permission check failed: {reason}")
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}
