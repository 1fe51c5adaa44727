//! Error handling foundation for nodeflow.
//!
//! This module provides the `Result` type alias using rootcause and the
//! `StoreError` raised by every persistence collaborator. Each crate defines
//! its own domain-specific error types in its own error module, using
//! rootcause's `.context()` to add layer-appropriate context as errors
//! propagate up the stack.

use rootcause::Report;
use std::fmt;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C> = std::result::Result<T, Report<C>>;

/// Errors raised by persistence collaborators (config, entity, history and
/// schedule stores).
///
/// These carry only what the store knows. Callers add the operation being
/// performed with `.context()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or returned an I/O failure.
    Unavailable { details: String },
    /// A record violated a uniqueness constraint.
    Conflict { key: String },
    /// A stored record could not be decoded.
    Corrupt { key: String, details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { details } => write!(f, "store unavailable: {details}"),
            Self::Conflict { key } => write!(f, "store conflict on '{key}'"),
            Self::Corrupt { key, details } => {
                write!(f, "corrupt record '{key}': {details}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_alias_carries_report() {
        let ok: Result<i32, StoreError> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);

        let err: Result<i32, StoreError> = Err(StoreError::Conflict {
            key: "editorial:draft".to_string(),
        }
        .into());
        assert!(err.is_err());
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::Corrupt {
            key: "history/7".to_string(),
            details: "missing sid".to_string(),
        };
        assert!(err.to_string().contains("history/7"));
        assert!(err.to_string().contains("missing sid"));
    }
}
