//! Strongly-typed ID types for workflow configuration and content.
//!
//! Two families of identifiers exist:
//! - Machine names (`WorkflowId`, `StateId`, `RoleId`) are chosen by site
//!   builders and are stable across exports. They are lowercase ASCII
//!   alphanumerics and underscores.
//! - Generated IDs (`UserId`, `TransitionId`) use ULID, providing both
//!   uniqueness and temporal ordering.
//!
//! Content entities are external to the workflow engine, so `EntityType` and
//! `EntityId` are opaque strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Returns true if `value` is a valid machine name.
#[must_use]
pub fn is_machine_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Macro to generate a strongly-typed ID wrapper around ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Creates an ID from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the prefix used for display formatting.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let prefix_with_underscore = concat!($prefix, "_");
                let ulid_str = s.strip_prefix(prefix_with_underscore).unwrap_or(s);

                Ulid::from_str(ulid_str)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }
    };
}

/// Macro to generate a string-backed ID.
///
/// `$machine` selects whether `FromStr` enforces the machine-name alphabet.
macro_rules! define_name {
    ($(#[$meta:meta])* $name:ident, machine = $machine:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier without validation.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier satisfies the alphabet rules for this type.
            #[must_use]
            pub fn is_valid(&self) -> bool {
                if $machine {
                    is_machine_name(&self.0)
                } else {
                    !self.0.is_empty()
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let id = Self(s.to_string());
                if id.is_valid() {
                    Ok(id)
                } else {
                    Err(ParseIdError {
                        id_type: stringify!($name),
                        reason: format!("'{s}' is not a valid identifier"),
                    })
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a user account.
    UserId,
    "usr"
);

define_id!(
    /// Unique identifier for a single transition instance (executed or pending).
    TransitionId,
    "tr"
);

define_name!(
    /// Machine name of a workflow.
    WorkflowId,
    machine = true
);

define_name!(
    /// Machine name of a workflow state (the "sid").
    StateId,
    machine = true
);

define_name!(
    /// Machine name of a user role.
    RoleId,
    machine = true
);

define_name!(
    /// Type of a content entity (for example `node`).
    EntityType,
    machine = true
);

define_name!(
    /// Identifier of a content entity within its type.
    EntityId,
    machine = false
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_display_format() {
        let id = UserId::new();
        assert!(id.to_string().starts_with("usr_"));
    }

    #[test]
    fn transition_id_parse_with_prefix() {
        let id = TransitionId::new();
        let parsed: TransitionId = id.to_string().parse().expect("should parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn transition_id_parse_without_prefix() {
        let ulid = Ulid::new();
        let id: TransitionId = ulid.to_string().parse().expect("should parse");
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn parse_invalid_ulid() {
        let err = "not_a_ulid".parse::<UserId>().unwrap_err();
        assert_eq!(err.id_type, "UserId");
    }

    #[test]
    fn machine_names() {
        assert!(is_machine_name("editorial"));
        assert!(is_machine_name("needs_review_2"));
        assert!(!is_machine_name(""));
        assert!(!is_machine_name("Needs Review"));
        assert!(!is_machine_name("draft-1"));
    }

    #[test]
    fn state_id_from_str_validates() {
        assert!("review".parse::<StateId>().is_ok());
        let err = "Re view".parse::<StateId>().unwrap_err();
        assert_eq!(err.id_type, "StateId");
    }

    #[test]
    fn entity_id_accepts_any_non_empty_value() {
        assert!("42".parse::<EntityId>().is_ok());
        assert!("Some Title".parse::<EntityId>().is_ok());
        assert!("".parse::<EntityId>().is_err());
    }

    #[test]
    fn name_ids_order_lexically() {
        let mut ids = vec![StateId::new("review"), StateId::new("draft")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "draft");
    }

    #[test]
    fn id_serde_is_transparent() {
        let json = serde_json::to_string(&WorkflowId::new("editorial")).expect("serialize");
        assert_eq!(json, "\"editorial\"");
        let parsed: WorkflowId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.as_str(), "editorial");
    }
}
