//! Error types for the scheduler crate.
//!
//! Promotion failures of a single transition are counted, not returned;
//! `SchedulerError` only wraps failures that abort a whole sweep.

use chrono::{DateTime, Utc};
use std::fmt;

/// High-level scheduler errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The sweep window is empty or reversed.
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Loading due transitions failed (use as context wrapper).
    LoadDue,
    /// Reading or writing the sweep cursor failed (use as context wrapper).
    Cursor { operation: &'static str },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWindow { start, end } => {
                write!(f, "invalid sweep window ({start}, {end})")
            }
            Self::LoadDue => write!(f, "failed to load due scheduled transitions"),
            Self::Cursor { operation } => write!(f, "sweep cursor failed: {operation}"),
        }
    }
}

impl std::error::Error for SchedulerError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn scheduler_error_display() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let err = SchedulerError::InvalidWindow { start, end: start };
        assert!(err.to_string().starts_with("invalid sweep window"));

        let err = SchedulerError::Cursor { operation: "save" };
        assert!(err.to_string().contains("save"));
    }
}
