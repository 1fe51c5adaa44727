//! Error types for the cron runner.

use std::fmt;
use std::path::PathBuf;

/// Failures that abort a cron run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronError {
    /// Reading or writing the snapshot file failed (use as context wrapper).
    Snapshot {
        path: PathBuf,
        operation: &'static str,
    },
    /// The sweep itself failed (use as context wrapper).
    Sweep,
}

impl fmt::Display for CronError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot { path, operation } => {
                write!(f, "failed to {operation} snapshot {}", path.display())
            }
            Self::Sweep => write!(f, "scheduled transition sweep failed"),
        }
    }
}

impl std::error::Error for CronError {}
