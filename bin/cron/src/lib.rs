//! Cron runner for scheduled nodeflow transitions.
//!
//! Each run loads the snapshot file into in-memory stores, promotes every
//! scheduled transition that fell due since the previous run, and writes
//! the snapshot back. The sweep cursor lives in its own file and only
//! advances once the snapshot is on disk.

pub mod config;
pub mod error;
pub mod snapshot;

pub use config::{CronConfig, SweepConfig};
pub use error::CronError;

use chrono::{DateTime, Duration, Utc};
use nodeflow_access::RolePermissions;
use nodeflow_core::Result;
use nodeflow_scheduler::{CacheInvalidator, FileCursorStore, Promoter, SweepCursor, SweepReport};
use nodeflow_workflow::Runtime;
use rootcause::prelude::ResultExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Logs that cached pages went stale; the cron runner has no page cache of
/// its own.
#[derive(Debug, Default)]
pub struct LogInvalidator;

impl CacheInvalidator for LogInvalidator {
    fn invalidate(&self) {
        info!("bare content changed state; page caches should be cleared");
    }
}

/// Runs one sweep ending at `now`.
///
/// # Errors
///
/// Returns `CronError::Snapshot` if the snapshot cannot be read or written,
/// or `CronError::Sweep` if the cursor or the scheduled store fails.
#[instrument(skip(config), fields(snapshot = %config.snapshot_path.display()))]
pub async fn run_once(config: &CronConfig, now: DateTime<Utc>) -> Result<SweepReport, CronError> {
    let path = &config.snapshot_path;
    let stores = snapshot::load(path).await.context(CronError::Snapshot {
        path: path.clone(),
        operation: "load",
    })?;
    let runtime = Arc::new(Runtime::in_memory(&stores, Arc::new(RolePermissions::new())));
    let promoter = Promoter::new(runtime).with_invalidator(Arc::new(LogInvalidator));
    let cursor = SweepCursor::new(Arc::new(FileCursorStore::new(config.cursor_path())))
        .with_origin(now - Duration::hours(config.sweep.initial_lookback_hours));

    let window = cursor.window(now).await.context(CronError::Sweep)?;
    if window.is_empty() {
        if window.end < window.start {
            warn!(
                start = %window.start,
                end = %window.end,
                "clock moved backwards; skipping sweep"
            );
        } else {
            debug!("nothing to sweep");
        }
        return Ok(SweepReport::default());
    }

    let report = promoter
        .promote_due(window.start, window.end)
        .await
        .context(CronError::Sweep)?;
    if report.total() > 0 {
        snapshot::save(path, &stores)
            .await
            .context(CronError::Snapshot {
                path: path.clone(),
                operation: "write",
            })?;
    }
    if report.is_complete() {
        cursor.advance(&window).await.context(CronError::Sweep)?;
    } else {
        warn!(retained = report.retained, "keeping the sweep cursor for a retry");
    }
    Ok(report)
}
