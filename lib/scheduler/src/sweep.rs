//! Sweep windows and the cursor that remembers the last one.
//!
//! Each sweep covers `(last_run, now)`. Timestamps have second granularity
//! and windows are open on both ends, so the cursor stores `now - 1s`: the
//! next window then starts right below the instant the previous one
//! excluded. Re-running a sweep at the same instant finds nothing new.

use crate::error::SchedulerError;
use crate::promote::{Promoter, SweepReport};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use nodeflow_core::{Result, StoreError, truncate_to_seconds};
use nodeflow_workflow::Envelope;
use rootcause::prelude::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Persists the end of the last sweep window.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Returns the stored cursor, if any sweep has run.
    async fn last_run(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Stores the cursor.
    async fn set_last_run(&self, last_run: DateTime<Utc>) -> Result<(), StoreError>;
}

/// In-memory `CursorStore`.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    last_run: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryCursorStore {
    /// Creates a store with no cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn last_run(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(*self.last_run.lock().await)
    }

    async fn set_last_run(&self, last_run: DateTime<Utc>) -> Result<(), StoreError> {
        *self.last_run.lock().await = Some(last_run);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorFile {
    last_run: DateTime<Utc>,
}

/// `CursorStore` backed by a JSON envelope file.
///
/// A missing file means no sweep has run yet.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    /// Creates a store reading and writing `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn last_run(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Unavailable {
                    details: format!("{}: {e}", self.key()),
                }
                .into());
            }
        };
        let envelope: Envelope<CursorFile> = Envelope::from_json_bytes(&bytes, &self.key())?;
        Ok(Some(envelope.into_payload().last_run))
    }

    async fn set_last_run(&self, last_run: DateTime<Utc>) -> Result<(), StoreError> {
        let bytes = Envelope::new(CursorFile { last_run }).to_json_bytes()?;
        tokio::fs::write(&self.path, bytes).await.map_err(|e| {
            StoreError::Unavailable {
                details: format!("{}: {e}", self.key()),
            }
            .into()
        })
    }
}

/// An open sweep window `(start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepWindow {
    /// Exclusive lower bound.
    pub start: DateTime<Utc>,
    /// Exclusive upper bound.
    pub end: DateTime<Utc>,
}

impl SweepWindow {
    /// Returns true if no whole second lies strictly inside the window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end - self.start <= Duration::seconds(1)
    }
}

/// Derives sweep windows from a `CursorStore`.
#[derive(Clone)]
pub struct SweepCursor {
    store: Arc<dyn CursorStore>,
    origin: DateTime<Utc>,
}

impl std::fmt::Debug for SweepCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepCursor")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl SweepCursor {
    /// Creates a cursor whose first window starts at the Unix epoch.
    #[must_use]
    pub fn new(store: Arc<dyn CursorStore>) -> Self {
        Self {
            store,
            origin: DateTime::UNIX_EPOCH,
        }
    }

    /// Sets where the first window starts.
    #[must_use]
    pub fn with_origin(mut self, origin: DateTime<Utc>) -> Self {
        self.origin = truncate_to_seconds(origin);
        self
    }

    /// Returns the window ending at `now`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Cursor` if the cursor cannot be read.
    pub async fn window(&self, now: DateTime<Utc>) -> Result<SweepWindow, SchedulerError> {
        let last_run = self
            .store
            .last_run()
            .await
            .context(SchedulerError::Cursor { operation: "read" })?;
        Ok(SweepWindow {
            start: last_run.unwrap_or(self.origin),
            end: truncate_to_seconds(now),
        })
    }

    /// Records that `window` has been swept.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Cursor` if the cursor cannot be written.
    pub async fn advance(&self, window: &SweepWindow) -> Result<(), SchedulerError> {
        self.store
            .set_last_run(window.end - Duration::seconds(1))
            .await
            .context(SchedulerError::Cursor { operation: "write" })
    }
}

/// Runs promotion sweeps over consecutive windows.
#[derive(Debug, Clone)]
pub struct Sweeper {
    promoter: Promoter,
    cursor: SweepCursor,
}

impl Sweeper {
    /// Creates a sweeper.
    #[must_use]
    pub fn new(promoter: Promoter, cursor: SweepCursor) -> Self {
        Self { promoter, cursor }
    }

    /// Promotes everything due since the previous sweep and advances the
    /// cursor to `now`.
    ///
    /// An empty window (clock unchanged or moved backwards) is a no-op. The
    /// cursor stays put while rows are retained, so the next sweep covers
    /// the same window again.
    ///
    /// # Errors
    ///
    /// Returns a `SchedulerError` if the cursor or the scheduled store fails.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, SchedulerError> {
        let window = self.cursor.window(now).await?;
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
        let report = self.promoter.promote_due(window.start, window.end).await?;
        if report.is_complete() {
            self.cursor.advance(&window).await?;
        } else {
            warn!(retained = report.retained, "keeping the sweep cursor for a retry");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{FIELD, desk, start};

    fn sweeper(runtime: Arc<nodeflow_workflow::Runtime>, store: Arc<dyn CursorStore>) -> Sweeper {
        Sweeper::new(
            Promoter::new(runtime),
            SweepCursor::new(store).with_origin(start()),
        )
    }

    #[tokio::test]
    async fn first_window_starts_at_the_origin() {
        let cursor = SweepCursor::new(Arc::new(MemoryCursorStore::new())).with_origin(start());
        let now = start() + Duration::minutes(10);
        let window = cursor.window(now).await.unwrap();
        assert_eq!(window, SweepWindow { start: start(), end: now });

        cursor.advance(&window).await.unwrap();
        let next = cursor.window(now + Duration::minutes(10)).await.unwrap();
        assert_eq!(next.start, now - Duration::seconds(1));
    }

    #[tokio::test]
    async fn sweeping_twice_at_the_same_instant_is_a_no_op() {
        let desk = desk().await;
        let article = desk.entity("article", FIELD, &desk.draft).await;
        desk.schedule(&article, FIELD, &desk.review, start() + Duration::hours(1), "")
            .await;
        let sweeper = sweeper(Arc::clone(&desk.runtime), Arc::new(MemoryCursorStore::new()));
        let now = start() + Duration::hours(2);

        let first = sweeper.sweep(now).await.unwrap();
        assert_eq!(first.promoted, 1);
        let second = sweeper.sweep(now).await.unwrap();
        assert_eq!(second, SweepReport::default());
        assert_eq!(desk.stores.history.len().await, 1);
    }

    #[tokio::test]
    async fn consecutive_sweeps_leave_no_gap() {
        let desk = desk().await;
        let article = desk.entity("article", FIELD, &desk.draft).await;
        let due = start() + Duration::hours(1);
        desk.schedule(&article, FIELD, &desk.review, due, "").await;
        let sweeper = sweeper(Arc::clone(&desk.runtime), Arc::new(MemoryCursorStore::new()));

        assert_eq!(sweeper.sweep(due).await.unwrap().promoted, 0);
        assert_eq!(
            sweeper.sweep(due + Duration::minutes(5)).await.unwrap().promoted,
            1
        );
        assert_eq!(
            desk.state_of(&article, FIELD).await,
            Some(desk.review.clone())
        );
    }

    #[tokio::test]
    async fn clock_moving_backwards_skips_the_sweep() {
        let desk = desk().await;
        let store = Arc::new(MemoryCursorStore::new());
        store.set_last_run(start() + Duration::hours(3)).await.unwrap();
        let sweeper = sweeper(Arc::clone(&desk.runtime), store.clone());

        let report = sweeper.sweep(start()).await.unwrap();
        assert_eq!(report, SweepReport::default());
        assert_eq!(
            store.last_run().await.unwrap(),
            Some(start() + Duration::hours(3))
        );
    }

    #[tokio::test]
    async fn file_cursor_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCursorStore::new(dir.path().join("cursor.json"));
        assert_eq!(store.last_run().await.unwrap(), None);

        store.set_last_run(start()).await.unwrap();
        assert_eq!(store.last_run().await.unwrap(), Some(start()));

        let reopened = FileCursorStore::new(store.path());
        assert_eq!(reopened.last_run().await.unwrap(), Some(start()));
    }

    #[tokio::test]
    async fn corrupt_cursor_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        std::fs::write(&path, b"yesterday").unwrap();

        let err = FileCursorStore::new(&path).last_run().await.unwrap_err();
        assert!(format!("{err}").contains("cursor.json"));
    }
}
