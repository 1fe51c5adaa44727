//! Promotion of due scheduled transitions.
//!
//! A scheduled transition becomes due once its timestamp falls strictly
//! inside the sweep window. Promotion replays it through the transition
//! engine as a forced, immediate transition on behalf of the user who
//! scheduled it. Rows whose content has since moved to another state are
//! dropped without touching history.

use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use nodeflow_access::Account;
use nodeflow_core::Result;
use nodeflow_workflow::{
    FieldSlot, Rejection, RequestContext, Runtime, Transition, TransitionEngine, TransitionPhase,
    WorkflowError,
};
use rootcause::prelude::ResultExt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Clears host-side caches of rendered content.
///
/// Called after a sweep that changed the state of a bare entity, whose
/// workflow value is typically shown on cached pages.
pub trait CacheInvalidator: Send + Sync {
    /// Drops cached pages.
    fn invalidate(&self);
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Transitions applied.
    pub promoted: usize,
    /// Rows dropped because the content moved on or no longer exists.
    pub abandoned: usize,
    /// Rows the engine declined to apply.
    pub failed: usize,
    /// Rows kept for the next sweep after a store or permission-backend
    /// error.
    pub retained: usize,
    /// A bare entity changed state; cached pages are stale.
    pub invalidate_caches: bool,
}

impl SweepReport {
    /// Returns the number of rows handled.
    #[must_use]
    pub fn total(&self) -> usize {
        self.promoted + self.abandoned + self.failed + self.retained
    }

    /// Returns true if no row was kept for a retry, so the swept window
    /// never needs to be visited again.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.retained == 0
    }
}

enum Outcome {
    Promoted,
    Abandoned,
    Failed,
}

/// Default comment of a promoted transition that has none.
#[must_use]
pub fn default_comment(transition: &Transition) -> String {
    format!("Scheduled by user {}.", transition.uid)
}

/// Promotes due scheduled transitions.
#[derive(Clone)]
pub struct Promoter {
    runtime: Arc<Runtime>,
    engine: TransitionEngine,
    invalidator: Option<Arc<dyn CacheInvalidator>>,
}

impl std::fmt::Debug for Promoter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promoter")
            .field("runtime", &self.runtime)
            .field("invalidator", &self.invalidator.is_some())
            .finish_non_exhaustive()
    }
}

impl Promoter {
    /// Creates a promoter over `runtime`.
    #[must_use]
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            engine: TransitionEngine::new(Arc::clone(&runtime)),
            runtime,
            invalidator: None,
        }
    }

    /// Sets the cache invalidator.
    #[must_use]
    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    /// Promotes every scheduled transition due strictly between
    /// `window_start` and `window_end`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidWindow` if the window is empty, or
    /// `SchedulerError::LoadDue` if the scheduled store fails. A failure to
    /// promote a single row is logged and counted in the report instead; the
    /// row is kept so that a later sweep over the same window retries it.
    #[instrument(skip(self))]
    pub async fn promote_due(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<SweepReport, SchedulerError> {
        if window_start >= window_end {
            return Err(SchedulerError::InvalidWindow {
                start: window_start,
                end: window_end,
            }
            .into());
        }
        let due = self
            .runtime
            .scheduled()
            .due_between(window_start, window_end)
            .await
            .context(SchedulerError::LoadDue)?;
        debug!(count = due.len(), "due scheduled transitions loaded");

        let mut ctx = RequestContext::new();
        let mut report = SweepReport::default();
        for transition in due {
            let Some(slot) = transition.slot() else {
                warn!(transition = %transition.id, "scheduled transition has no entity; skipping");
                report.failed += 1;
                continue;
            };
            let pending = transition.clone();
            let outcome = match self.promote(&mut ctx, transition, &slot).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(
                        %slot,
                        error = %err,
                        "failed to promote scheduled transition; keeping it"
                    );
                    report.retained += 1;
                    self.retain(&pending, &slot).await;
                    continue;
                }
            };
            match outcome {
                Outcome::Promoted => report.promoted += 1,
                Outcome::Abandoned => report.abandoned += 1,
                Outcome::Failed => report.failed += 1,
            }
            if let Err(err) = self.runtime.scheduled().delete(&slot).await {
                error!(%slot, error = %err, "failed to delete scheduled transition");
            }
        }

        report.invalidate_caches = ctx.bare_entity_executed();
        if report.invalidate_caches {
            if let Some(invalidator) = &self.invalidator {
                invalidator.invalidate();
            }
        }
        info!(
            promoted = report.promoted,
            abandoned = report.abandoned,
            failed = report.failed,
            retained = report.retained,
            "scheduled transitions swept"
        );
        Ok(report)
    }

    /// Puts `pending` back if the failed attempt already removed it.
    async fn retain(&self, pending: &Transition, slot: &FieldSlot) {
        match self.runtime.scheduled().for_slot(slot).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(err) = self.runtime.scheduled().save(pending).await {
                    error!(%slot, error = %err, "failed to restore scheduled transition");
                }
            }
            Err(err) => error!(%slot, error = %err, "failed to check scheduled transition"),
        }
    }

    async fn promote(
        &self,
        ctx: &mut RequestContext,
        mut transition: Transition,
        slot: &FieldSlot,
    ) -> Result<Outcome, WorkflowError> {
        let entity = self
            .runtime
            .entities()
            .load(&slot.entity_type, &slot.entity_id)
            .await
            .context(WorkflowError::Store {
                operation: "load entity",
            })?;
        let Some(entity) = entity else {
            info!(%slot, "content of scheduled transition no longer exists");
            return Ok(Outcome::Abandoned);
        };

        if !transition.has_comment() {
            transition.comment = default_comment(&transition);
        }
        transition.scheduled = false;
        transition.forced = true;
        transition.attach_entity(entity);

        let account = Account::new(transition.uid, format!("user {}", transition.uid));
        let result = self.engine
            .apply(ctx, &mut transition, &account, true)
            .await?;

        if transition.phase == TransitionPhase::Executed && result == transition.to_sid {
            info!(%slot, state = %result, "scheduled transition promoted");
            return Ok(Outcome::Promoted);
        }
        match transition.rejection() {
            Some(Rejection::Conflict { expected, actual }) => {
                info!(
                    %slot,
                    %expected,
                    actual = ?actual,
                    "content left the scheduled from-state; dropping scheduled transition"
                );
                Ok(Outcome::Abandoned)
            }
            rejection => {
                warn!(%slot, rejection = ?rejection, "scheduled transition declined");
                Ok(Outcome::Failed)
            }
        }
    }
}
