//! Scheduler for nodeflow transitions.
//!
//! This crate provides:
//!
//! - **Promotion**: replaying due scheduled transitions through the
//!   transition engine, dropping those whose content moved on
//! - **Sweeps**: consecutive, non-overlapping promotion windows tracked by a
//!   persistent cursor

pub mod error;
pub mod promote;
pub mod sweep;

pub use error::SchedulerError;
pub use promote::{CacheInvalidator, Promoter, SweepReport, default_comment};
pub use sweep::{
    CursorStore, FileCursorStore, MemoryCursorStore, SweepCursor, SweepWindow, Sweeper,
};

#[cfg(test)]
mod fixture;
