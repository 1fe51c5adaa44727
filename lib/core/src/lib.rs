//! Core domain types and utilities for nodeflow.
//!
//! This crate provides the identifiers, clock abstraction and error handling
//! foundation shared by the workflow engine, the scheduler and the cron binary.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, FixedClock, SystemClock, truncate_to_seconds};
pub use error::{Result, StoreError};
pub use id::{
    EntityId, EntityType, ParseIdError, RoleId, StateId, TransitionId, UserId, WorkflowId,
    is_machine_name,
};
