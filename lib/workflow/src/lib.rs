//! Content workflow engine for nodeflow.
//!
//! Content entities carry a workflow field holding the ID of a state. This
//! crate moves that field between states:
//!
//! - **States**: per-workflow states, including the implicit creation state
//! - **Config transitions**: the from → to matrix and the roles allowed on
//!   each edge
//! - **Aggregate**: the states a given user may choose next
//! - **Engine**: validation, authorization, execution and scheduling of a
//!   single transition, with observer hooks around it
//! - **History**: the append-only log of applied transitions
//!
//! Storage sits behind the traits in [`store`]; [`memory`] provides an
//! in-memory implementation that can be snapshotted to disk.
//!
//! # Example
//!
//! ```
//! use nodeflow_access::RolePermissions;
//! use nodeflow_core::{EntityType, StateId, WorkflowId};
//! use nodeflow_workflow::{
//!     ConfigStore, ConfigTransitionRepository, FieldBinding, MemoryStores, RequestContext,
//!     Runtime, StateRegistry, WorkflowConfig, creation_state_id,
//! };
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let editorial = WorkflowId::new("editorial");
//! let stores = MemoryStores::new().with_binding(FieldBinding::new(
//!     EntityType::new("article"),
//!     "state",
//!     editorial.clone(),
//! ));
//! stores
//!     .config
//!     .save_workflow(&WorkflowConfig::new(editorial.clone(), "Editorial"))
//!     .await
//!     .unwrap();
//! let runtime = Arc::new(Runtime::in_memory(&stores, Arc::new(RolePermissions::new())));
//!
//! let mut ctx = RequestContext::new();
//! let registry = StateRegistry::new(Arc::clone(&runtime));
//! let draft = registry
//!     .create_state(&mut ctx, &editorial, StateId::new("draft"), "Draft", 0)
//!     .await
//!     .unwrap();
//! ConfigTransitionRepository::new(runtime)
//!     .create_or_get(&mut ctx, &creation_state_id(&editorial), &draft.id)
//!     .await
//!     .unwrap();
//! # });
//! ```

pub mod aggregate;
pub mod config_transition;
pub mod context;
pub mod definition;
pub mod engine;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod graph;
pub mod history;
pub mod hooks;
pub mod memory;
pub mod registry;
pub mod repository;
pub mod runtime;
pub mod state;
pub mod store;
pub mod transition;

pub use aggregate::WorkflowAggregate;
pub use config_transition::{ConfigTransition, ConfigTransitionId};
pub use context::{OptionKey, RequestContext};
pub use definition::{CommentVisibility, Widget, Workflow, WorkflowConfig, WorkflowOptions};
pub use engine::{TransitionEngine, TransitionRequest, WATCHDOG_TARGET};
pub use entity::{BARE_FIELD, Entity, FieldAccessor, FieldMapAccessor, FieldSlot};
pub use envelope::Envelope;
pub use error::{ConfigurationError, Rejection, ValidationError, WorkflowError};
pub use graph::{TransitionGraph, unreachable_states};
pub use history::{HistoryEntry, HistoryId, HistoryQuery, SortOrder};
pub use hooks::{Directive, HookBus, OptionScope, TransitionObserver};
pub use memory::{
    MemoryConfigStore, MemoryEntityStore, MemoryHistoryStore, MemoryScheduledStore, MemoryStores,
    Snapshot,
};
pub use registry::{Deactivation, StateRegistry};
pub use repository::ConfigTransitionRepository;
pub use runtime::{FieldBinding, Runtime, SlotLocks};
pub use state::{State, StateMode, creation_state_id};
pub use store::{ConfigStore, EntityStore, HistoryStore, ScheduledTransitionStore};
pub use transition::{Transition, TransitionOption, TransitionPhase, TransitionTarget};

#[cfg(test)]
mod fixture;
