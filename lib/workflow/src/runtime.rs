//! The collaborator container shared by every workflow component.
//!
//! A `Runtime` is built once by the host and shared behind an `Arc`. It holds
//! the stores, the permission checker, the hook bus, the clock, the field
//! bindings and the per-field locks. Request-scoped state lives in
//! `RequestContext`, never here.

use crate::entity::{FieldAccessor, FieldMapAccessor, FieldSlot};
use crate::error::{ConfigurationError, WorkflowError};
use crate::hooks::HookBus;
use crate::memory::MemoryStores;
use crate::store::{ConfigStore, EntityStore, HistoryStore, ScheduledTransitionStore};
use nodeflow_access::PermissionChecker;
use nodeflow_core::{Clock, EntityType, Result, SystemClock, WorkflowId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Attaches a workflow to an entity field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBinding {
    /// Entity type.
    pub entity_type: EntityType,
    /// Field name; empty for a bare-entity workflow.
    pub field_name: String,
    /// The governing workflow.
    pub workflow_id: WorkflowId,
}

impl FieldBinding {
    /// Creates a binding.
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        field_name: impl Into<String>,
        workflow_id: WorkflowId,
    ) -> Self {
        Self {
            entity_type,
            field_name: field_name.into(),
            workflow_id,
        }
    }
}

/// One async mutex per entity field.
#[derive(Debug, Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<FieldSlot, Arc<tokio::sync::Mutex<()>>>>,
}

impl SlotLocks {
    /// Waits for exclusive access to `slot`.
    pub async fn acquire(&self, slot: &FieldSlot) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(slot.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Collaborators of the workflow engine.
pub struct Runtime {
    config: Arc<dyn ConfigStore>,
    entities: Arc<dyn EntityStore>,
    history: Arc<dyn HistoryStore>,
    scheduled: Arc<dyn ScheduledTransitionStore>,
    permissions: Arc<dyn PermissionChecker>,
    hooks: HookBus,
    clock: Arc<dyn Clock>,
    bindings: HashMap<(EntityType, String), WorkflowId>,
    accessors: HashMap<EntityType, Arc<dyn FieldAccessor>>,
    default_accessor: Arc<dyn FieldAccessor>,
    locks: SlotLocks,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("hooks", &self.hooks)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Creates a runtime over the given collaborators, using the system
    /// clock and no observers.
    #[must_use]
    pub fn new(
        config: Arc<dyn ConfigStore>,
        entities: Arc<dyn EntityStore>,
        history: Arc<dyn HistoryStore>,
        scheduled: Arc<dyn ScheduledTransitionStore>,
        permissions: Arc<dyn PermissionChecker>,
    ) -> Self {
        Self {
            config,
            entities,
            history,
            scheduled,
            permissions,
            hooks: HookBus::new(),
            clock: Arc::new(SystemClock),
            bindings: HashMap::new(),
            accessors: HashMap::new(),
            default_accessor: Arc::new(FieldMapAccessor),
            locks: SlotLocks::default(),
        }
    }

    /// Creates a runtime over in-memory stores.
    #[must_use]
    pub fn in_memory(stores: &MemoryStores, permissions: Arc<dyn PermissionChecker>) -> Self {
        let mut runtime = Self::new(
            stores.config.clone(),
            stores.entities.clone(),
            stores.history.clone(),
            stores.scheduled.clone(),
            permissions,
        );
        for binding in stores.bindings() {
            runtime.bind(binding.clone());
        }
        runtime
    }

    /// Replaces the hook bus.
    #[must_use]
    pub fn with_hooks(mut self, hooks: HookBus) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attaches a workflow to an entity field.
    #[must_use]
    pub fn with_binding(mut self, binding: FieldBinding) -> Self {
        self.bind(binding);
        self
    }

    /// Registers the field accessor of an entity type.
    #[must_use]
    pub fn with_accessor(
        mut self,
        entity_type: EntityType,
        accessor: Arc<dyn FieldAccessor>,
    ) -> Self {
        self.accessors.insert(entity_type, accessor);
        self
    }

    fn bind(&mut self, binding: FieldBinding) {
        self.bindings.insert(
            (binding.entity_type, binding.field_name),
            binding.workflow_id,
        );
    }

    /// Returns the config store.
    #[must_use]
    pub fn config(&self) -> &Arc<dyn ConfigStore> {
        &self.config
    }

    /// Returns the entity store.
    #[must_use]
    pub fn entities(&self) -> &Arc<dyn EntityStore> {
        &self.entities
    }

    /// Returns the history store.
    #[must_use]
    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Returns the scheduled-transition store.
    #[must_use]
    pub fn scheduled(&self) -> &Arc<dyn ScheduledTransitionStore> {
        &self.scheduled
    }

    /// Returns the permission checker.
    #[must_use]
    pub fn permissions(&self) -> &Arc<dyn PermissionChecker> {
        &self.permissions
    }

    /// Returns the hook bus.
    #[must_use]
    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the per-field locks.
    #[must_use]
    pub fn locks(&self) -> &SlotLocks {
        &self.locks
    }

    /// Returns the field accessor for an entity type.
    #[must_use]
    pub fn accessor(&self, entity_type: &EntityType) -> Arc<dyn FieldAccessor> {
        self.accessors
            .get(entity_type)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default_accessor))
    }

    /// Returns the workflow attached to an entity field.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::FieldNotBound` if no workflow is attached.
    pub fn bound_workflow(
        &self,
        entity_type: &EntityType,
        field_name: &str,
    ) -> Result<WorkflowId, WorkflowError> {
        self.bindings
            .get(&(entity_type.clone(), field_name.to_string()))
            .cloned()
            .ok_or_else(|| {
                WorkflowError::from(ConfigurationError::FieldNotBound {
                    entity_type: entity_type.clone(),
                    field_name: field_name.to_string(),
                })
                .into()
            })
    }
}
