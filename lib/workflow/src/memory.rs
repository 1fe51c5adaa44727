//! In-memory store implementations.
//!
//! These back tests and the cron binary's snapshot file. Every store keeps
//! its tables behind an async mutex; a `Snapshot` captures all of them at
//! once so they can be written to disk and loaded back.

use crate::config_transition::{ConfigTransition, ConfigTransitionId};
use crate::definition::WorkflowConfig;
use crate::entity::{Entity, FieldSlot};
use crate::history::{HistoryEntry, HistoryId, HistoryQuery};
use crate::runtime::FieldBinding;
use crate::state::State;
use crate::store::{ConfigStore, EntityStore, HistoryStore, ScheduledTransitionStore};
use crate::transition::Transition;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nodeflow_access::RoleSet;
use nodeflow_core::{EntityId, EntityType, Result, StateId, StoreError, WorkflowId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Every table of the in-memory stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Workflow configurations.
    #[serde(default)]
    pub workflows: Vec<WorkflowConfig>,
    /// States of every workflow.
    #[serde(default)]
    pub states: Vec<State>,
    /// Configured transitions in store order.
    #[serde(default)]
    pub transitions: Vec<ConfigTransition>,
    /// Content entities.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Audit log.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Pending scheduled transitions.
    #[serde(default)]
    pub scheduled: Vec<Transition>,
    /// Field bindings.
    #[serde(default)]
    pub bindings: Vec<FieldBinding>,
}

#[derive(Debug, Default)]
struct ConfigTables {
    workflows: BTreeMap<WorkflowId, WorkflowConfig>,
    states: BTreeMap<StateId, State>,
    transitions: Vec<ConfigTransition>,
    next_transition_id: u64,
}

/// In-memory `ConfigStore`.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    tables: Mutex<ConfigTables>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn from_parts(
        workflows: Vec<WorkflowConfig>,
        states: Vec<State>,
        transitions: Vec<ConfigTransition>,
    ) -> Self {
        let next_transition_id = transitions
            .iter()
            .map(|t| t.id.get())
            .max()
            .unwrap_or(0);
        Self {
            tables: Mutex::new(ConfigTables {
                workflows: workflows.into_iter().map(|w| (w.id.clone(), w)).collect(),
                states: states.into_iter().map(|s| (s.id.clone(), s)).collect(),
                transitions,
                next_transition_id,
            }),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn workflow(&self, id: &WorkflowId) -> Result<Option<WorkflowConfig>, StoreError> {
        Ok(self.tables.lock().await.workflows.get(id).cloned())
    }

    async fn workflows(&self) -> Result<Vec<WorkflowConfig>, StoreError> {
        Ok(self.tables.lock().await.workflows.values().cloned().collect())
    }

    async fn save_workflow(&self, config: &WorkflowConfig) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .workflows
            .insert(config.id.clone(), config.clone());
        Ok(())
    }

    async fn states(&self, workflow_id: &WorkflowId) -> Result<Vec<State>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .states
            .values()
            .filter(|s| &s.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn state(&self, id: &StateId) -> Result<Option<State>, StoreError> {
        Ok(self.tables.lock().await.states.get(id).cloned())
    }

    async fn save_state(&self, state: &State) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .states
            .insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn transitions(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Vec<ConfigTransition>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .transitions
            .iter()
            .filter(|t| &t.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn transitions_from(&self, from: &StateId) -> Result<Vec<ConfigTransition>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .transitions
            .iter()
            .filter(|t| &t.from == from)
            .cloned()
            .collect())
    }

    async fn insert_transition(
        &self,
        workflow_id: &WorkflowId,
        from: &StateId,
        to: &StateId,
        roles: RoleSet,
    ) -> Result<ConfigTransition, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.next_transition_id += 1;
        let transition = ConfigTransition::new(
            ConfigTransitionId::new(tables.next_transition_id),
            workflow_id.clone(),
            from.clone(),
            to.clone(),
        )
        .with_roles(roles);
        tables.transitions.push(transition.clone());
        Ok(transition)
    }

    async fn update_transition(&self, transition: &ConfigTransition) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.transitions.iter_mut().find(|t| t.id == transition.id) else {
            return Err(StoreError::Corrupt {
                key: format!("config_transition:{}", transition.id),
                details: "no such transition".to_string(),
            }
            .into());
        };
        *existing = transition.clone();
        Ok(())
    }

    async fn delete_transitions_for_state(&self, state: &StateId) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.transitions.len();
        tables
            .transitions
            .retain(|t| &t.from != state && &t.to != state);
        Ok(before - tables.transitions.len())
    }
}

#[derive(Debug, Default)]
struct EntityTable {
    entities: BTreeMap<(EntityType, EntityId), Entity>,
    next_id: u64,
}

/// In-memory `EntityStore`. New entities get sequential numeric IDs.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    table: Mutex<EntityTable>,
}

impl MemoryEntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn from_entities(entities: Vec<Entity>) -> Self {
        let mut table = EntityTable::default();
        for entity in entities {
            if let Some(id) = entity.id.clone() {
                if let Ok(numeric) = id.as_str().parse::<u64>() {
                    table.next_id = table.next_id.max(numeric);
                }
                table
                    .entities
                    .insert((entity.entity_type.clone(), id), entity);
            }
        }
        Self {
            table: Mutex::new(table),
        }
    }

    /// Returns every stored entity.
    pub async fn all(&self) -> Vec<Entity> {
        self.table.lock().await.entities.values().cloned().collect()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn load(
        &self,
        entity_type: &EntityType,
        id: &EntityId,
    ) -> Result<Option<Entity>, StoreError> {
        Ok(self
            .table
            .lock()
            .await
            .entities
            .get(&(entity_type.clone(), id.clone()))
            .cloned())
    }

    async fn save(&self, entity: &mut Entity) -> Result<bool, StoreError> {
        let mut table = self.table.lock().await;
        let id = match &entity.id {
            Some(id) => id.clone(),
            None => {
                table.next_id += 1;
                let id = EntityId::new(table.next_id.to_string());
                entity.id = Some(id.clone());
                id
            }
        };
        table
            .entities
            .insert((entity.entity_type.clone(), id), entity.clone());
        Ok(true)
    }

    async fn entities_in_state(&self, state: &StateId) -> Result<Vec<FieldSlot>, StoreError> {
        let table = self.table.lock().await;
        let mut slots = Vec::new();
        for ((entity_type, entity_id), entity) in &table.entities {
            for (field_name, value) in &entity.fields {
                if value == state {
                    slots.push(FieldSlot::new(
                        entity_type.clone(),
                        entity_id.clone(),
                        field_name.clone(),
                    ));
                }
            }
        }
        Ok(slots)
    }
}

#[derive(Debug, Default)]
struct HistoryTable {
    entries: Vec<HistoryEntry>,
    next_id: u64,
}

/// In-memory `HistoryStore`.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    table: Mutex<HistoryTable>,
}

impl MemoryHistoryStore {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let next_id = entries.iter().map(|e| e.id.get()).max().unwrap_or(0);
        Self {
            table: Mutex::new(HistoryTable { entries, next_id }),
        }
    }

    /// Returns the number of entries.
    pub async fn len(&self) -> usize {
        self.table.lock().await.entries.len()
    }

    /// Returns true if nothing was recorded.
    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.entries.is_empty()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn record(&self, transition: &Transition) -> Result<HistoryEntry, StoreError> {
        let mut table = self.table.lock().await;
        let id = HistoryId::new(table.next_id + 1);
        let entry =
            HistoryEntry::from_transition(id, transition).ok_or_else(|| StoreError::Corrupt {
                key: format!("transition:{}", transition.id),
                details: "transition is not bound to a saved entity".to_string(),
            })?;
        table.next_id = id.get();
        table.entries.push(entry.clone());
        Ok(entry)
    }

    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(query.apply(&self.table.lock().await.entries))
    }
}

/// In-memory `ScheduledTransitionStore`.
#[derive(Debug, Default)]
pub struct MemoryScheduledStore {
    rows: Mutex<BTreeMap<FieldSlot, Transition>>,
}

impl MemoryScheduledStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn from_rows(rows: Vec<Transition>) -> Self {
        Self {
            rows: Mutex::new(
                rows.into_iter()
                    .filter_map(|t| t.slot().map(|slot| (slot, t)))
                    .collect(),
            ),
        }
    }

    /// Returns the number of pending transitions.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    /// Returns true if nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl ScheduledTransitionStore for MemoryScheduledStore {
    async fn save(&self, transition: &Transition) -> Result<(), StoreError> {
        let slot = transition.slot().ok_or_else(|| StoreError::Corrupt {
            key: format!("transition:{}", transition.id),
            details: "scheduled transition is not bound to a saved entity".to_string(),
        })?;
        self.rows.lock().await.insert(slot, transition.clone());
        Ok(())
    }

    async fn for_slot(&self, slot: &FieldSlot) -> Result<Option<Transition>, StoreError> {
        Ok(self.rows.lock().await.get(slot).cloned())
    }

    async fn due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transition>, StoreError> {
        let mut due: Vec<Transition> = self
            .rows
            .lock()
            .await
            .values()
            .filter(|t| t.timestamp > start && t.timestamp < end)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn delete(&self, slot: &FieldSlot) -> Result<bool, StoreError> {
        Ok(self.rows.lock().await.remove(slot).is_some())
    }
}

/// A full set of in-memory stores plus the field bindings.
#[derive(Debug, Clone, Default)]
pub struct MemoryStores {
    /// Workflow configuration.
    pub config: Arc<MemoryConfigStore>,
    /// Content entities.
    pub entities: Arc<MemoryEntityStore>,
    /// Audit log.
    pub history: Arc<MemoryHistoryStore>,
    /// Pending scheduled transitions.
    pub scheduled: Arc<MemoryScheduledStore>,
    bindings: Vec<FieldBinding>,
}

impl MemoryStores {
    /// Creates empty stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads stores from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            config: Arc::new(MemoryConfigStore::from_parts(
                snapshot.workflows,
                snapshot.states,
                snapshot.transitions,
            )),
            entities: Arc::new(MemoryEntityStore::from_entities(snapshot.entities)),
            history: Arc::new(MemoryHistoryStore::from_entries(snapshot.history)),
            scheduled: Arc::new(MemoryScheduledStore::from_rows(snapshot.scheduled)),
            bindings: snapshot.bindings,
        }
    }

    /// Adds a field binding.
    #[must_use]
    pub fn with_binding(mut self, binding: FieldBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Returns the field bindings.
    #[must_use]
    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    /// Captures every table.
    pub async fn snapshot(&self) -> Snapshot {
        let config = self.config.tables.lock().await;
        let entities = self.entities.table.lock().await;
        let history = self.history.table.lock().await;
        let scheduled = self.scheduled.rows.lock().await;
        Snapshot {
            workflows: config.workflows.values().cloned().collect(),
            states: config.states.values().cloned().collect(),
            transitions: config.transitions.clone(),
            entities: entities.entities.values().cloned().collect(),
            history: history.entries.clone(),
            scheduled: scheduled.values().cloned().collect(),
            bindings: self.bindings.clone(),
        }
    }
}
