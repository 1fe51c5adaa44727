//! Audit log of executed transitions.
//!
//! History is append-only. Timestamps only have second granularity, so
//! entries recorded within the same second are ordered by their
//! store-assigned ID.

use crate::transition::Transition;
use chrono::{DateTime, Utc};
use nodeflow_core::{EntityId, EntityType, StateId, TransitionId, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Store-assigned, auto-incrementing history entry ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryId(u64);

impl HistoryId {
    /// Wraps a raw store id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw store id.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recorded, executed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Store-assigned ID.
    pub id: HistoryId,
    /// ID of the executed transition.
    pub transition_id: TransitionId,
    /// Entity type.
    pub entity_type: EntityType,
    /// Entity ID.
    pub entity_id: EntityId,
    /// Entity revision at execution time.
    pub revision: Option<u64>,
    /// Workflow field name.
    pub field_name: String,
    /// Language code.
    pub language: String,
    /// Previous state.
    pub from_sid: StateId,
    /// New state.
    pub to_sid: StateId,
    /// Acting user.
    pub uid: UserId,
    /// Execution time.
    pub timestamp: DateTime<Utc>,
    /// Comment.
    pub comment: String,
}

impl HistoryEntry {
    /// Builds the entry for an executed transition.
    ///
    /// Returns `None` if the transition is not bound to a saved entity.
    #[must_use]
    pub fn from_transition(id: HistoryId, transition: &Transition) -> Option<Self> {
        let target = transition.target.as_ref()?;
        let entity_id = target.entity_id.clone()?;
        Some(Self {
            id,
            transition_id: transition.id,
            entity_type: target.entity_type.clone(),
            entity_id,
            revision: target.revision,
            field_name: target.field_name.clone(),
            language: target.language.clone(),
            from_sid: transition.from_sid.clone(),
            to_sid: transition.to_sid.clone(),
            uid: transition.uid,
            timestamp: transition.timestamp,
            comment: transition.comment.clone(),
        })
    }
}

/// Result ordering of a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Latest timestamp first, then highest ID.
    #[default]
    NewestFirst,
    /// Earliest timestamp first, then lowest ID.
    OldestFirst,
}

impl SortOrder {
    /// Compares two entries under this order.
    #[must_use]
    pub fn compare(&self, a: &HistoryEntry, b: &HistoryEntry) -> Ordering {
        let ascending = a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id));
        match self {
            Self::NewestFirst => ascending.reverse(),
            Self::OldestFirst => ascending,
        }
    }
}

/// Selects history entries of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Entity type.
    pub entity_type: EntityType,
    /// Entity IDs; empty selects every entity of the type.
    pub entity_ids: Vec<EntityId>,
    /// Restrict to one field.
    pub field_name: Option<String>,
    /// Maximum number of entries.
    pub limit: Option<usize>,
    /// Ordering.
    pub order: SortOrder,
}

impl HistoryQuery {
    /// Queries the history of one entity type.
    #[must_use]
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            entity_ids: Vec::new(),
            field_name: None,
            limit: None,
            order: SortOrder::default(),
        }
    }

    /// Adds an entity ID.
    #[must_use]
    pub fn entity(mut self, entity_id: EntityId) -> Self {
        self.entity_ids.push(entity_id);
        self
    }

    /// Restricts to a field.
    #[must_use]
    pub fn field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Limits the number of entries.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Returns true if `entry` is selected by this query.
    #[must_use]
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        entry.entity_type == self.entity_type
            && (self.entity_ids.is_empty() || self.entity_ids.contains(&entry.entity_id))
            && self
                .field_name
                .as_ref()
                .is_none_or(|field| field == &entry.field_name)
    }

    /// Filters, orders and limits `entries`.
    #[must_use]
    pub fn apply<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a HistoryEntry>,
    ) -> Vec<HistoryEntry> {
        let mut selected: Vec<HistoryEntry> = entries
            .into_iter()
            .filter(|entry| self.matches(entry))
            .cloned()
            .collect();
        selected.sort_by(|a, b| self.order.compare(a, b));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}
