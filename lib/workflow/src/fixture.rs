//! Editorial workflow over in-memory stores, shared by unit tests.
//!
//! States: creation → draft → review → published → draft.
//! Authors may create drafts and send them to review; editors publish and
//! unpublish.

use crate::context::RequestContext;
use crate::definition::WorkflowConfig;
use crate::engine::TransitionEngine;
use crate::entity::Entity;
use crate::hooks::HookBus;
use crate::memory::MemoryStores;
use crate::registry::StateRegistry;
use crate::repository::ConfigTransitionRepository;
use crate::runtime::{FieldBinding, Runtime};
use crate::state::creation_state_id;
use crate::store::{ConfigStore, EntityStore};
use chrono::{DateTime, TimeZone, Utc};
use nodeflow_access::{Account, RolePermissions, RoleSet};
use nodeflow_core::{EntityType, FixedClock, StateId, UserId, WorkflowId};
use std::sync::Arc;

pub(crate) const ARTICLE: &str = "article";
pub(crate) const FIELD: &str = "field_status";

pub(crate) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub(crate) struct Editorial {
    pub stores: MemoryStores,
    pub runtime: Arc<Runtime>,
    pub clock: Arc<FixedClock>,
    pub workflow_id: WorkflowId,
    pub creation: StateId,
    pub draft: StateId,
    pub review: StateId,
    pub published: StateId,
}

pub(crate) async fn editorial() -> Editorial {
    editorial_with(HookBus::new(), RolePermissions::new()).await
}

pub(crate) async fn editorial_with(hooks: HookBus, permissions: RolePermissions) -> Editorial {
    let workflow_id = WorkflowId::new("editorial");
    let stores = MemoryStores::new().with_binding(FieldBinding::new(
        EntityType::new(ARTICLE),
        FIELD,
        workflow_id.clone(),
    ));
    stores
        .config
        .save_workflow(&WorkflowConfig::new(workflow_id.clone(), "Editorial"))
        .await
        .unwrap();
    let clock = Arc::new(FixedClock::new(start()));
    let runtime = Arc::new(
        Runtime::in_memory(&stores, Arc::new(permissions))
            .with_hooks(hooks)
            .with_clock(clock.clone()),
    );

    let mut ctx = RequestContext::new();
    let registry = StateRegistry::new(Arc::clone(&runtime));
    let mut ids = Vec::new();
    for (id, label, weight) in [
        ("draft", "Draft", 0),
        ("review", "Review", 1),
        ("published", "Published", 2),
    ] {
        let state = registry
            .create_state(&mut ctx, &workflow_id, StateId::new(id), label, weight)
            .await
            .unwrap();
        ids.push(state.id);
    }
    let [draft, review, published]: [StateId; 3] = ids.try_into().unwrap();

    let creation = creation_state_id(&workflow_id);
    let editor: RoleSet = ["editor"].into_iter().collect();
    let repository = ConfigTransitionRepository::new(Arc::clone(&runtime));
    for (from, to, roles) in [
        (&creation, &draft, RoleSet::author()),
        (&draft, &review, RoleSet::author()),
        (&review, &published, editor.clone()),
        (&published, &draft, editor),
    ] {
        repository
            .set_roles(&mut ctx, from, to, roles)
            .await
            .unwrap();
    }

    Editorial {
        stores,
        runtime,
        clock,
        workflow_id,
        creation,
        draft,
        review,
        published,
    }
}

impl Editorial {
    pub fn engine(&self) -> TransitionEngine {
        TransitionEngine::new(Arc::clone(&self.runtime))
    }

    /// Saves an article owned by `owner` sitting in `state`.
    pub async fn article(&self, owner: UserId, state: &StateId) -> Entity {
        let mut entity = Entity::new(EntityType::new(ARTICLE), "Spring issue")
            .with_owner(owner)
            .with_field(FIELD, state.clone());
        self.stores.entities.save(&mut entity).await.unwrap();
        entity
    }

    /// Reads the stored workflow value of an article.
    pub async fn state_of(&self, entity: &Entity) -> Option<StateId> {
        let id = entity.id.clone().unwrap();
        self.stores
            .entities
            .load(&entity.entity_type, &id)
            .await
            .unwrap()
            .and_then(|stored| stored.fields.get(FIELD).cloned())
    }
}

pub(crate) fn writer() -> Account {
    Account::new(UserId::new(), "wren").with_role("writer")
}

pub(crate) fn editor() -> Account {
    Account::new(UserId::new(), "eddie").with_role("editor")
}
