//! Editorial workflow with pending scheduled transitions, shared by unit
//! tests.

use chrono::{DateTime, TimeZone, Utc};
use nodeflow_access::{Account, RolePermissions, RoleSet};
use nodeflow_core::{EntityType, FixedClock, StateId, UserId, WorkflowId};
use nodeflow_workflow::{
    BARE_FIELD, ConfigStore, ConfigTransitionRepository, Entity, EntityStore, FieldBinding,
    MemoryStores, RequestContext, Runtime, StateRegistry, Transition, TransitionEngine,
    TransitionRequest, WorkflowConfig,
};
use std::sync::Arc;

pub(crate) const FIELD: &str = "field_status";

pub(crate) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub(crate) struct Desk {
    pub stores: MemoryStores,
    pub runtime: Arc<Runtime>,
    pub draft: StateId,
    pub review: StateId,
    pub published: StateId,
}

pub(crate) async fn desk() -> Desk {
    let workflow_id = WorkflowId::new("editorial");
    let stores = MemoryStores::new()
        .with_binding(FieldBinding::new(EntityType::new("article"), FIELD, workflow_id.clone()))
        .with_binding(FieldBinding::new(EntityType::new("page"), BARE_FIELD, workflow_id.clone()));
    stores
        .config
        .save_workflow(&WorkflowConfig::new(workflow_id.clone(), "Editorial"))
        .await
        .unwrap();
    let runtime = Arc::new(
        Runtime::in_memory(&stores, Arc::new(RolePermissions::new()))
            .with_clock(Arc::new(FixedClock::new(start()))),
    );

    let registry = StateRegistry::new(Arc::clone(&runtime));
    let mut ctx = RequestContext::new();
    let mut ids = Vec::new();
    for (id, weight) in [("draft", 0), ("review", 1), ("published", 2)] {
        let state = registry
            .create_state(&mut ctx, &workflow_id, StateId::new(id), id, weight)
            .await
            .unwrap();
        ids.push(state.id);
    }
    let [draft, review, published]: [StateId; 3] = ids.try_into().unwrap();
    let repository = ConfigTransitionRepository::new(Arc::clone(&runtime));
    repository
        .set_roles(&mut ctx, &draft, &review, RoleSet::author())
        .await
        .unwrap();

    Desk {
        stores,
        runtime,
        draft,
        review,
        published,
    }
}

impl Desk {
    /// Saves an entity of `entity_type` whose `field` sits in `state`.
    pub async fn entity(&self, entity_type: &str, field: &str, state: &StateId) -> Entity {
        let mut entity = Entity::new(EntityType::new(entity_type), "Spring issue")
            .with_owner(UserId::new())
            .with_field(field, state.clone());
        self.stores.entities.save(&mut entity).await.unwrap();
        entity
    }

    /// Schedules `entity.field` to move to `to` at `due`.
    pub async fn schedule(
        &self,
        entity: &Entity,
        field: &str,
        to: &StateId,
        due: DateTime<Utc>,
        comment: &str,
    ) -> Transition {
        let engine = TransitionEngine::new(Arc::clone(&self.runtime));
        let planner = Account::new(UserId::new(), "planner");
        let mut ctx = RequestContext::new();
        let mut transition = engine
            .create(
                &mut ctx,
                TransitionRequest::new(planner.id())
                    .entity(entity.clone())
                    .field(field)
                    .to(to.clone())
                    .comment(comment)
                    .schedule_at(due),
            )
            .await
            .unwrap();
        engine
            .apply(&mut ctx, &mut transition, &planner, true)
            .await
            .unwrap();
        transition
    }

    pub async fn state_of(&self, entity: &Entity, field: &str) -> Option<StateId> {
        self.stores
            .entities
            .load(&entity.entity_type, entity.id.as_ref().unwrap())
            .await
            .unwrap()
            .and_then(|stored| stored.fields.get(field).cloned())
    }
}
