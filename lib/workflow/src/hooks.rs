//! Extension hooks around transitions.
//!
//! Observers are registered on a `HookBus` and called in registration order.
//! Every hook method has a default that lets the transition through, so an
//! observer only implements the hooks it cares about.
//!
//! | Hook | Method | Effect |
//! |------|--------|--------|
//! | transition permitted | `transition_permitted` | veto drops a candidate edge |
//! | permitted transitions alter | `alter_permitted_transitions` | replace the candidate list |
//! | transition pre | `transition_pre` | veto aborts execution |
//! | comment alter | `alter_comment` | replace the comment |
//! | transition post | `transition_post` | notification only |

use crate::config_transition::ConfigTransition;
use crate::entity::Entity;
use crate::error::Rejection;
use crate::transition::Transition;
use nodeflow_access::Account;
use nodeflow_core::StateId;
use std::sync::Arc;
use tracing::debug;

/// What an observer wants done with the hook payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<T> {
    /// Leave the payload as it is.
    Continue,
    /// Block the operation.
    Veto {
        /// Why the operation was blocked.
        reason: String,
    },
    /// Replace the payload.
    Mutate(T),
}

impl<T> Directive<T> {
    /// Creates a veto.
    #[must_use]
    pub fn veto(reason: impl Into<String>) -> Self {
        Self::Veto {
            reason: reason.into(),
        }
    }
}

/// Context of an option computation.
#[derive(Debug, Clone, Copy)]
pub struct OptionScope<'a> {
    /// The state options are computed from.
    pub from: &'a StateId,
    /// The entity, if known.
    pub entity: Option<&'a Entity>,
    /// Workflow field name.
    pub field_name: &'a str,
    /// The user options are computed for.
    pub account: &'a Account,
    /// Whether permissions are bypassed.
    pub force: bool,
}

/// Receives transition hooks.
pub trait TransitionObserver: Send + Sync {
    /// Name used in logs and veto reasons.
    fn name(&self) -> &str;

    /// Decides whether a candidate edge is offered.
    fn transition_permitted(
        &self,
        _candidate: &ConfigTransition,
        _scope: &OptionScope<'_>,
    ) -> Directive<()> {
        Directive::Continue
    }

    /// Rewrites the list of permitted edges, e.g. to add synthetic ones.
    fn alter_permitted_transitions(
        &self,
        _permitted: &[ConfigTransition],
        _scope: &OptionScope<'_>,
    ) -> Directive<Vec<ConfigTransition>> {
        Directive::Continue
    }

    /// Runs before a transition is applied; a veto aborts it.
    fn transition_pre(&self, _transition: &Transition) -> Directive<()> {
        Directive::Continue
    }

    /// Rewrites the comment of a transition about to be recorded.
    fn alter_comment(&self, _comment: &str, _transition: &Transition) -> Directive<String> {
        Directive::Continue
    }

    /// Runs after the entity carrying the new state has been saved.
    fn transition_post(&self, _transition: &Transition) {}
}

/// Ordered list of transition observers.
#[derive(Clone, Default)]
pub struct HookBus {
    observers: Vec<Arc<dyn TransitionObserver>>,
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.observers.iter().map(|o| o.name().to_string()))
            .finish()
    }
}

impl HookBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observer.
    pub fn register(&mut self, observer: Arc<dyn TransitionObserver>) {
        self.observers.push(observer);
    }

    /// Appends an observer, builder style.
    #[must_use]
    pub fn with(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.register(observer);
        self
    }

    /// Returns the number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true if no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Filters and alters candidate edges.
    ///
    /// Every observer is asked about every candidate; a single veto drops
    /// it. The surviving list is then passed through each alter hook.
    #[must_use]
    pub fn permitted(
        &self,
        candidates: Vec<ConfigTransition>,
        scope: &OptionScope<'_>,
    ) -> Vec<ConfigTransition> {
        let mut permitted: Vec<ConfigTransition> = candidates
            .into_iter()
            .filter(|candidate| {
                let mut keep = true;
                for observer in &self.observers {
                    if let Directive::Veto { reason } =
                        observer.transition_permitted(candidate, scope)
                    {
                        debug!(
                            observer = observer.name(),
                            from = %candidate.from,
                            to = %candidate.to,
                            %reason,
                            "candidate transition vetoed"
                        );
                        keep = false;
                    }
                }
                keep
            })
            .collect();

        for observer in &self.observers {
            match observer.alter_permitted_transitions(&permitted, scope) {
                Directive::Continue => {}
                Directive::Mutate(altered) => permitted = altered,
                Directive::Veto { reason } => {
                    debug!(observer = observer.name(), %reason, "all candidate transitions vetoed");
                    permitted.clear();
                }
            }
        }
        permitted
    }

    /// Runs the pre-transition hook; returns the first veto.
    #[must_use]
    pub fn pre(&self, transition: &Transition) -> Option<Rejection> {
        let mut rejection = None;
        for observer in &self.observers {
            if let Directive::Veto { reason } = observer.transition_pre(transition) {
                if rejection.is_none() {
                    rejection = Some(Rejection::Vetoed {
                        observer: observer.name().to_string(),
                        reason,
                    });
                }
            }
        }
        rejection
    }

    /// Passes the comment through every alter hook.
    ///
    /// A veto blanks the comment.
    #[must_use]
    pub fn alter_comment(&self, transition: &Transition) -> String {
        let mut comment = transition.comment.clone();
        for observer in &self.observers {
            match observer.alter_comment(&comment, transition) {
                Directive::Continue => {}
                Directive::Mutate(altered) => comment = altered,
                Directive::Veto { .. } => comment.clear(),
            }
        }
        comment
    }

    /// Notifies every observer of an applied transition.
    pub fn post(&self, transition: &Transition) {
        for observer in &self.observers {
            observer.transition_post(transition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_transition::ConfigTransitionId;
    use chrono::Utc;
    use nodeflow_core::{UserId, WorkflowId};
    use std::sync::Mutex;

    struct BlockPublished;

    impl TransitionObserver for BlockPublished {
        fn name(&self) -> &str {
            "block_published"
        }

        fn transition_permitted(
            &self,
            candidate: &ConfigTransition,
            _scope: &OptionScope<'_>,
        ) -> Directive<()> {
            if candidate.to.as_str() == "published" {
                Directive::veto("embargo")
            } else {
                Directive::Continue
            }
        }

        fn transition_pre(&self, transition: &Transition) -> Directive<()> {
            if transition.to_sid.as_str() == "published" {
                Directive::veto("embargo")
            } else {
                Directive::Continue
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl TransitionObserver for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn alter_comment(&self, comment: &str, _transition: &Transition) -> Directive<String> {
            Directive::Mutate(format!("{comment} (reviewed)"))
        }

        fn transition_post(&self, transition: &Transition) {
            self.seen
                .lock()
                .unwrap()
                .push(transition.to_sid.to_string());
        }
    }

    fn edge(id: u64, to: &str) -> ConfigTransition {
        ConfigTransition::new(
            ConfigTransitionId::new(id),
            WorkflowId::new("editorial"),
            StateId::new("review"),
            StateId::new(to),
        )
    }

    fn transition(to: &str) -> Transition {
        Transition::new(StateId::new("review"), StateId::new(to), UserId::new(), Utc::now())
            .with_comment("ok")
    }

    #[test]
    fn permitted_drops_vetoed_candidates() {
        let bus = HookBus::new().with(Arc::new(BlockPublished));
        let account = Account::new(UserId::new(), "ada");
        let from = StateId::new("review");
        let scope = OptionScope {
            from: &from,
            entity: None,
            field_name: "field_status",
            account: &account,
            force: false,
        };
        let permitted = bus.permitted(vec![edge(1, "draft"), edge(2, "published")], &scope);
        assert_eq!(permitted.len(), 1);
        assert_eq!(permitted[0].to.as_str(), "draft");
    }

    #[test]
    fn pre_reports_first_veto() {
        let bus = HookBus::new()
            .with(Arc::new(Recorder::default()))
            .with(Arc::new(BlockPublished));
        assert!(bus.pre(&transition("draft")).is_none());
        let rejection = bus.pre(&transition("published")).expect("vetoed");
        assert_eq!(
            rejection,
            Rejection::Vetoed {
                observer: "block_published".to_string(),
                reason: "embargo".to_string(),
            }
        );
    }

    #[test]
    fn comment_alter_and_post() {
        let recorder = Arc::new(Recorder::default());
        let bus = HookBus::new().with(recorder.clone());
        assert_eq!(bus.alter_comment(&transition("draft")), "ok (reviewed)");

        bus.post(&transition("draft"));
        assert_eq!(*recorder.seen.lock().unwrap(), ["draft"]);
        assert_eq!(bus.len(), 1);
    }
}
