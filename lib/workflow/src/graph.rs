//! Transition graph of a workflow using petgraph.
//!
//! Nodes are states and edges are configured transitions. The graph is built
//! on demand from a loaded `Workflow` and answers structural questions such as
//! which states content can never reach.

use crate::config_transition::ConfigTransitionId;
use crate::definition::Workflow;
use crate::state::StateMode;
use nodeflow_core::StateId;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use std::collections::HashMap;

/// A workflow's states and transitions as a directed graph.
#[derive(Debug, Clone)]
pub struct TransitionGraph {
    graph: DiGraph<StateId, ConfigTransitionId>,
    index: HashMap<StateId, NodeIndex>,
}

impl TransitionGraph {
    /// Builds the graph over every state of `workflow`.
    ///
    /// Transitions whose endpoints are unknown to the workflow are skipped.
    #[must_use]
    pub fn from_workflow(workflow: &Workflow) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for state in workflow.states(StateMode::All) {
            let node = graph.add_node(state.id.clone());
            index.insert(state.id.clone(), node);
        }
        for transition in workflow.transitions() {
            if transition.is_self() {
                continue;
            }
            if let (Some(from), Some(to)) = (index.get(&transition.from), index.get(&transition.to))
            {
                graph.add_edge(*from, *to, transition.id);
            }
        }
        Self { graph, index }
    }

    /// Returns the number of states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of non-self transitions.
    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the states directly reachable from `from`.
    #[must_use]
    pub fn successors(&self, from: &StateId) -> Vec<&StateId> {
        let Some(node) = self.index.get(from) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(*node, Direction::Outgoing)
            .map(|edge| &self.graph[edge.target()])
            .collect()
    }

    /// Returns every state reachable from `from`, `from` included.
    #[must_use]
    pub fn reachable_from(&self, from: &StateId) -> Vec<&StateId> {
        let Some(start) = self.index.get(from) else {
            return Vec::new();
        };
        let mut bfs = Bfs::new(&self.graph, *start);
        let mut reached = Vec::new();
        while let Some(node) = bfs.next(&self.graph) {
            reached.push(&self.graph[node]);
        }
        reached
    }
}

/// Returns the active states of `workflow` that no path from the creation
/// state reaches, in display order.
#[must_use]
pub fn unreachable_states(workflow: &Workflow) -> Vec<StateId> {
    let graph = TransitionGraph::from_workflow(workflow);
    let reached: Vec<&StateId> = match workflow.creation_state() {
        Some(creation) => graph.reachable_from(&creation.id),
        None => Vec::new(),
    };
    workflow
        .states(StateMode::ActiveOnly)
        .filter(|state| !reached.contains(&&state.id))
        .map(|state| state.id.clone())
        .collect()
}
