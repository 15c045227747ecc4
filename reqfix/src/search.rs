//! The best-first repair search.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

use log::{debug, info};
use reqfix_types::RequirementSet;

use crate::{actions::Successor, diagnostics::ConflictInfo, heuristic::h_score};

/// The action description attached to the root of the search tree.
pub const INITIAL_ACTION: &str = "Initial state";

/// A handle to a node in the search arena.
///
/// Nodes reference their parents through handles; the arena is only freed
/// when the search returns, so handles stay valid for path reconstruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NodeId(usize);

/// One state in the search tree.
#[derive(Clone, Debug)]
pub struct SearchNode {
    /// The requirement set identifying the state.
    pub requirements: RequirementSet,
    /// Accumulated edit cost from the start state.
    pub g: f64,
    /// Heuristic estimate of the remaining repair work.
    pub h: f64,
    /// The node this one was expanded from ([`None`] for the root).
    pub parent: Option<NodeId>,
    /// Description of the edit that produced this state.
    pub last_action: String,
}

impl SearchNode {
    /// The estimated total cost of a solution through this node.
    pub fn f(&self) -> f64 {
        self.g + self.h
    }
}

/// One step on the path from the initial state to a solution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Step {
    /// Description of the edit (the root step carries [`INITIAL_ACTION`]).
    pub action: String,
    /// The requirement set after the edit.
    pub requirements: RequirementSet,
}

/// The outcome of a search run.
#[derive(Clone, Debug)]
pub enum SearchResult {
    /// A conflict-free requirement set was found.
    Solved {
        /// The resolved requirement set.
        requirements: RequirementSet,
        /// The edits leading from the initial state to the solution.
        path: Vec<Step>,
        /// The accumulated edit cost of the path.
        total_cost: f64,
        /// The number of iterations performed.
        iterations: usize,
    },
    /// Every reachable state was visited without finding a solution.
    FrontierExhausted {
        /// The number of iterations performed.
        iterations: usize,
    },
    /// The iteration budget ran out with work left on the frontier.
    BudgetExhausted {
        /// The number of iterations performed.
        iterations: usize,
        /// The number of states still waiting on the frontier.
        frontier_len: usize,
    },
}

/// A frontier entry.
///
/// Ordered so that the standard max-heap pops the entry with the lowest
/// `(f, g, set size)` first; the push sequence number makes the order total
/// and the search deterministic.
#[derive(Debug)]
struct FrontierEntry {
    f: f64,
    g: f64,
    size: usize,
    seq: usize,
    node: NodeId,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.g.total_cmp(&self.g))
            .then_with(|| other.size.cmp(&self.size))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for FrontierEntry {}

/// The A* loop over requirement sets.
///
/// The engine owns the frontier, the closed-set bookkeeping and the node
/// arena; evaluation and successor generation are injected so that the
/// loop stays independent of resolver, cache and catalog concerns.
#[derive(Debug)]
pub struct SearchEngine {
    original_direct: RequirementSet,
    max_iterations: usize,
}

impl SearchEngine {
    /// Creates a new [`SearchEngine`] starting from the user's direct
    /// requirements, with a bounded iteration budget.
    pub fn new(original_direct: RequirementSet, max_iterations: usize) -> Self {
        SearchEngine {
            original_direct,
            max_iterations,
        }
    }

    /// Runs the search.
    ///
    /// `evaluate` turns a requirement set into a [`ConflictInfo`] (through
    /// the resolver and its cache); `expand` produces the successors of a
    /// conflicting node. Successor heuristics are computed from the
    /// *parent's* conflict information, keeping them free of additional
    /// resolver calls.
    pub fn run(
        &self,
        mut evaluate: impl FnMut(&RequirementSet) -> ConflictInfo,
        mut expand: impl FnMut(&SearchNode, &ConflictInfo) -> Vec<Successor>,
    ) -> SearchResult {
        let mut arena: Vec<SearchNode> = Vec::new();
        let mut frontier: BinaryHeap<FrontierEntry> = BinaryHeap::new();
        let mut best_g: HashMap<RequirementSet, f64> = HashMap::new();
        let mut seq = 0_usize;

        info!(
            "Starting repair search (budget: {} iterations) for: {}",
            self.max_iterations,
            self.original_direct.summary(5)
        );
        let initial_conflict = evaluate(&self.original_direct);
        let root = SearchNode {
            requirements: self.original_direct.clone(),
            g: 0.0,
            h: h_score(&initial_conflict, &self.original_direct),
            parent: None,
            last_action: INITIAL_ACTION.to_string(),
        };
        debug!(
            "Initial node: f={:.2} (g=0.00, h={:.2})",
            root.f(),
            root.h
        );
        frontier.push(FrontierEntry {
            f: root.f(),
            g: root.g,
            size: root.requirements.len(),
            seq,
            node: NodeId(0),
        });
        arena.push(root);

        let mut iterations = 0_usize;
        while iterations < self.max_iterations {
            let Some(entry) = frontier.pop() else {
                break;
            };
            iterations += 1;

            let node_id = entry.node;
            let (g, requirements) = {
                let node = &arena[node_id.0];
                debug!(
                    "Iteration {}/{}: expanding f={:.2} (g={:.2}, h={:.2}) via '{}'",
                    iterations,
                    self.max_iterations,
                    node.f(),
                    node.g,
                    node.h,
                    node.last_action
                );
                (node.g, node.requirements.clone())
            };

            if best_g
                .get(&requirements)
                .is_some_and(|&best| g >= best)
            {
                debug!("  Skipping, state was expanded via an equal or better path");
                continue;
            }
            best_g.insert(requirements.clone(), g);

            let conflict = evaluate(&requirements);
            if !conflict.is_conflict {
                info!("Solution found after {iterations} iteration(s)");
                return SearchResult::Solved {
                    path: reconstruct_path(&arena, node_id),
                    requirements,
                    total_cost: g,
                    iterations,
                };
            }
            debug!(
                "  Conflict persists, involved: {}",
                if conflict.involved_direct.is_empty() {
                    "unknown".to_string()
                } else {
                    conflict
                        .involved_direct
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<String>>()
                        .join(", ")
                }
            );

            for successor in expand(&arena[node_id.0], &conflict) {
                let tentative_g = g + successor.cost;
                if best_g
                    .get(&successor.requirements)
                    .is_some_and(|&best| tentative_g >= best)
                {
                    continue;
                }
                let node = SearchNode {
                    requirements: successor.requirements,
                    g: tentative_g,
                    h: h_score(&conflict, &self.original_direct),
                    parent: Some(node_id),
                    last_action: successor.action.to_string(),
                };
                seq += 1;
                debug!(
                    "  Enqueued successor f={:.2} (g={:.2}, h={:.2}): '{}'",
                    node.f(),
                    node.g,
                    node.h,
                    node.last_action
                );
                frontier.push(FrontierEntry {
                    f: node.f(),
                    g: node.g,
                    size: node.requirements.len(),
                    seq,
                    node: NodeId(arena.len()),
                });
                arena.push(node);
            }
        }

        if frontier.is_empty() {
            info!("Frontier exhausted after {iterations} iteration(s), no solution");
            SearchResult::FrontierExhausted { iterations }
        } else {
            info!(
                "Iteration budget of {} reached, {} state(s) left on the frontier",
                self.max_iterations,
                frontier.len()
            );
            SearchResult::BudgetExhausted {
                iterations,
                frontier_len: frontier.len(),
            }
        }
    }
}

/// Walks the parent chain from `goal` to the root and returns the steps in
/// start-to-goal order.
fn reconstruct_path(arena: &[SearchNode], goal: NodeId) -> Vec<Step> {
    let mut path = Vec::new();
    let mut current = Some(goal);
    while let Some(node_id) = current {
        let node = &arena[node_id.0];
        path.push(Step {
            action: node.last_action.clone(),
            requirements: node.requirements.clone(),
        });
        current = node.parent;
    }
    path.reverse();
    path
}
