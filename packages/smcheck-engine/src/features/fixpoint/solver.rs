/*
 * Fixed-Point Solver
 *
 * Generic monotone dataflow engine (Kildall worklist).
 *
 * Algorithm:
 * 1. Every node starts at bottom (None = unreachable)
 * 2. Entry nodes are seeded with make_entry_point
 * 3. While the worklist is not empty:
 *    a. Pop a node, evaluate get_edge_value on each out-edge
 *    b. Meet the edge value into the target's stored value
 *    c. If the target changed: store it and push the target
 * 4. Fixpoint reached when the worklist empties
 *
 * Invariant at termination, for every edge (src, dst):
 *   meet(value[dst], get_edge_value(value[src], edge)) == value[dst]
 *
 * Performance:
 * - Time: O(edges × re-evaluations); a node is re-queued only when an
 *   in-edge contributed a change, and the queue never holds duplicates
 * - Space: O(nodes × value size)
 *
 * References:
 * - Kildall, G. (1973). "A Unified Approach to Global Program Optimization"
 * - Kam, J. & Ullman, J. (1977). "Monotone Data Flow Analysis Frameworks"
 */

use super::domain::{AbstractValue, FlowGraph};
use crate::errors::{EngineError, EngineResult};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Solver statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverStats {
    /// Worklist pops
    pub iterations: usize,
    /// Value updates across all nodes
    pub updates: usize,
    /// Nodes with a non-bottom value at the fixpoint
    pub reachable_nodes: usize,
}

/// Node → value mapping at the fixpoint
#[derive(Debug, Clone)]
pub struct FixpointSolution<N, V> {
    values: FxHashMap<N, Option<V>>,
    pub stats: SolverStats,
}

impl<N: Copy + Eq + std::hash::Hash, V> FixpointSolution<N, V> {
    /// Value at a node; `None` when the node is unreachable
    pub fn value(&self, node: N) -> Option<&V> {
        self.values.get(&node).and_then(|value| value.as_ref())
    }

    pub fn is_reachable(&self, node: N) -> bool {
        self.value(node).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&N, &Option<V>)> {
        self.values.iter()
    }

    pub fn into_values(self) -> FxHashMap<N, Option<V>> {
        self.values
    }
}

/// Worklist solver over any [`FlowGraph`]
///
/// # Example
/// ```ignore
/// let solution = FixpointSolver::new(&supergraph, "facts")
///     .with_max_iterations(config.max_fixpoint_iterations)
///     .solve::<Facts>(&mut facts_ctx)?;
/// ```
pub struct FixpointSolver<'g, G: FlowGraph> {
    graph: &'g G,
    pass: &'static str,
    max_iterations: usize,
}

impl<'g, G: FlowGraph> FixpointSolver<'g, G> {
    pub fn new(graph: &'g G, pass: &'static str) -> Self {
        Self {
            graph,
            pass,
            max_iterations: 100_000,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn solve<V: AbstractValue<G>>(
        &self,
        ctx: &mut V::Context,
    ) -> EngineResult<FixpointSolution<G::NodeId, V>> {
        self.solve_observed(ctx, |_, _, _| {})
    }

    /// Like [`solve`](Self::solve), reporting every update as
    /// `(node, previous value, new value)`
    pub fn solve_observed<V, F>(
        &self,
        ctx: &mut V::Context,
        mut observer: F,
    ) -> EngineResult<FixpointSolution<G::NodeId, V>>
    where
        V: AbstractValue<G>,
        F: FnMut(G::NodeId, Option<&V>, &V),
    {
        let mut values: FxHashMap<G::NodeId, Option<V>> = self
            .graph
            .node_ids()
            .into_iter()
            .map(|node| (node, None))
            .collect();
        let mut stats = SolverStats::default();
        let mut worklist: VecDeque<G::NodeId> = VecDeque::new();
        let mut queued: FxHashSet<G::NodeId> = FxHashSet::default();

        for node in self.graph.entry_nodes() {
            let value = V::make_entry_point(ctx, self.graph, node);
            observer(node, None, &value);
            values.insert(node, Some(value));
            if queued.insert(node) {
                worklist.push_back(node);
            }
        }

        while let Some(node) = worklist.pop_back() {
            queued.remove(&node);
            stats.iterations += 1;
            if stats.iterations > self.max_iterations {
                return Err(EngineError::FixpointNotConverged {
                    pass: self.pass.to_string(),
                    limit: self.max_iterations,
                });
            }

            let src = match values.get(&node).and_then(|value| value.clone()) {
                Some(src) => src,
                None => continue,
            };
            V::set_location(ctx, self.graph.location(node));

            for edge in self.graph.out_edges(node) {
                let (edge_value, _) = V::get_edge_value(ctx, self.graph, &src, edge)?;
                let edge_value = match edge_value {
                    Some(value) => value,
                    None => {
                        trace!(pass = self.pass, ?edge, "edge infeasible");
                        continue;
                    }
                };

                let dst = self.graph.edge_target(edge);
                let old = values.get(&dst).and_then(|value| value.as_ref());
                let merged = match old {
                    Some(old) => V::meet(ctx, old, &edge_value),
                    None => edge_value,
                };
                if old == Some(&merged) {
                    continue;
                }

                observer(dst, old, &merged);
                values.insert(dst, Some(merged));
                stats.updates += 1;
                if queued.insert(dst) {
                    worklist.push_back(dst);
                }
            }
        }

        stats.reachable_nodes = values.values().filter(|value| value.is_some()).count();
        debug!(
            pass = self.pass,
            iterations = stats.iterations,
            updates = stats.updates,
            reachable = stats.reachable_nodes,
            "fixed point reached"
        );
        Ok(FixpointSolution { values, stats })
    }
}
