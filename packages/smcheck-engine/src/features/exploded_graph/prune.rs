//! Facts-based pruning of the exploded graph
//!
//! Re-runs the facts fixed point over the exploded graph, where paths are
//! split by state and therefore carry sharper facts, and deletes every node
//! whose facts are unreachable or infeasible, then everything the entry no
//! longer reaches. Repeats until stable or out of rounds.

use super::domain::ExplodedGraph;
use crate::errors::EngineResult;
use crate::features::facts::{Facts, FactsContext};
use crate::features::fixpoint::FixpointSolver;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::Bfs;
use rustc_hash::FxHashSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub rounds: usize,
    pub infeasible_nodes: usize,
    pub orphaned_nodes: usize,
    pub facts_iterations: usize,
}

pub fn prune_exploded_graph(
    exploded: &mut ExplodedGraph<'_>,
    max_rounds: usize,
    max_iterations: usize,
) -> EngineResult<PruneStats> {
    let mut stats = PruneStats::default();

    for _ in 0..max_rounds {
        stats.rounds += 1;
        let facts = FixpointSolver::new(&*exploded, "exploded-facts")
            .with_max_iterations(max_iterations)
            .solve::<Facts>(&mut FactsContext::default())?;
        stats.facts_iterations += facts.stats.iterations;

        let entry = exploded.entry;
        let infeasible: Vec<NodeIndex> = exploded
            .graph
            .node_indices()
            .filter(|&node| node != entry)
            .filter(|&node| facts.value(node).map_or(true, |facts| !facts.is_possible()))
            .collect();
        for &node in &infeasible {
            debug!(node = %exploded.graph[node], "pruning infeasible exploded node");
            exploded.graph.remove_node(node);
        }
        let orphaned = remove_orphans(exploded);

        stats.infeasible_nodes += infeasible.len();
        stats.orphaned_nodes += orphaned;
        if infeasible.is_empty() && orphaned == 0 {
            break;
        }
    }

    debug!(
        rounds = stats.rounds,
        infeasible = stats.infeasible_nodes,
        orphaned = stats.orphaned_nodes,
        remaining = exploded.graph.node_count(),
        "exploded graph pruned"
    );
    Ok(stats)
}

/// Removes every node the entry no longer reaches, in one sweep
fn remove_orphans(exploded: &mut ExplodedGraph<'_>) -> usize {
    let mut reachable: FxHashSet<NodeIndex> = FxHashSet::default();
    let mut bfs = Bfs::new(&exploded.graph, exploded.entry);
    while let Some(node) = bfs.next(&exploded.graph) {
        reachable.insert(node);
    }

    let orphans: Vec<NodeIndex> = exploded
        .graph
        .node_indices()
        .filter(|node| !reachable.contains(node))
        .collect();
    for &node in &orphans {
        exploded.graph.remove_node(node);
    }
    orphans.len()
}
