/*
 * Exploded Graph Builder
 *
 * 1. Every reachable supergraph node becomes one solo node when all of its
 *    classes have a single state, otherwise one statewise node per
 *    (class, state) pair of each ambiguous class (never the cross product)
 * 2. For every supergraph edge and every exploded source node, the states
 *    transfer is re-run on the source's subset; the result is wired to
 *    every destination node whose subset contains it, falling back to the
 *    destinations it is compatible with when none contains it
 *
 * The node count is capped; exceeding the cap gives up on the machine.
 */

use super::domain::{ExplodedEdge, ExplodedGraph, ExplodedNode, ExplodedNodeKind};
use crate::errors::{EngineError, EngineResult};
use crate::features::fixpoint::FixpointSolution;
use crate::features::states::{transfer_edge, AnalysisContext, StatesForNode};
use crate::shared::models::Supergraph;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

pub enum ExplodeOutcome<'sg> {
    Built(ExplodedGraph<'sg>),
    TooComplex { nodes: usize, limit: usize },
}

pub fn build_exploded_graph<'sg>(
    ctx: &mut AnalysisContext,
    supergraph: &'sg Supergraph,
    states: &FixpointSolution<NodeIndex, StatesForNode>,
    max_nodes: usize,
) -> EngineResult<ExplodeOutcome<'sg>> {
    let mut graph: StableDiGraph<ExplodedNode, ExplodedEdge> = StableDiGraph::new();
    let mut by_inner: FxHashMap<NodeIndex, Vec<NodeIndex>> = FxHashMap::default();

    for inner in supergraph.node_indices() {
        let value = match states.value(inner) {
            Some(value) => value,
            None => continue,
        };
        let exploded = by_inner.entry(inner).or_default();
        if value.is_unambiguous() {
            exploded.push(graph.add_node(ExplodedNode {
                inner,
                kind: ExplodedNodeKind::Solo,
                states: value.clone(),
            }));
        } else {
            for (class, set) in value.iter().filter(|(_, set)| set.len() > 1) {
                for state in set {
                    exploded.push(graph.add_node(ExplodedNode {
                        inner,
                        kind: ExplodedNodeKind::Statewise {
                            class: class.clone(),
                            state: state.clone(),
                        },
                        states: value.restricted_to(class, state),
                    }));
                }
            }
        }
        if graph.node_count() > max_nodes {
            debug!(nodes = graph.node_count(), limit = max_nodes, "exploded graph too large");
            return Ok(ExplodeOutcome::TooComplex {
                nodes: graph.node_count(),
                limit: max_nodes,
            });
        }
    }

    let entry = by_inner
        .get(&supergraph.fake_entry())
        .and_then(|nodes| nodes.first().copied())
        .ok_or_else(|| {
            EngineError::InvalidSupergraph("entry node has no states".to_string())
        })?;

    let sources: Vec<NodeIndex> = graph.node_indices().collect();
    for src in sources {
        let (inner, subset) = {
            let node = &graph[src];
            (node.inner, node.states.clone())
        };
        ctx.set_location(supergraph.location_of(inner).cloned());

        for edge in supergraph.out_edges(inner) {
            let (value, matches) = transfer_edge(ctx, supergraph, &subset, edge)?;
            let value = match value {
                Some(value) => value,
                None => continue,
            };
            let dst_inner = supergraph.target(edge);
            let candidates = match by_inner.get(&dst_inner) {
                Some(candidates) => candidates,
                None => continue,
            };
            let scope = ctx.function_of(dst_inner);

            let mut targets: Vec<NodeIndex> = candidates
                .iter()
                .copied()
                .filter(|&dst| {
                    let dst_node = &graph[dst];
                    dst_node.kind == ExplodedNodeKind::Solo
                        || value.is_subset_of(&dst_node.states, ctx.defaults(), scope)
                })
                .collect();
            if targets.is_empty() {
                targets = candidates
                    .iter()
                    .copied()
                    .filter(|&dst| value.is_compatible_with(&graph[dst].states))
                    .collect();
            }
            for dst in targets {
                graph.add_edge(
                    src,
                    dst,
                    ExplodedEdge {
                        inner: edge,
                        matches: matches.clone(),
                    },
                );
            }
        }
    }

    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "exploded graph built"
    );
    Ok(ExplodeOutcome::Built(ExplodedGraph {
        supergraph,
        graph,
        entry,
    }))
}
