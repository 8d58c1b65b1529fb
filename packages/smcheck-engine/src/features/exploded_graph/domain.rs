//! Exploded graph model

use crate::features::checker::domain::State;
use crate::features::fixpoint::{FlowGraph, SupergraphView};
use crate::features::pattern_matching::Match;
use crate::features::states::{EquivClass, StatesForNode};
use crate::shared::models::{Location, Supergraph};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplodedNodeKind {
    /// Every class at the underlying node has a single state
    Solo,
    /// One (class, state) pair of the underlying node
    Statewise { class: EquivClass, state: State },
}

#[derive(Debug, Clone)]
pub struct ExplodedNode {
    /// Underlying supergraph node
    pub inner: NodeIndex,
    pub kind: ExplodedNodeKind,
    /// States subset this node stands for
    pub states: StatesForNode,
}

impl ExplodedNode {
    /// Whether this node is the statewise node for `state` of `class`
    pub fn is_statewise_for(&self, class: &EquivClass, state: &State) -> bool {
        matches!(&self.kind, ExplodedNodeKind::Statewise { class: c, state: s } if c == class && s == state)
    }
}

impl fmt::Display for ExplodedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExplodedNodeKind::Solo => write!(f, "{:?} solo {}", self.inner, self.states),
            ExplodedNodeKind::Statewise { class, state } => {
                let class: Vec<String> = class.iter().map(|expr| expr.to_string()).collect();
                write!(f, "{:?} {{{}}}: {}", self.inner, class.join(", "), state)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExplodedEdge {
    /// Underlying supergraph edge
    pub inner: petgraph::graph::EdgeIndex,
    /// Rule matches applied along the edge
    pub matches: Vec<Match>,
}

/// Supergraph refined per (class, state), addressed by stable indices so
/// pruning never invalidates the survivors
pub struct ExplodedGraph<'sg> {
    pub(crate) supergraph: &'sg Supergraph,
    pub(crate) graph: StableDiGraph<ExplodedNode, ExplodedEdge>,
    pub(crate) entry: NodeIndex,
}

impl<'sg> ExplodedGraph<'sg> {
    pub fn graph(&self) -> &StableDiGraph<ExplodedNode, ExplodedEdge> {
        &self.graph
    }

    pub fn entry(&self) -> NodeIndex {
        self.entry
    }

    pub fn node(&self, node: NodeIndex) -> Option<&ExplodedNode> {
        self.graph.node_weight(node)
    }

    pub fn edge(&self, edge: EdgeIndex) -> Option<&ExplodedEdge> {
        self.graph.edge_weight(edge)
    }

    pub fn endpoints(&self, edge: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(edge)
    }

    pub fn contains_edge(&self, edge: EdgeIndex) -> bool {
        self.graph.edge_weight(edge).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Exploded nodes standing for supergraph node `inner`
    pub fn nodes_for(&self, inner: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&node| self.graph[node].inner == inner)
            .collect()
    }

    pub fn in_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| edge.id())
            .collect();
        edges.sort();
        edges
    }
}

impl<'sg> FlowGraph for ExplodedGraph<'sg> {
    type NodeId = NodeIndex;
    type EdgeId = EdgeIndex;

    fn node_ids(&self) -> Vec<NodeIndex> {
        self.graph.node_indices().collect()
    }

    fn entry_nodes(&self) -> Vec<NodeIndex> {
        vec![self.entry]
    }

    fn out_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| edge.id())
            .collect();
        edges.sort();
        edges
    }

    fn edge_target(&self, edge: EdgeIndex) -> NodeIndex {
        // Only live edges are handed out by `out_edges`
        self.graph
            .edge_endpoints(edge)
            .map_or_else(NodeIndex::end, |(_, dst)| dst)
    }

    fn location(&self, node: NodeIndex) -> Option<&Location> {
        let inner = self.graph.node_weight(node)?.inner;
        self.supergraph.location_of(inner)
    }
}

impl<'sg> SupergraphView for ExplodedGraph<'sg> {
    fn supergraph(&self) -> &Supergraph {
        self.supergraph
    }

    fn inner_node(&self, node: NodeIndex) -> NodeIndex {
        self.graph[node].inner
    }

    fn inner_edge(&self, edge: EdgeIndex) -> petgraph::graph::EdgeIndex {
        self.graph[edge].inner
    }
}
