//! Graph and abstract-value abstractions consumed by the solver

use crate::errors::EngineResult;
use crate::shared::models::{Location, Supergraph};
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::fmt::Debug;
use std::hash::Hash;

/// Directed graph the solver iterates over
pub trait FlowGraph {
    type NodeId: Copy + Eq + Hash + Ord + Debug;
    type EdgeId: Copy + Eq + Hash + Ord + Debug;

    fn node_ids(&self) -> Vec<Self::NodeId>;
    fn entry_nodes(&self) -> Vec<Self::NodeId>;
    fn out_edges(&self, node: Self::NodeId) -> Vec<Self::EdgeId>;
    fn edge_target(&self, edge: Self::EdgeId) -> Self::NodeId;
    fn location(&self, node: Self::NodeId) -> Option<&Location>;
}

/// A graph whose nodes and edges project onto supergraph nodes and edges.
///
/// The facts domain runs on both the supergraph and the exploded graph through
/// this projection.
pub trait SupergraphView: FlowGraph {
    fn supergraph(&self) -> &Supergraph;
    fn inner_node(&self, node: Self::NodeId) -> NodeIndex;
    fn inner_edge(&self, edge: Self::EdgeId) -> EdgeIndex;
}

/// Lattice value computed per node by the fixed-point solver.
///
/// `None` (held by the solver, not the value) is bottom: unreachable.
pub trait AbstractValue<G: FlowGraph>: Clone + PartialEq + Debug + Sized {
    /// Per-run state threaded through every transfer call
    type Context;
    /// Extra information produced alongside an edge value
    type Details;

    fn make_entry_point(ctx: &mut Self::Context, graph: &G, node: G::NodeId) -> Self;

    /// Value flowing into the edge's target; `None` when the edge is infeasible
    fn get_edge_value(
        ctx: &mut Self::Context,
        graph: &G,
        src: &Self,
        edge: G::EdgeId,
    ) -> EngineResult<(Option<Self>, Self::Details)>;

    fn meet(ctx: &Self::Context, lhs: &Self, rhs: &Self) -> Self;

    /// Called before the out-edges of a node are evaluated
    fn set_location(_ctx: &mut Self::Context, _location: Option<&Location>) {}
}

impl FlowGraph for Supergraph {
    type NodeId = NodeIndex;
    type EdgeId = EdgeIndex;

    fn node_ids(&self) -> Vec<NodeIndex> {
        self.node_indices().collect()
    }

    fn entry_nodes(&self) -> Vec<NodeIndex> {
        vec![self.fake_entry()]
    }

    fn out_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        Supergraph::out_edges(self, node)
    }

    fn edge_target(&self, edge: EdgeIndex) -> NodeIndex {
        self.target(edge)
    }

    fn location(&self, node: NodeIndex) -> Option<&Location> {
        self.location_of(node)
    }
}

impl SupergraphView for Supergraph {
    fn supergraph(&self) -> &Supergraph {
        self
    }

    fn inner_node(&self, node: NodeIndex) -> NodeIndex {
        node
    }

    fn inner_edge(&self, edge: EdgeIndex) -> EdgeIndex {
        edge
    }
}
