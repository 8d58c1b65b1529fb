//! Exploded graph
//!
//! Per-(class, state) refinement of the supergraph in which every edge is an
//! unambiguous state transition, pruned with a second facts pass. Witness
//! paths are searched here.

pub mod builder;
pub mod domain;
pub mod prune;

pub use builder::{build_exploded_graph, ExplodeOutcome};
pub use domain::{ExplodedEdge, ExplodedGraph, ExplodedNode, ExplodedNodeKind};
pub use prune::{prune_exploded_graph, PruneStats};
