//! Feature modules (vertical slices, leaf-first)
//!
//! fixpoint → facts → checker → pattern_matching → states → exploded_graph
//! → reporting

pub mod checker;
pub mod exploded_graph;
pub mod facts;
pub mod fixpoint;
pub mod pattern_matching;
pub mod reporting;
pub mod states;
