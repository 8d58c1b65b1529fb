//! Fixed-point solver
//!
//! Generic worklist engine parameterized by an abstract-value type. Both the
//! facts and the states domains run through it, on the supergraph and on the
//! exploded graph.

pub mod domain;
pub mod solver;

pub use domain::{AbstractValue, FlowGraph, SupergraphView};
pub use solver::{FixpointSolution, FixpointSolver, SolverStats};
