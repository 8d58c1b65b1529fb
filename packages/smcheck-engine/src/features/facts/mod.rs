//! Facts domain
//!
//! Linear equality/inequality facts per node, used to name temporaries
//! (equivalence classes) and to prune infeasible paths (`is_possible`).

pub mod application;
pub mod domain;

pub use application::{transfer_edge, FactsContext};
pub use domain::{Fact, Facts, Partition};
