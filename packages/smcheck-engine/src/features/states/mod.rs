//! States domain
//!
//! Per-node automaton states for every tracked equivalence class, computed
//! by the fixed-point solver with a transfer function that applies the
//! checker's rules.

pub mod application;
pub mod domain;

pub use application::{transfer_edge, AnalysisContext};
pub use domain::{
    class_in_scope, class_owner, DetectedError, EquivClass, OutcomeFailure, StatesForNode,
};
