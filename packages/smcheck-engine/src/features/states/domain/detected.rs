//! Errors raised by outcomes during the states pass

use super::states_for_node::EquivClass;
use crate::features::checker::domain::State;
use crate::features::pattern_matching::Match;
use crate::shared::models::{Expr, FunctionId, Location};
use petgraph::graph::NodeIndex;
use std::cmp::Ordering;

/// A bug flagged at a node, not yet checked for reachability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedError {
    /// Node whose out-edge triggered the rule
    pub node: NodeIndex,
    pub function: Option<FunctionId>,
    /// Class of `expr` at `node`
    pub class: EquivClass,
    pub expr: Expr,
    /// State `expr` was in when the rule fired
    pub state: State,
    pub message: String,
    pub cwe: Option<String>,
    pub matched: Match,
    /// Program location of `node`
    pub location: Option<Location>,
    /// Checker location of the rule that fired
    pub rule_location: Option<Location>,
}

impl DetectedError {
    pub(crate) fn key(&self) -> (NodeIndex, Expr, State, String) {
        (
            self.node,
            self.expr.clone(),
            self.state.clone(),
            self.message.clone(),
        )
    }
}

impl PartialOrd for DetectedError {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Source order: (location, message), then the node for a total order
impl Ord for DetectedError {
    fn cmp(&self, other: &Self) -> Ordering {
        self.location
            .cmp(&other.location)
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.node.cmp(&other.node))
            .then_with(|| self.expr.cmp(&other.expr))
            .then_with(|| self.state.cmp(&other.state))
    }
}

/// Action code that failed; its outcome was skipped
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OutcomeFailure {
    pub action: String,
    pub message: String,
    pub location: Option<Location>,
}
