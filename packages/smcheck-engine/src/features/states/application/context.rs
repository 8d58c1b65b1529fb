//! Per-run context threaded through the states pass

use crate::features::checker::domain::State;
use crate::features::checker::CompiledMachine;
use crate::features::facts::Facts;
use crate::features::fixpoint::FixpointSolution;
use crate::features::pattern_matching::{PossibleMatch, PossibleMatches};
use crate::features::states::domain::{DetectedError, EquivClass, OutcomeFailure};
use crate::shared::models::{Expr, FunctionId, Location, Supergraph, VarKind};
use petgraph::graph::{EdgeIndex, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Owns everything the states transfer function reads, plus the errors and
/// outcome failures it produces
pub struct AnalysisContext {
    machine: Arc<CompiledMachine>,
    facts: FixpointSolution<NodeIndex, Facts>,
    possible_matches: PossibleMatches,
    node_function: FxHashMap<NodeIndex, FunctionId>,
    tracked: FxHashMap<FunctionId, Vec<Expr>>,
    tracked_globals: Vec<Expr>,
    defaults: BTreeSet<State>,
    class_cache: FxHashMap<NodeIndex, Vec<EquivClass>>,
    errors: Vec<DetectedError>,
    error_keys: FxHashSet<(NodeIndex, Expr, State, String)>,
    outcome_failures: Vec<OutcomeFailure>,
    namespace: FxHashMap<String, serde_json::Value>,
    location: Option<Location>,
}

impl AnalysisContext {
    pub fn new(
        supergraph: &Supergraph,
        machine: Arc<CompiledMachine>,
        facts: FixpointSolution<NodeIndex, Facts>,
        possible_matches: PossibleMatches,
    ) -> Self {
        let stateful = machine.stateful_decl().clone();
        let node_function = supergraph
            .node_indices()
            .filter_map(|node| supergraph.node(node).function.map(|id| (node, id)))
            .collect();

        let mut tracked: FxHashMap<FunctionId, BTreeSet<Expr>> = FxHashMap::default();
        for function in supergraph.functions() {
            let exprs = tracked.entry(function.id).or_default();
            for var in function
                .params
                .iter()
                .chain(function.locals.iter())
                .filter(|var| var.kind != VarKind::Temporary)
            {
                let expr = Expr::Var(var.clone()).simplify();
                if stateful.accepts(&expr) {
                    exprs.insert(expr);
                }
            }
        }
        // SSA names only show up in statements
        for node in supergraph.node_indices() {
            let data = supergraph.node(node);
            let (function, stmt) = match (data.function, &data.stmt) {
                (Some(function), Some(stmt)) => (function, stmt),
                _ => continue,
            };
            let exprs = tracked.entry(function).or_default();
            for top in stmt.all_exprs() {
                top.simplify().walk(&mut |expr| {
                    if let Some(var) = expr.as_variable() {
                        if !var.is_global() && stateful.accepts(expr) {
                            exprs.insert(expr.clone());
                        }
                    }
                });
            }
        }
        let tracked_globals = supergraph
            .globals()
            .iter()
            .map(|var| Expr::Var(var.clone()))
            .filter(|expr| stateful.accepts(expr))
            .collect();

        let defaults = BTreeSet::from([machine.default_state().clone()]);
        Self {
            machine,
            facts,
            possible_matches,
            node_function,
            tracked: tracked
                .into_iter()
                .map(|(function, exprs)| (function, exprs.into_iter().collect()))
                .collect(),
            tracked_globals,
            defaults,
            class_cache: FxHashMap::default(),
            errors: Vec::new(),
            error_keys: FxHashSet::default(),
            outcome_failures: Vec::new(),
            namespace: FxHashMap::default(),
            location: None,
        }
    }

    pub fn machine(&self) -> &CompiledMachine {
        &self.machine
    }

    pub fn facts(&self) -> &FixpointSolution<NodeIndex, Facts> {
        &self.facts
    }

    pub fn facts_at(&self, node: NodeIndex) -> Option<&Facts> {
        self.facts.value(node)
    }

    pub fn possible_matches(&self, edge: EdgeIndex) -> &[PossibleMatch] {
        self.possible_matches
            .get(&edge)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn defaults(&self) -> &BTreeSet<State> {
        &self.defaults
    }

    pub fn function_of(&self, node: NodeIndex) -> Option<FunctionId> {
        self.node_function.get(&node).copied()
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: Option<Location>) {
        self.location = location;
    }

    /// Tracked equivalence classes in scope at `node`: its function's
    /// stateful expressions and the stateful globals, grouped by the
    /// non-literal equalities holding there
    pub fn classes_at(&mut self, node: NodeIndex) -> Vec<EquivClass> {
        if let Some(classes) = self.class_cache.get(&node) {
            return classes.clone();
        }
        let classes = match self.facts.value(node) {
            None => Vec::new(),
            Some(facts) => {
                let in_function = self
                    .node_function
                    .get(&node)
                    .and_then(|function| self.tracked.get(function))
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let mut classes: Vec<EquivClass> = Vec::new();
                for expr in in_function.iter().chain(self.tracked_globals.iter()) {
                    if classes.iter().any(|class| class.contains(expr)) {
                        continue;
                    }
                    classes.push(facts.get_var_aliases(expr));
                }
                classes.sort();
                classes
            }
        };
        self.class_cache.insert(node, classes.clone());
        classes
    }

    pub(crate) fn namespace_mut(&mut self) -> &mut FxHashMap<String, serde_json::Value> {
        &mut self.namespace
    }

    pub(crate) fn record_error(&mut self, error: DetectedError) {
        if self.error_keys.insert(error.key()) {
            debug!(
                node = ?error.node,
                expr = %error.expr,
                state = %error.state,
                message = %error.message,
                "error flagged"
            );
            self.errors.push(error);
        }
    }

    /// Re-evaluated edges fail the same way again; keep one copy
    pub(crate) fn record_failure(&mut self, failure: OutcomeFailure) {
        if !self.outcome_failures.contains(&failure) {
            self.outcome_failures.push(failure);
        }
    }

    pub fn errors(&self) -> &[DetectedError] {
        &self.errors
    }

    pub fn outcome_failures(&self) -> &[OutcomeFailure] {
        &self.outcome_failures
    }

    /// Errors in source order
    pub fn take_errors(&mut self) -> Vec<DetectedError> {
        let mut errors = std::mem::take(&mut self.errors);
        errors.sort();
        errors
    }

    pub fn take_outcome_failures(&mut self) -> Vec<OutcomeFailure> {
        std::mem::take(&mut self.outcome_failures)
    }
}
