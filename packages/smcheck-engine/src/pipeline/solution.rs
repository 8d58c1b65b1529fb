//! Solved states pass and the queries self-tests make against it

use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::features::checker::domain::State;
use crate::features::exploded_graph::{
    build_exploded_graph, prune_exploded_graph, ExplodeOutcome, PruneStats,
};
use crate::features::facts::Facts;
use crate::features::fixpoint::FixpointSolution;
use crate::features::pattern_matching::PossibleMatch;
use crate::features::reporting::{find_target, ShortestPaths};
use crate::features::states::{AnalysisContext, DetectedError, OutcomeFailure, StatesForNode};
use crate::shared::models::{Expr, Supergraph};
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::BTreeSet;

pub struct Solution<'sg> {
    pub(crate) supergraph: &'sg Supergraph,
    pub(crate) ctx: AnalysisContext,
    pub(crate) states: FixpointSolution<NodeIndex, StatesForNode>,
    pub(crate) leaked_exprs: usize,
    pub(crate) possible_matches: usize,
}

impl<'sg> Solution<'sg> {
    pub fn supergraph(&self) -> &'sg Supergraph {
        self.supergraph
    }

    pub fn context(&self) -> &AnalysisContext {
        &self.ctx
    }

    pub fn states(&self) -> &FixpointSolution<NodeIndex, StatesForNode> {
        &self.states
    }

    pub fn states_at(&self, node: NodeIndex) -> Option<&StatesForNode> {
        self.states.value(node)
    }

    pub fn states_for_expr(&self, node: NodeIndex, expr: &Expr) -> Option<&BTreeSet<State>> {
        self.states_at(node)?.states_for_expr(expr)
    }

    /// Names of the states `expr` may be in at `node`; empty if untracked
    pub fn statenames_for_expr(&self, node: NodeIndex, expr: &Expr) -> BTreeSet<String> {
        self.states_for_expr(node, expr)
            .map(|states| states.iter().map(|state| state.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn facts_at(&self, node: NodeIndex) -> Option<&Facts> {
        self.ctx.facts_at(node)
    }

    pub fn possible_matches(&self, edge: EdgeIndex) -> &[PossibleMatch] {
        self.ctx.possible_matches(edge)
    }

    /// Errors flagged so far, before any reachability check
    pub fn errors(&self) -> &[DetectedError] {
        self.ctx.errors()
    }

    pub fn outcome_failures(&self) -> &[OutcomeFailure] {
        self.ctx.outcome_failures()
    }

    /// Builds and prunes the exploded graph
    pub fn explode(
        &mut self,
        config: &EngineConfig,
    ) -> EngineResult<(ExplodeOutcome<'sg>, PruneStats)> {
        let outcome = build_exploded_graph(
            &mut self.ctx,
            self.supergraph,
            &self.states,
            config.max_exploded_nodes,
        )?;
        match outcome {
            ExplodeOutcome::Built(mut exploded) => {
                let stats = prune_exploded_graph(
                    &mut exploded,
                    config.max_prune_rounds,
                    config.max_fixpoint_iterations,
                )?;
                Ok((ExplodeOutcome::Built(exploded), stats))
            }
            too_complex => Ok((too_complex, PruneStats::default())),
        }
    }

    /// Whether some path from the program entry reaches `error`.
    ///
    /// An exploded graph over the size cap cannot disprove anything, so the
    /// error counts as reachable.
    pub fn is_error_reachable(
        &mut self,
        error: &DetectedError,
        config: &EngineConfig,
    ) -> EngineResult<bool> {
        match self.explode(config)?.0 {
            ExplodeOutcome::Built(exploded) => {
                let paths = ShortestPaths::from_entry(&exploded);
                Ok(find_target(&exploded, &paths, error).is_some())
            }
            ExplodeOutcome::TooComplex { .. } => Ok(true),
        }
    }
}
