/*
 * State Machine Analysis
 *
 * One run of one compiled state machine over one supergraph:
 * 1. Facts fixed point over the supergraph
 * 2. Leak discovery and possible-match precomputation
 * 3. States fixed point (rules applied, errors flagged)
 * 4. Exploded graph, facts re-run over it, infeasible nodes pruned
 * 5. Every flagged error checked for a witness path and reported
 *
 * Size caps end the run with `TooComplex` instead of an error.
 */

use super::result::{AnalysisOutcome, AnalysisReport, AnalysisStats, ComplexityLimit};
use super::solution::Solution;
use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::features::checker::{CompiledMachine, StateMachine};
use crate::features::exploded_graph::ExplodeOutcome;
use crate::features::facts::{Facts, FactsContext};
use crate::features::fixpoint::FixpointSolver;
use crate::features::pattern_matching::{find_leaks, precompute_possible_matches};
use crate::features::reporting::report_errors;
use crate::features::states::{AnalysisContext, StatesForNode};
use crate::shared::models::Supergraph;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub struct StateMachineAnalysis {
    machine: Arc<CompiledMachine>,
    config: EngineConfig,
}

impl StateMachineAnalysis {
    /// Validates the configuration and compiles the machine; DSL structural
    /// errors surface here, before any program is looked at
    pub fn new(machine: &StateMachine, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let compiled = CompiledMachine::compile(machine)?;
        debug!(machine = compiled.name(), "state machine compiled");
        Ok(Self {
            machine: Arc::new(compiled),
            config,
        })
    }

    pub fn machine(&self) -> &CompiledMachine {
        &self.machine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs the facts and states passes
    pub fn solve<'sg>(&self, supergraph: &'sg Supergraph) -> EngineResult<Solution<'sg>> {
        let limit = self.config.max_fixpoint_iterations;

        let facts = FixpointSolver::new(supergraph, "facts")
            .with_max_iterations(limit)
            .solve::<Facts>(&mut FactsContext::default())?;
        info!(
            machine = self.machine.name(),
            iterations = facts.stats.iterations,
            reachable = facts.stats.reachable_nodes,
            "facts pass done"
        );

        let leaks = find_leaks(supergraph, &facts, &self.machine);
        let possible = precompute_possible_matches(supergraph, &self.machine, &leaks);
        let leaked_exprs = leaks.values().map(Vec::len).sum();
        let possible_matches = possible.values().map(Vec::len).sum();
        info!(
            machine = self.machine.name(),
            leaked = leaked_exprs,
            possible_matches,
            "matches precomputed"
        );

        let mut ctx = AnalysisContext::new(supergraph, Arc::clone(&self.machine), facts, possible);
        let states = FixpointSolver::new(supergraph, "states")
            .with_max_iterations(limit)
            .solve::<StatesForNode>(&mut ctx)?;
        info!(
            machine = self.machine.name(),
            iterations = states.stats.iterations,
            errors = ctx.errors().len(),
            "states pass done"
        );

        Ok(Solution {
            supergraph,
            ctx,
            states,
            leaked_exprs,
            possible_matches,
        })
    }

    pub fn run(&self, supergraph: &Supergraph) -> EngineResult<AnalysisOutcome> {
        let started = Instant::now();
        if supergraph.node_count() > self.config.max_supergraph_nodes {
            info!(
                machine = self.machine.name(),
                nodes = supergraph.node_count(),
                "supergraph too complex"
            );
            return Ok(AnalysisOutcome::TooComplex {
                limit: ComplexityLimit::Supergraph,
                nodes: supergraph.node_count(),
                max: self.config.max_supergraph_nodes,
            });
        }

        let mut solution = self.solve(supergraph)?;
        let reachable = supergraph
            .functions()
            .iter()
            .any(|function| solution.facts_at(function.entry).is_some());
        if !reachable {
            info!(machine = self.machine.name(), "no function reachable from the entry");
            return Ok(AnalysisOutcome::Unreachable);
        }

        let mut stats = AnalysisStats {
            supergraph_nodes: supergraph.node_count(),
            supergraph_edges: supergraph.edge_count(),
            facts_iterations: solution.ctx.facts().stats.iterations,
            states_iterations: solution.states.stats.iterations,
            leaked_exprs: solution.leaked_exprs,
            possible_matches: solution.possible_matches,
            ..AnalysisStats::default()
        };

        let (exploded, prune) = solution.explode(&self.config)?;
        let exploded = match exploded {
            ExplodeOutcome::Built(exploded) => exploded,
            ExplodeOutcome::TooComplex { nodes, limit } => {
                info!(machine = self.machine.name(), nodes, "exploded graph too complex");
                return Ok(AnalysisOutcome::TooComplex {
                    limit: ComplexityLimit::ExplodedGraph,
                    nodes,
                    max: limit,
                });
            }
        };
        stats.exploded_nodes = exploded.node_count();
        stats.exploded_edges = exploded.edge_count();
        stats.prune_rounds = prune.rounds;
        stats.pruned_nodes = prune.infeasible_nodes + prune.orphaned_nodes;
        stats.exploded_facts_iterations = prune.facts_iterations;

        let errors = solution.ctx.take_errors();
        stats.errors_found = errors.len();
        let batch = report_errors(&exploded, errors, self.machine.name(), self.config.emit_notes);
        stats.errors_reported = batch.reports.len();
        stats.duration = started.elapsed();

        info!(
            machine = self.machine.name(),
            found = stats.errors_found,
            reported = stats.errors_reported,
            exploded_nodes = stats.exploded_nodes,
            pruned = stats.pruned_nodes,
            elapsed_ms = stats.duration.as_millis() as u64,
            "analysis complete"
        );
        Ok(AnalysisOutcome::Analyzed(AnalysisReport {
            machine: self.machine.name().to_string(),
            reports: batch.reports,
            suppressed: batch.suppressed,
            outcome_failures: solution.ctx.take_outcome_failures(),
            stats,
        }))
    }
}
