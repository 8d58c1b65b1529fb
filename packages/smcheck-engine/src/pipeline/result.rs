//! Pipeline result types

use crate::features::reporting::{render_reports, Report};
use crate::features::states::{DetectedError, OutcomeFailure};
use serde::Serialize;
use std::time::Duration;

/// Counters gathered across the passes of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub supergraph_nodes: usize,
    pub supergraph_edges: usize,
    pub facts_iterations: usize,
    pub states_iterations: usize,
    pub leaked_exprs: usize,
    pub possible_matches: usize,
    pub exploded_nodes: usize,
    pub exploded_edges: usize,
    pub prune_rounds: usize,
    pub pruned_nodes: usize,
    pub exploded_facts_iterations: usize,
    pub errors_found: usize,
    pub errors_reported: usize,
    pub duration: Duration,
}

/// Which size cap a run hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComplexityLimit {
    Supergraph,
    ExplodedGraph,
}

/// Output of one state machine over one supergraph
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub machine: String,
    /// Reachable errors in source order
    pub reports: Vec<Report>,
    /// Errors proven unreachable by the exploded graph
    pub suppressed: Vec<DetectedError>,
    pub outcome_failures: Vec<OutcomeFailure>,
    pub stats: AnalysisStats,
}

impl AnalysisReport {
    pub fn has_errors(&self) -> bool {
        !self.reports.is_empty()
    }

    /// GCC-style diagnostics text
    pub fn render(&self) -> String {
        render_reports(&self.reports)
    }
}

#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Analyzed(AnalysisReport),
    /// A graph grew past its configured cap; nothing is reported
    TooComplex {
        limit: ComplexityLimit,
        nodes: usize,
        max: usize,
    },
    /// No function is reachable from the program entry
    Unreachable,
}

impl AnalysisOutcome {
    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Analyzed(report) => Some(report),
            _ => None,
        }
    }

    pub fn reports(&self) -> &[Report] {
        self.report().map_or(&[], |report| report.reports.as_slice())
    }
}

/// Outcome of one machine of a checker
#[derive(Debug, Clone)]
pub struct MachineRun {
    pub machine: String,
    pub outcome: AnalysisOutcome,
}
