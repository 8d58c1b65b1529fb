//! Possible-match precomputation
//!
//! Runs every rule of the machine against every intraprocedural edge once,
//! before the states pass, and resolves boolean guards against the edge.

use super::leaks::Leaks;
use super::matcher::Matcher;
use crate::features::checker::domain::Outcome;
use crate::features::checker::CompiledMachine;
use crate::features::pattern_matching::domain::PossibleMatch;
use crate::shared::models::{EdgeKind, Expr, Statement, Supergraph};
use petgraph::graph::EdgeIndex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

pub type PossibleMatches = FxHashMap<EdgeIndex, Vec<PossibleMatch>>;

pub fn precompute_possible_matches(
    supergraph: &Supergraph,
    machine: &CompiledMachine,
    leaks: &Leaks,
) -> PossibleMatches {
    let matcher = Matcher::new(machine);
    let stateful = machine.stateful_decl().name.as_str();
    let mut possible = PossibleMatches::default();

    for edge in supergraph.edge_indices() {
        let data = supergraph.edge(edge);
        if data.kind != EdgeKind::Intraprocedural {
            continue;
        }
        let stmt = supergraph.node(supergraph.source(edge)).stmt.as_ref();
        let leaked = leaks.get(&edge).map(Vec::as_slice).unwrap_or(&[]);
        if stmt.is_none() && leaked.is_empty() {
            continue;
        }
        let assigned = stmt.and_then(Statement::defined_expr).map(Expr::simplify);
        let branch = data.branch_value();

        let mut found = Vec::new();
        for clause in machine.clauses() {
            for rule in &clause.rules {
                let outcomes: Vec<Outcome> = rule
                    .outcomes
                    .iter()
                    .filter_map(|outcome| outcome.resolve_for_edge(branch))
                    .cloned()
                    .collect();
                if outcomes.is_empty() {
                    continue;
                }

                let mut matches = stmt
                    .map(|stmt| matcher.iter_matches(&rule.pattern, stmt))
                    .unwrap_or_default();
                matches.extend(matcher.iter_leak_matches(&rule.pattern, leaked));

                for matched in matches {
                    let expr = match matched.binding(stateful) {
                        Some(expr) => expr.clone(),
                        None => continue,
                    };
                    found.push(PossibleMatch {
                        assigns_expr: assigned.as_ref() == Some(&expr),
                        expr,
                        statenames: clause.states.clone(),
                        pattern: rule.pattern.clone(),
                        outcomes: outcomes.clone(),
                        matched,
                        rule_location: rule.location.clone().or_else(|| clause.location.clone()),
                    });
                }
            }
        }

        if !found.is_empty() {
            trace!(?edge, count = found.len(), "possible matches");
            possible.insert(edge, found);
        }
    }

    debug!(
        machine = machine.name(),
        edges = possible.len(),
        "possible matches precomputed"
    );
    possible
}
