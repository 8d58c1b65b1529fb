//! Custom assertions for test verification

use smcheck_engine::config::EngineConfig;
use smcheck_engine::features::exploded_graph::{ExplodeOutcome, ExplodedGraph};
use smcheck_engine::features::reporting::{find_target, ShortestPaths};
use smcheck_engine::features::states::DetectedError;
use smcheck_engine::pipeline::Solution;
use smcheck_engine::shared::models::{CmpOp, Expr};
use petgraph::graph::NodeIndex;
use std::collections::BTreeSet;

/// Assert the exact set of state names `expr` may hold at `node`
pub fn assert_statenames(solution: &Solution<'_>, node: NodeIndex, expr: &Expr, expected: &[&str]) {
    let actual = solution.statenames_for_expr(node, expr);
    let expected: BTreeSet<String> = expected.iter().map(|name| name.to_string()).collect();
    assert_eq!(
        actual, expected,
        "states of {expr} at {node:?}: expected {expected:?}, got {actual:?}"
    );
}

/// Assert that `lhs OP rhs` is known at `node`
pub fn assert_fact(solution: &Solution<'_>, node: NodeIndex, lhs: &Expr, op: CmpOp, rhs: &Expr) {
    let facts = solution
        .facts_at(node)
        .unwrap_or_else(|| panic!("{node:?} is unreachable"));
    assert!(
        facts.has(lhs, op, rhs),
        "expected {lhs} {op} {rhs} at {node:?}, facts are {facts}"
    );
}

/// Assert that no witness path reaches `error`
pub fn assert_error_is_impossible(solution: &mut Solution<'_>, error: &DetectedError) {
    let reachable = solution
        .is_error_reachable(error, &EngineConfig::default())
        .expect("exploded graph builds");
    assert!(!reachable, "error '{}' should be impossible", error.message);
}

pub fn assert_error_is_reachable(solution: &mut Solution<'_>, error: &DetectedError) {
    let reachable = solution
        .is_error_reachable(error, &EngineConfig::default())
        .expect("exploded graph builds");
    assert!(reachable, "error '{}' should be reachable", error.message);
}

/// Builds the pruned exploded graph, failing the test if it is too large
pub fn explode<'sg>(solution: &mut Solution<'sg>) -> ExplodedGraph<'sg> {
    match solution.explode(&EngineConfig::default()).expect("exploded graph builds").0 {
        ExplodeOutcome::Built(exploded) => exploded,
        ExplodeOutcome::TooComplex { nodes, limit } => {
            panic!("exploded graph too complex: {nodes} > {limit}")
        }
    }
}

/// Assert that the witness path to `error` uses live edges only, starts at
/// the entry, chains end to end and stops at the error's (class, state)
pub fn assert_witness_path_is_valid(exploded: &ExplodedGraph<'_>, error: &DetectedError) {
    let paths = ShortestPaths::from_entry(exploded);
    let target = find_target(exploded, &paths, error).expect("error has a target node");
    let path = paths.path_to(exploded, target).expect("target is reachable");

    let mut current = exploded.entry();
    for edge in &path {
        assert!(exploded.contains_edge(*edge), "{edge:?} was pruned");
        let (src, dst) = exploded.endpoints(*edge).expect("live edge");
        assert_eq!(src, current, "path is not contiguous at {edge:?}");
        current = dst;
    }
    assert_eq!(current, target);

    let node = exploded.node(target).expect("target is live");
    assert_eq!(node.inner, error.node);
    let states = node
        .states
        .states_for_expr(&error.expr)
        .expect("target tracks the error's expression");
    assert!(states.contains(&error.state));
}
