//! Leak discovery
//!
//! A local "leaks" along an edge into its function's exit node unless it is
//! an alias of the returned value or an equality ties it to storage that
//! outlives the function.

use crate::features::checker::CompiledMachine;
use crate::features::facts::Facts;
use crate::features::fixpoint::FixpointSolution;
use crate::shared::models::{Expr, NodeKind, Statement, Supergraph, VarKind};
use petgraph::graph::{EdgeIndex, NodeIndex};
use rustc_hash::FxHashMap;
use tracing::trace;

pub type Leaks = FxHashMap<EdgeIndex, Vec<Expr>>;

pub fn find_leaks(
    supergraph: &Supergraph,
    facts: &FixpointSolution<NodeIndex, Facts>,
    machine: &CompiledMachine,
) -> Leaks {
    let stateful = machine.stateful_decl();
    let mut leaks = Leaks::default();

    for edge in supergraph.edge_indices() {
        let (src, dst) = supergraph.endpoints(edge);
        if supergraph.node(dst).kind != NodeKind::Exit {
            continue;
        }
        let (function, src_facts) = match (supergraph.function_of(dst), facts.value(src)) {
            (Some(function), Some(src_facts)) => (function, src_facts),
            _ => continue,
        };

        let returned = match &supergraph.node(src).stmt {
            Some(Statement::Return { value }) => value.as_ref().map(Expr::simplify),
            _ => function.return_value.clone(),
        };
        let retval_aliases = returned
            .map(|value| src_facts.get_var_aliases(&value))
            .unwrap_or_default();

        let leaked: Vec<Expr> = function
            .locals
            .iter()
            .filter(|var| var.kind == VarKind::Local)
            .map(|var| Expr::Var(var.clone()))
            .filter(|local| stateful.accepts(local))
            .filter(|local| !retval_aliases.contains(local))
            .filter(|local| !src_facts.expr_is_referenced_externally(local, function.id))
            .collect();

        if !leaked.is_empty() {
            trace!(?edge, function = %function.name, count = leaked.len(), "locals leave scope");
            leaks.insert(edge, leaked);
        }
    }
    leaks
}
