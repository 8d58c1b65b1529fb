/*
 * Witness Paths
 *
 * 1. One BFS from the exploded entry gives every node's distance and
 *    parent edge (all edges cost 1)
 * 2. An error's target is the live exploded node at the triggering
 *    supergraph node holding the error's (class, state); no target means
 *    pruning proved the error unreachable
 * 3. The path to the target is walked backward once to find, per step, the
 *    expression standing for the erroneous value (through assignments,
 *    phi bindings and argument/parameter/return remapping), then forward
 *    to emit notes where that expression's states change or control
 *    crosses a function boundary
 */

use super::domain::{Note, Report};
use crate::features::checker::domain::State;
use crate::features::exploded_graph::{ExplodedGraph, ExplodedNode};
use crate::features::pattern_matching::Match;
use crate::features::states::DetectedError;
use crate::shared::models::{EdgeKind, Expr, Location, Rvalue, Statement, Supergraph};
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::FxHashMap;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, trace};

/// BFS tree rooted at the exploded entry
pub struct ShortestPaths {
    distance: FxHashMap<NodeIndex, usize>,
    parent: FxHashMap<NodeIndex, EdgeIndex>,
}

impl ShortestPaths {
    pub fn from_entry(exploded: &ExplodedGraph<'_>) -> Self {
        let graph = exploded.graph();
        let mut distance = FxHashMap::default();
        let mut parent = FxHashMap::default();
        let mut queue = VecDeque::new();

        distance.insert(exploded.entry(), 0);
        queue.push_back(exploded.entry());
        while let Some(node) = queue.pop_front() {
            let next_distance = distance[&node] + 1;
            let mut edges: Vec<(EdgeIndex, NodeIndex)> = graph
                .edges_directed(node, Direction::Outgoing)
                .map(|edge| (edge.id(), edge.target()))
                .collect();
            edges.sort();
            for (edge, target) in edges {
                if distance.contains_key(&target) {
                    continue;
                }
                distance.insert(target, next_distance);
                parent.insert(target, edge);
                queue.push_back(target);
            }
        }
        Self { distance, parent }
    }

    pub fn distance(&self, node: NodeIndex) -> Option<usize> {
        self.distance.get(&node).copied()
    }

    /// Edges from the entry to `node`, in order
    pub fn path_to(&self, exploded: &ExplodedGraph<'_>, node: NodeIndex) -> Option<Vec<EdgeIndex>> {
        self.distance(node)?;
        let mut path = Vec::new();
        let mut current = node;
        while let Some(&edge) = self.parent.get(&current) {
            path.push(edge);
            current = exploded.endpoints(edge)?.0;
        }
        path.reverse();
        Some(path)
    }
}

/// Closest exploded node standing for the error's (class, state)
pub fn find_target(
    exploded: &ExplodedGraph<'_>,
    paths: &ShortestPaths,
    error: &DetectedError,
) -> Option<NodeIndex> {
    let candidates = exploded.nodes_for(error.node);
    let closest = |nodes: Vec<NodeIndex>| {
        nodes
            .into_iter()
            .filter_map(|node| paths.distance(node).map(|distance| (distance, node)))
            .min()
            .map(|(_, node)| node)
    };

    let statewise: Vec<NodeIndex> = candidates
        .iter()
        .copied()
        .filter(|&node| {
            let data = &exploded.graph()[node];
            data.is_statewise_for(&error.class, &error.state)
                || data
                    .states
                    .class_containing(&error.expr)
                    .map_or(false, |class| data.is_statewise_for(class, &error.state))
        })
        .collect();
    if let Some(node) = closest(statewise) {
        return Some(node);
    }

    let holding: Vec<NodeIndex> = candidates
        .into_iter()
        .filter(|&node| {
            exploded.graph()[node]
                .states
                .states_for_expr(&error.expr)
                .map_or(false, |states| states.contains(&error.state))
        })
        .collect();
    closest(holding)
}

/// Builds the report for one error; `None` when no path reaches it
pub fn build_report(
    exploded: &ExplodedGraph<'_>,
    paths: &ShortestPaths,
    error: &DetectedError,
    machine: &str,
    emit_notes: bool,
) -> Option<Report> {
    let supergraph = exploded.supergraph;
    let target = match find_target(exploded, paths, error) {
        Some(target) => target,
        None => {
            debug!(
                message = %error.message,
                node = ?error.node,
                state = %error.state,
                "error has no surviving exploded node; dropped"
            );
            return None;
        }
    };
    let path = paths.path_to(exploded, target)?;

    let function = error
        .function
        .map(|id| supergraph.function(id))
        .or_else(|| supergraph.function_of(error.node));
    let location = error.location.clone().or_else(|| {
        function.and_then(|function| {
            function
                .end_location
                .clone()
                .or_else(|| function.location.clone())
        })
    });

    let notes = if emit_notes {
        witness_notes(exploded, &path, error, location.as_ref())
    } else {
        Vec::new()
    };

    Some(Report {
        machine: machine.to_string(),
        function: function.map(|function| function.name.clone()),
        location,
        message: error.message.clone(),
        cwe: error.cwe.clone(),
        notes,
    })
}

fn witness_notes(
    exploded: &ExplodedGraph<'_>,
    path: &[EdgeIndex],
    error: &DetectedError,
    error_location: Option<&Location>,
) -> Vec<Note> {
    let supergraph = exploded.supergraph;
    let graph = exploded.graph();
    let significant = significant_exprs(exploded, path, error);
    let mut notes = Vec::new();

    for (step, &edge) in path.iter().enumerate() {
        let (src, dst) = match exploded.endpoints(edge) {
            Some(endpoints) => endpoints,
            None => continue,
        };
        let (src_node, dst_node) = (&graph[src], &graph[dst]);
        let inner_edge = &graph[edge];
        let data = supergraph.edge(inner_edge.inner);
        let (src_expr, dst_expr) = (&significant[step], &significant[step + 1]);
        let location = supergraph.location_of(src_node.inner).cloned();

        match data.kind {
            EdgeKind::CallToStart => {
                if let (Some(location), Some(callee)) =
                    (location, supergraph.function_of(dst_node.inner))
                {
                    let message = if src_expr != dst_expr {
                        format!("{} passed to {}() as {}", src_expr, callee.name, dst_expr)
                    } else {
                        format!("call to {}()", callee.name)
                    };
                    notes.push(Note::new(location, message));
                }
                continue;
            }
            EdgeKind::ExitToReturnSite => {
                if let (Some(location), Some(callee)) =
                    (location, supergraph.function_of(src_node.inner))
                {
                    notes.push(Note::new(location, format!("returning from {}()", callee.name)));
                }
                continue;
            }
            _ => {}
        }

        let before = src_node.states.states_for_expr(src_expr);
        let after = dst_node.states.states_for_expr(dst_expr);
        if before == after {
            continue;
        }
        let location = match location {
            Some(location) => location,
            None => continue,
        };
        trace!(?edge, expr = %src_expr, "state change on witness path");
        let message = match describing_match(&inner_edge.matches, src_node, src_expr) {
            Some(matched) => matched.description(data.branch_value()),
            None => state_change_note(dst_expr, after),
        };
        notes.push(Note::new(location, message));
    }

    if !notes.is_empty() {
        if let Some(location) = error_location {
            notes.push(Note::new(location.clone(), error.message.clone()));
        }
    }
    notes
}

/// The match that binds the significant expression (or one of its class)
fn describing_match<'m>(
    matches: &'m [Match],
    src: &ExplodedNode,
    expr: &Expr,
) -> Option<&'m Match> {
    let class = src.states.class_containing(expr);
    matches
        .iter()
        .find(|matched| {
            matched.bindings.values().any(|bound| {
                let bound = bound.simplify();
                &bound == expr || class.map_or(false, |class| class.contains(&bound))
            })
        })
}

/// Note for a state change that no match on the edge explains
fn state_change_note(expr: &Expr, states: Option<&BTreeSet<State>>) -> String {
    let names: Vec<&str> = states
        .into_iter()
        .flatten()
        .map(|state| state.name.as_str())
        .collect();
    if names.is_empty() {
        format!("state of {} changes", expr)
    } else {
        format!("{} becomes {}", expr, names.join(" or "))
    }
}

/// Significant expression at every node of the path (one more entry than
/// the path has edges), computed backward from the error's expression
fn significant_exprs(
    exploded: &ExplodedGraph<'_>,
    path: &[EdgeIndex],
    error: &DetectedError,
) -> Vec<Expr> {
    let supergraph = exploded.supergraph;
    let mut exprs = vec![error.expr.simplify(); path.len() + 1];
    for (step, &edge) in path.iter().enumerate().rev() {
        let current = exprs[step + 1].clone();
        let inner = exploded.graph()[edge].inner;
        exprs[step] = remap_backward(supergraph, inner, &current);
    }
    exprs
}

/// Expression at the source of `edge` that holds what `expr` holds at its
/// target
fn remap_backward(
    supergraph: &Supergraph,
    edge: petgraph::graph::EdgeIndex,
    expr: &Expr,
) -> Expr {
    let data = supergraph.edge(edge);
    let (from, to) = supergraph.endpoints(edge);
    match data.kind {
        EdgeKind::CallToStart => {
            let callee = supergraph.function_of(to);
            let args = supergraph.call_at(from).map(|(_, args)| args);
            if let (Some(callee), Some(args)) = (callee, args) {
                for (param, arg) in callee.param_exprs().iter().zip(args) {
                    if param == expr {
                        return arg.simplify();
                    }
                }
            }
            expr.clone()
        }
        EdgeKind::ExitToReturnSite => {
            let callee = supergraph.function_of(from);
            let call = data.call_site.and_then(|call| supergraph.call_at(call));
            if let (Some(callee), Some((result, args))) = (callee, call) {
                if let (Some(result), Some(ret)) = (result, callee.return_value.as_ref()) {
                    if &result.simplify() == expr {
                        return ret.simplify();
                    }
                }
                for (param, arg) in callee.param_exprs().into_iter().zip(args) {
                    if &arg.simplify() == expr {
                        return param;
                    }
                }
            }
            expr.clone()
        }
        _ => match &supergraph.node(from).stmt {
            Some(Statement::Assign {
                lhs,
                rhs: Rvalue::Use(rhs),
            })
            | Some(Statement::Phi { lhs, rhs })
                if &lhs.simplify() == expr =>
            {
                match rhs.simplify() {
                    source @ (Expr::Var(_) | Expr::Ssa { .. }) => source,
                    _ => expr.clone(),
                }
            }
            _ => expr.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::checker::domain::Pattern;
    use crate::features::exploded_graph::ExplodedNodeKind;
    use crate::features::states::StatesForNode;
    use crate::shared::models::{FunctionId, TypeKind, Variable};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn local(name: &str) -> Expr {
        Expr::var(Variable::local(name, FunctionId(0), TypeKind::Pointer))
    }

    fn free_of(expr: &Expr) -> Match {
        let bindings = BTreeMap::from([("ptr".to_string(), expr.clone())]);
        Match::new(Pattern::args_of_call("free", vec!["ptr".into()]), bindings)
    }

    fn node_with_class(class: &[Expr]) -> ExplodedNode {
        let mut states = StatesForNode::new(petgraph::graph::NodeIndex::new(0));
        states.set_states(
            class.iter().cloned().collect(),
            BTreeSet::from([State::new("ptr.nonnull")]),
        );
        ExplodedNode {
            inner: petgraph::graph::NodeIndex::new(0),
            kind: ExplodedNodeKind::Solo,
            states,
        }
    }

    #[test]
    fn test_describing_match_prefers_binding_of_the_class() {
        let (p, q) = (local("p"), local("q"));
        let node = node_with_class(&[p.clone(), q.clone()]);
        let matches = vec![free_of(&local("other")), free_of(&q)];
        assert_eq!(describing_match(&matches, &node, &p), Some(&matches[1]));
    }

    #[test]
    fn test_unrelated_match_does_not_describe_the_change() {
        let p = local("p");
        let node = node_with_class(&[p.clone()]);
        let matches = vec![free_of(&local("other"))];
        assert_eq!(describing_match(&matches, &node, &p), None);
        assert_eq!(
            state_change_note(&p, Some(&BTreeSet::from([State::new("ptr.free")]))),
            "p becomes ptr.free"
        );
        assert_eq!(state_change_note(&p, None), "state of p changes");
    }
}
