/*
 * States Edge Transfer
 *
 * Priorities per edge:
 * 1. Infeasible edges (facts `None` at either end, or facts along the edge
 *    impossible) carry nothing
 * 2. Interprocedural edges remap states between caller and callee:
 *    - call-to-start: parameters take their argument's states, callee
 *      locals start at the default state
 *    - exit-to-return-site: the call result takes the returned value's
 *      states and every argument takes its parameter's states
 *    - call-to-return-site: nothing; the callee's exit supplies the states
 * 3. `lhs = var`, `lhs = var.field` and split phi nodes copy the source's
 *    states onto `lhs` without consulting any rule other than leaks of
 *    locals going out of scope on the same edge
 * 4. Otherwise every possible match on the edge is applied to each source
 *    state it accepts; results are unioned and unmatched states pass
 *
 * Finally the per-expression states are regrouped into the destination's
 * equivalence classes. Classes of other functions travel through unchanged.
 */

use super::context::AnalysisContext;
use crate::errors::EngineResult;
use crate::features::checker::domain::{ActionContext, Outcome, Pattern, State};
use crate::features::facts::{self, FactsContext};
use crate::features::fixpoint::AbstractValue;
use crate::features::pattern_matching::{Match, PossibleMatch};
use crate::features::states::domain::{
    class_in_scope, class_owner, DetectedError, EquivClass, OutcomeFailure, StatesForNode,
};
use crate::shared::models::{EdgeKind, Expr, FunctionId, Location, Rvalue, Statement, Supergraph};
use petgraph::graph::{EdgeIndex, NodeIndex};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{trace, warn};

type ExprStates = FxHashMap<Expr, BTreeSet<State>>;
type Extras = Vec<(EquivClass, BTreeSet<State>)>;

impl AbstractValue<Supergraph> for StatesForNode {
    type Context = AnalysisContext;
    /// Matches whose outcomes were applied along the edge
    type Details = Vec<Match>;

    fn make_entry_point(ctx: &mut AnalysisContext, _graph: &Supergraph, node: NodeIndex) -> Self {
        let mut value = StatesForNode::new(node);
        for class in ctx.classes_at(node) {
            value.set_states(class, ctx.defaults().clone());
        }
        value
    }

    fn get_edge_value(
        ctx: &mut AnalysisContext,
        graph: &Supergraph,
        src: &Self,
        edge: EdgeIndex,
    ) -> EngineResult<(Option<Self>, Vec<Match>)> {
        transfer_edge(ctx, graph, src, edge)
    }

    fn meet(ctx: &AnalysisContext, lhs: &Self, rhs: &Self) -> Self {
        lhs.meet(rhs, ctx.defaults(), ctx.function_of(lhs.node()))
    }

    fn set_location(ctx: &mut AnalysisContext, location: Option<&Location>) {
        ctx.set_location(location.cloned());
    }
}

/// States flowing along `edge` out of `src` (which need not be the full
/// value at the source node: the exploded graph passes restricted subsets)
pub fn transfer_edge(
    ctx: &mut AnalysisContext,
    supergraph: &Supergraph,
    src: &StatesForNode,
    edge: EdgeIndex,
) -> EngineResult<(Option<StatesForNode>, Vec<Match>)> {
    let (from, to) = supergraph.endpoints(edge);
    if !edge_is_feasible(ctx, supergraph, from, to, edge) {
        trace!(?edge, "states: edge infeasible");
        return Ok((None, Vec::new()));
    }

    let data = supergraph.edge(edge);
    let result = match data.kind {
        EdgeKind::CallToReturnSite => return Ok((None, Vec::new())),
        EdgeKind::FakeEntry => {
            let (exprs, extras) = split(src, ctx.function_of(to));
            (Some(rekey(ctx, to, exprs, extras)), Vec::new())
        }
        EdgeKind::CallToStart => (call_to_start(ctx, supergraph, src, from, to), Vec::new()),
        EdgeKind::ExitToReturnSite => match data.call_site {
            Some(call_site) => (
                exit_to_return_site(ctx, supergraph, src, from, to, call_site),
                Vec::new(),
            ),
            None => (None, Vec::new()),
        },
        EdgeKind::Intraprocedural => intraprocedural(ctx, supergraph, src, edge, from, to),
    };
    if let Some(value) = &result.0 {
        trace!(?edge, states = %value, "states transfer");
    }
    Ok(result)
}

fn edge_is_feasible(
    ctx: &AnalysisContext,
    supergraph: &Supergraph,
    from: NodeIndex,
    to: NodeIndex,
    edge: EdgeIndex,
) -> bool {
    let src_facts = match (ctx.facts_at(from), ctx.facts_at(to)) {
        (Some(src_facts), Some(_)) => src_facts,
        _ => return false,
    };
    let mut facts_ctx = FactsContext::default();
    facts::transfer_edge(&mut facts_ctx, supergraph, src_facts, edge)
        .map_or(false, |facts| facts.is_possible())
}

/// In-scope classes flattened to per-expression states; out-of-scope
/// classes kept whole
fn split(src: &StatesForNode, scope: Option<FunctionId>) -> (ExprStates, Extras) {
    let mut exprs = ExprStates::default();
    let mut extras = Extras::new();
    for (class, states) in src.iter() {
        if class_in_scope(class, scope) {
            for expr in class {
                exprs
                    .entry(expr.clone())
                    .or_default()
                    .extend(states.iter().cloned());
            }
        } else {
            extras.push((class.clone(), states.clone()));
        }
    }
    (exprs, extras)
}

fn rekey(ctx: &mut AnalysisContext, dst: NodeIndex, exprs: ExprStates, extras: Extras) -> StatesForNode {
    let mut value = StatesForNode::new(dst);
    for class in ctx.classes_at(dst) {
        let mut states: BTreeSet<State> = class
            .iter()
            .filter_map(|expr| exprs.get(expr))
            .flat_map(|states| states.iter().cloned())
            .collect();
        if states.is_empty() {
            states = ctx.defaults().clone();
        }
        value.set_states(class, states);
    }
    for (class, states) in extras {
        value.add_states(class, states);
    }
    value
}

fn without_function(src: &StatesForNode, function: FunctionId) -> StatesForNode {
    let mut filtered = src.clone();
    let owned: Vec<EquivClass> = src
        .classes()
        .filter(|class| class_owner(class) == Some(function))
        .cloned()
        .collect();
    for class in &owned {
        filtered.remove_class(class);
    }
    filtered
}

fn call_to_start(
    ctx: &mut AnalysisContext,
    supergraph: &Supergraph,
    src: &StatesForNode,
    call: NodeIndex,
    entry: NodeIndex,
) -> Option<StatesForNode> {
    let callee = supergraph.function_of(entry)?;
    let (_, args) = supergraph.call_at(call)?;

    // Stale classes of the callee (recursion) never reach its entry
    let filtered = without_function(src, callee.id);
    let (mut exprs, extras) = split(&filtered, Some(callee.id));
    for (param, arg) in callee.param_exprs().into_iter().zip(args) {
        if let Some(states) = src.states_for_expr(arg) {
            exprs.insert(param, states.clone());
        }
    }
    Some(rekey(ctx, entry, exprs, extras))
}

fn exit_to_return_site(
    ctx: &mut AnalysisContext,
    supergraph: &Supergraph,
    src: &StatesForNode,
    exit: NodeIndex,
    return_site: NodeIndex,
    call_site: NodeIndex,
) -> Option<StatesForNode> {
    let callee = supergraph.function_of(exit)?;
    let (result, args) = supergraph.call_at(call_site)?;

    let filtered = without_function(src, callee.id);
    let (mut exprs, extras) = split(&filtered, ctx.function_of(return_site));
    for (param, arg) in callee.param_exprs().iter().zip(args) {
        if let Some(states) = src.states_for_expr(param) {
            exprs.insert(arg.simplify(), states.clone());
        }
    }
    if let Some(result) = result {
        let states = callee
            .return_value
            .as_ref()
            .and_then(|value| src.states_for_expr(value))
            .cloned()
            .unwrap_or_else(|| ctx.defaults().clone());
        exprs.insert(result.simplify(), states);
    }
    Some(rekey(ctx, return_site, exprs, extras))
}

/// Source of a plain copy: a variable, or the base of a member load from a
/// variable
fn assignment_source(rhs: &Expr) -> Option<Expr> {
    match rhs.simplify() {
        expr @ (Expr::Var(_) | Expr::Ssa { .. }) => Some(expr),
        Expr::Field { base, .. } => assignment_source(&base),
        _ => None,
    }
}

fn intraprocedural(
    ctx: &mut AnalysisContext,
    supergraph: &Supergraph,
    src: &StatesForNode,
    edge: EdgeIndex,
    from: NodeIndex,
    to: NodeIndex,
) -> (Option<StatesForNode>, Vec<Match>) {
    let (mut exprs, extras) = split(src, ctx.function_of(to));

    let copied = match &supergraph.node(from).stmt {
        Some(Statement::Assign {
            lhs,
            rhs: Rvalue::Use(rhs),
        })
        | Some(Statement::Phi { lhs, rhs }) => {
            assignment_source(rhs).map(|source| (lhs.simplify(), source))
        }
        _ => None,
    };
    if let Some((lhs, source)) = copied {
        let states = src
            .states_for_expr(&source)
            .cloned()
            .unwrap_or_else(|| ctx.defaults().clone());
        exprs.insert(lhs, states);
        let copied = rekey(ctx, to, exprs, extras);

        // Locals leaving scope on this edge leak from their copied states
        let (mut exprs, extras) = split(&copied, ctx.function_of(to));
        let matches = apply_possible_matches(ctx, supergraph, &copied, edge, from, &mut exprs, |pm| {
            matches!(pm.pattern, Pattern::Leaked { .. })
        });
        if matches.is_empty() {
            return (Some(copied), matches);
        }
        return (Some(rekey(ctx, to, exprs, extras)), matches);
    }

    let matches = apply_possible_matches(ctx, supergraph, src, edge, from, &mut exprs, |_| true);
    (Some(rekey(ctx, to, exprs, extras)), matches)
}

fn apply_possible_matches(
    ctx: &mut AnalysisContext,
    supergraph: &Supergraph,
    src: &StatesForNode,
    edge: EdgeIndex,
    from: NodeIndex,
    exprs: &mut ExprStates,
    keep: impl Fn(&PossibleMatch) -> bool,
) -> Vec<Match> {
    let possible: Vec<PossibleMatch> = ctx
        .possible_matches(edge)
        .iter()
        .filter(|pm| keep(pm))
        .cloned()
        .collect();
    let mut applied: Vec<Match> = Vec::new();
    if possible.is_empty() {
        return applied;
    }

    // Expressions updated together share the same source class
    let mut groups: BTreeMap<Vec<Expr>, (EquivClass, Vec<&PossibleMatch>)> = BTreeMap::new();
    for pm in &possible {
        let class = match src.class_containing(&pm.expr) {
            Some(class) => class.clone(),
            None => continue,
        };
        let targets: Vec<Expr> = if pm.assigns_expr {
            vec![pm.expr.simplify()]
        } else {
            class.iter().cloned().collect()
        };
        groups
            .entry(targets)
            .or_insert_with(|| (class, Vec::new()))
            .1
            .push(pm);
    }

    for (targets, (class, pms)) in groups {
        let current = match src.states_for_class(&class) {
            Some(states) => states.clone(),
            None => continue,
        };
        let mut next = BTreeSet::new();
        for state in &current {
            let mut matched_any = false;
            for pm in pms.iter().filter(|pm| pm.applies_to(state)) {
                matched_any = true;
                next.extend(apply_outcomes(ctx, supergraph, from, &class, pm, state));
                if !applied.contains(&pm.matched) {
                    applied.push(pm.matched.clone());
                }
            }
            if !matched_any {
                next.insert(state.clone());
            }
        }
        for target in targets {
            exprs.insert(target, next.clone());
        }
    }
    applied
}

/// States after running one match's outcomes from `state`
fn apply_outcomes(
    ctx: &mut AnalysisContext,
    supergraph: &Supergraph,
    node: NodeIndex,
    class: &EquivClass,
    pm: &PossibleMatch,
    state: &State,
) -> BTreeSet<State> {
    let mut result = BTreeSet::from([state.clone()]);
    for outcome in &pm.outcomes {
        let action = match outcome {
            Outcome::TransitionTo(target) => {
                result = BTreeSet::from([target.clone()]);
                continue;
            }
            // Guards were resolved against the edge when the match was found
            Outcome::Boolean { .. } => continue,
            Outcome::Action(action) => action,
        };

        let location = ctx.location().cloned();
        let (run, effects) = {
            let namespace = ctx.namespace_mut();
            let mut action_ctx = ActionContext::new(
                &pm.matched.bindings,
                &pm.expr,
                state,
                location.as_ref(),
                namespace,
            );
            let run = action.run(&mut action_ctx);
            (run, action_ctx.into_effects())
        };
        ctx.namespace_mut().clear();

        if let Err(err) = run {
            warn!(
                action = %action.name,
                location = ?location,
                error = %err,
                "outcome failed; skipping it"
            );
            ctx.record_failure(OutcomeFailure {
                action: action.name.clone(),
                message: err.to_string(),
                location,
            });
            continue;
        }

        let (new_states, raised) = effects;
        if !new_states.is_empty() {
            result = new_states.into_iter().collect();
        }
        for raised in raised {
            let error = DetectedError {
                node,
                function: ctx.function_of(node),
                class: class.clone(),
                expr: pm.expr.clone(),
                state: state.clone(),
                message: raised.message,
                cwe: raised.cwe,
                matched: pm.matched.clone(),
                location: supergraph.location_of(node).cloned(),
                rule_location: pm.rule_location.clone(),
            };
            ctx.record_error(error);
        }
    }
    result
}
