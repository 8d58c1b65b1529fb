/*
 * Facts Edge Transfer
 *
 * Computes the facts flowing along one supergraph edge.
 *
 * # Statement rules
 * - `lhs = rhs`            : kill facts mentioning lhs, add `lhs == rhs`
 * - `lhs = base.field`     : same; facts on the field expression reach lhs
 *                            through the new equality
 * - `lhs = a OP k`         : re-derive `lhs OP2 K'` from every `a OP2 K`
 * - `lhs = f(...)`         : kill facts on lhs and on `&x` arguments
 * - conditional edge       : add the condition, or its inverse on false
 * - switch edge            : equality or range from the bound case labels
 * - split phi node         : assignment from the incoming value
 * - unsupported rvalues    : kill facts mentioning lhs
 *
 * Interprocedural edges are handled in `interprocedural.rs`.
 */

use super::interprocedural::{call_to_start, exit_to_return_site};
use crate::errors::EngineResult;
use crate::features::facts::domain::{Fact, Facts};
use crate::features::fixpoint::{AbstractValue, SupergraphView};
use crate::shared::models::{
    BinaryOp, CaseLabel, CmpOp, EdgeKind, Expr, Location, Rvalue, Statement, Supergraph,
    UnaryOp,
};
use petgraph::graph::EdgeIndex;
use tracing::{trace, warn};

/// Per-pass state for the facts solver
#[derive(Debug, Default)]
pub struct FactsContext {
    /// Location of the statement whose out-edges are being evaluated
    pub location: Option<Location>,
    /// Statements whose shape forced facts to be dropped
    pub degraded: usize,
}

impl<G: SupergraphView> AbstractValue<G> for Facts {
    type Context = FactsContext;
    type Details = ();

    fn make_entry_point(_ctx: &mut FactsContext, _graph: &G, _node: G::NodeId) -> Self {
        Facts::new()
    }

    fn get_edge_value(
        ctx: &mut FactsContext,
        graph: &G,
        src: &Self,
        edge: G::EdgeId,
    ) -> EngineResult<(Option<Self>, ())> {
        let value = transfer_edge(ctx, graph.supergraph(), src, graph.inner_edge(edge))
            .filter(Facts::is_possible);
        Ok((value, ()))
    }

    fn meet(_ctx: &FactsContext, lhs: &Self, rhs: &Self) -> Self {
        lhs.meet(rhs)
    }

    fn set_location(ctx: &mut FactsContext, location: Option<&Location>) {
        ctx.location = location.cloned();
    }
}

/// Facts after `edge`, before the feasibility filter; `None` when the edge
/// shape makes no sense (e.g. an exit edge without a call site)
pub fn transfer_edge(
    ctx: &mut FactsContext,
    supergraph: &Supergraph,
    src: &Facts,
    edge: EdgeIndex,
) -> Option<Facts> {
    let data = supergraph.edge(edge);
    let (from, to) = supergraph.endpoints(edge);

    match data.kind {
        EdgeKind::FakeEntry => Some(src.clone()),
        EdgeKind::CallToStart => call_to_start(supergraph, src, from, to),
        EdgeKind::ExitToReturnSite => exit_to_return_site(supergraph, src, from, data.call_site?),
        EdgeKind::Intraprocedural | EdgeKind::CallToReturnSite => {
            let stmt = match &supergraph.node(from).stmt {
                Some(stmt) => stmt,
                None => return Some(src.clone()),
            };
            let mut out = src.clone();
            match stmt {
                Statement::Assign { lhs, rhs } => assign(ctx, &mut out, lhs, rhs),
                Statement::Phi { lhs, rhs } => assign(ctx, &mut out, lhs, &Rvalue::Use(rhs.clone())),
                Statement::Call { lhs, args, .. } => {
                    if let Some(lhs) = lhs {
                        out.remove_mentions(&lhs.simplify());
                    }
                    for arg in args {
                        if let Expr::AddrOf(target) = arg.simplify() {
                            out.remove_mentions(&target);
                        }
                    }
                }
                Statement::Cond { lhs, op, rhs } => match data.branch_value() {
                    Some(true) => {
                        out.add(Fact::new(lhs.clone(), *op, rhs.clone()));
                    }
                    Some(false) => {
                        out.add(Fact::new(lhs.clone(), op.inverse(), rhs.clone()));
                    }
                    None => {}
                },
                Statement::Switch { index } => {
                    for fact in switch_facts(index, &data.cases) {
                        out.add(fact);
                    }
                }
                Statement::Return { .. } | Statement::Nop => {}
            }
            trace!(?edge, facts = %out, "facts transfer");
            Some(out)
        }
    }
}

fn assign(ctx: &mut FactsContext, facts: &mut Facts, lhs: &Expr, rhs: &Rvalue) {
    let lhs = lhs.simplify();
    match rhs {
        Rvalue::Use(value) | Rvalue::Unary(UnaryOp::Cast, value) => {
            let value = value.simplify();
            facts.remove_mentions(&lhs);
            // `p = p->next` cannot be stated in terms of the old p
            if value != lhs && !value.mentions(&lhs) {
                facts.add(Fact::new(lhs, CmpOp::Eq, value));
            }
        }
        Rvalue::Binary(op, a, b) => {
            let derived = derive_linear(facts, &lhs, *op, a, b);
            facts.remove_mentions(&lhs);
            for fact in derived {
                facts.add(fact);
            }
        }
        Rvalue::Unary(UnaryOp::Neg, value) if value.is_const() => {
            facts.remove_mentions(&lhs);
            if let Some(negated) = value.as_const().and_then(i64::checked_neg) {
                facts.add(Fact::new(lhs, CmpOp::Eq, Expr::constant(negated)));
            }
        }
        Rvalue::Unary(..) => {
            ctx.degraded += 1;
            warn!(location = ?ctx.location, lhs = %lhs, "unsupported rvalue; dropping facts");
            facts.remove_mentions(&lhs);
        }
    }
}

/// Facts about `lhs = a OP b` derived from the facts known about `a`,
/// where `b` (or `a`, for commutative operators) is a literal
fn derive_linear(facts: &Facts, lhs: &Expr, op: BinaryOp, a: &Expr, b: &Expr) -> Vec<Fact> {
    let (operand, literal) = match (a.as_const(), b.as_const()) {
        (Some(x), Some(y)) => {
            return op
                .apply_linear(x, y)
                .map(|value| vec![Fact::new(lhs.clone(), CmpOp::Eq, Expr::constant(value))])
                .unwrap_or_default();
        }
        (None, Some(literal)) => (a.simplify(), literal),
        (Some(literal), None) if op.is_commutative() => (b.simplify(), literal),
        _ => return Vec::new(),
    };

    if op == BinaryOp::Mul && literal == 0 {
        return vec![Fact::new(lhs.clone(), CmpOp::Eq, Expr::constant(0))];
    }

    let mut derived = Vec::new();
    if let Some(value) = facts.constant_of(&operand) {
        if let Some(folded) = op.apply_linear(value, literal) {
            derived.push(Fact::new(lhs.clone(), CmpOp::Eq, Expr::constant(folded)));
        }
        return derived;
    }

    for fact in facts.iter().filter(|fact| fact.lhs == operand) {
        let bound = match fact.rhs.as_const() {
            Some(bound) => bound,
            None => continue,
        };
        let new_bound = match op.apply_linear(bound, literal) {
            Some(new_bound) => new_bound,
            None => continue,
        };
        let new_op = if op == BinaryOp::Mul && literal < 0 {
            fact.op.flip()
        } else {
            fact.op
        };
        derived.push(Fact::new(lhs.clone(), new_op, Expr::constant(new_bound)));
    }
    derived
}

/// `index == K` for a single label, a range for one contiguous run of
/// labels, nothing otherwise (including the default edge)
pub fn switch_facts(index: &Expr, cases: &[CaseLabel]) -> Vec<Fact> {
    let mut sorted: Vec<CaseLabel> = cases.to_vec();
    sorted.sort_by_key(|case| case.low);

    let (low, high) = match sorted.first() {
        Some(first) => (first.low, first.high),
        None => return Vec::new(),
    };
    let mut high = high;
    for case in &sorted[1..] {
        if high.checked_add(1) != Some(case.low) {
            return Vec::new();
        }
        high = case.high;
    }

    if low == high {
        vec![Fact::new(index.clone(), CmpOp::Eq, Expr::constant(low))]
    } else {
        vec![
            Fact::new(index.clone(), CmpOp::Ge, Expr::constant(low)),
            Fact::new(index.clone(), CmpOp::Le, Expr::constant(high)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{FunctionId, TypeKind, Variable};

    fn int(name: &str) -> Expr {
        Expr::var(Variable::local(name, FunctionId(0), TypeKind::Integer))
    }

    #[test]
    fn test_assignment_replaces_old_facts() {
        let (x, y) = (int("x"), int("y"));
        let mut facts = Facts::from_facts([Fact::new(x.clone(), CmpOp::Eq, Expr::constant(1))]);
        assign(&mut FactsContext::default(), &mut facts, &x, &Rvalue::Use(y.clone()));
        assert_eq!(facts, Facts::from_facts([Fact::new(x, CmpOp::Eq, y)]));
    }

    #[test]
    fn test_self_referencing_assignment_only_kills() {
        let p = Expr::var(Variable::local("p", FunctionId(0), TypeKind::Pointer));
        let next = Expr::field(Expr::deref(p.clone()), "next", TypeKind::Pointer);
        let mut facts = Facts::from_facts([Fact::new(p.clone(), CmpOp::Ne, Expr::null())]);
        assign(&mut FactsContext::default(), &mut facts, &p, &Rvalue::Use(next));
        assert!(facts.is_empty());
    }

    #[test]
    fn test_loop_counter_bound_propagates() {
        let i = int("i");
        let mut facts = Facts::from_facts([Fact::new(i.clone(), CmpOp::Lt, Expr::constant(10))]);
        let rhs = Rvalue::Binary(BinaryOp::Add, i.clone(), Expr::constant(1));
        assign(&mut FactsContext::default(), &mut facts, &i, &rhs);
        assert!(facts.has(&i, CmpOp::Lt, &Expr::constant(11)));
        assert!(!facts.has(&i, CmpOp::Lt, &Expr::constant(10)));
    }

    #[test]
    fn test_negative_multiplier_flips_bound() {
        let (i, j) = (int("i"), int("j"));
        let facts = Facts::from_facts([Fact::new(i.clone(), CmpOp::Lt, Expr::constant(4))]);
        let derived = derive_linear(&facts, &j, BinaryOp::Mul, &Expr::constant(-2), &i);
        assert_eq!(derived, vec![Fact::new(j, CmpOp::Gt, Expr::constant(-8))]);
    }

    #[test]
    fn test_pinned_operand_folds() {
        let (i, j) = (int("i"), int("j"));
        let facts = Facts::from_facts([Fact::new(i.clone(), CmpOp::Eq, Expr::constant(3))]);
        let derived = derive_linear(&facts, &j, BinaryOp::Sub, &i, &Expr::constant(1));
        assert_eq!(derived, vec![Fact::new(j, CmpOp::Eq, Expr::constant(2))]);
    }

    #[test]
    fn test_switch_facts() {
        let k = int("k");
        assert_eq!(
            switch_facts(&k, &[CaseLabel::value(4)]),
            vec![Fact::new(k.clone(), CmpOp::Eq, Expr::constant(4))]
        );
        assert_eq!(
            switch_facts(&k, &[CaseLabel::value(2), CaseLabel::range(0, 1)]),
            vec![
                Fact::new(k.clone(), CmpOp::Ge, Expr::constant(0)),
                Fact::new(k.clone(), CmpOp::Le, Expr::constant(2)),
            ]
        );
        assert!(switch_facts(&k, &[CaseLabel::value(1), CaseLabel::value(5)]).is_empty());
        assert!(switch_facts(&k, &[]).is_empty());
    }
}
