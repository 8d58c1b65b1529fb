/*
 * Pattern Matcher
 *
 * Structural matching of checker patterns against one statement.
 *
 * Each pattern variant inspects the statement shape and then binds its
 * symbolic operands via `compare`:
 * - a declaration binds a variable, SSA name or literal it accepts
 * - an integer literal matches the same literal
 * - address-of and field-access wrappers are looked through
 * A name bound twice must bind the same expression both times.
 */

use crate::features::checker::domain::{Pattern, SmExpr};
use crate::features::checker::CompiledMachine;
use crate::features::pattern_matching::domain::Match;
use crate::shared::models::{Expr, Rvalue, Statement};
use std::collections::BTreeMap;

type Bindings = BTreeMap<String, Expr>;

pub struct Matcher<'a> {
    machine: &'a CompiledMachine,
}

impl<'a> Matcher<'a> {
    pub fn new(machine: &'a CompiledMachine) -> Self {
        Self { machine }
    }

    /// Binds `sm_expr` against an actual expression, extending `bindings`
    pub fn compare(&self, actual: &Expr, sm_expr: &SmExpr, bindings: &mut Bindings) -> bool {
        let actual = actual.simplify();
        match (&actual, sm_expr) {
            (Expr::Const(value), SmExpr::Int(expected)) => value == expected,
            (Expr::Var(_) | Expr::Ssa { .. } | Expr::Const(_), SmExpr::Decl(name)) => {
                match self.machine.decl(name) {
                    Some(decl) if decl.accepts(&actual) => bind(bindings, name, actual.clone()),
                    _ => false,
                }
            }
            (Expr::AddrOf(inner), _) => self.compare(inner, sm_expr, bindings),
            (Expr::Field { base, .. }, _) => self.compare(base, sm_expr, bindings),
            _ => false,
        }
    }

    /// All matches of `pattern` against `stmt`, without duplicates.
    ///
    /// `Leaked` never matches a statement; see [`Matcher::iter_leak_matches`].
    pub fn iter_matches(&self, pattern: &Pattern, stmt: &Statement) -> Vec<Match> {
        let mut matches = Vec::new();
        self.collect_matches(pattern, stmt, &mut matches);
        matches
    }

    /// Matches of the `Leaked` parts of `pattern` against leaked expressions
    pub fn iter_leak_matches(&self, pattern: &Pattern, leaked: &[Expr]) -> Vec<Match> {
        let mut matches = Vec::new();
        self.collect_leak_matches(pattern, leaked, &mut matches);
        matches
    }

    fn collect_matches(&self, pattern: &Pattern, stmt: &Statement, out: &mut Vec<Match>) {
        match pattern {
            Pattern::Assignment { lhs, rhs } => {
                if let Statement::Assign {
                    lhs: actual_lhs,
                    rhs: Rvalue::Use(actual_rhs),
                } = stmt
                {
                    self.try_bind(pattern, &[(actual_lhs, lhs), (actual_rhs, rhs)], out);
                }
            }
            Pattern::ResultOfCall { lhs, func } => {
                if let Statement::Call {
                    lhs: Some(actual_lhs),
                    callee,
                    ..
                } = stmt
                {
                    if callee == func {
                        self.try_bind(pattern, &[(actual_lhs, lhs)], out);
                    }
                }
            }
            Pattern::ArgsOfCall { func, args } => {
                if let Statement::Call {
                    callee,
                    args: actual_args,
                    ..
                } = stmt
                {
                    if callee == func && args.len() <= actual_args.len() {
                        let pairs: Vec<(&Expr, &SmExpr)> = actual_args.iter().zip(args).collect();
                        self.try_bind(pattern, &pairs, out);
                    }
                }
            }
            Pattern::Comparison { lhs, op, rhs } => {
                if let Statement::Cond {
                    lhs: actual_lhs,
                    op: actual_op,
                    rhs: actual_rhs,
                } = stmt
                {
                    if actual_op == op {
                        self.try_bind(pattern, &[(actual_lhs, lhs), (actual_rhs, rhs)], out);
                    }
                    if *actual_op == op.flip() {
                        self.try_bind(pattern, &[(actual_rhs, lhs), (actual_lhs, rhs)], out);
                    }
                }
            }
            Pattern::Dereference { var } => {
                for expr in sub_exprs(stmt) {
                    if let Expr::Deref(target) = expr {
                        self.try_bind(pattern, &[(target.as_ref(), var)], out);
                    }
                }
            }
            Pattern::ArrayLookup { array, index } => {
                for expr in sub_exprs(stmt) {
                    if let Expr::ArrayRef {
                        base,
                        index: actual_index,
                        ..
                    } = expr
                    {
                        self.try_bind(
                            pattern,
                            &[(base.as_ref(), array), (actual_index.as_ref(), index)],
                            out,
                        );
                    }
                }
            }
            Pattern::Usage { var } => {
                for expr in stmt.read_exprs() {
                    self.try_bind(pattern, &[(expr, var)], out);
                }
            }
            Pattern::Leaked { .. } => {}
            Pattern::Or(alternatives) => {
                for alternative in alternatives {
                    self.collect_matches(alternative, stmt, out);
                }
            }
            Pattern::NamedReference(name) => {
                if let Some(target) = self.machine.named_pattern(name) {
                    self.collect_matches(target, stmt, out);
                }
            }
        }
    }

    fn collect_leak_matches(&self, pattern: &Pattern, leaked: &[Expr], out: &mut Vec<Match>) {
        match pattern {
            Pattern::Leaked { var } => {
                for expr in leaked {
                    self.try_bind(pattern, &[(expr, var)], out);
                }
            }
            Pattern::Or(alternatives) => {
                for alternative in alternatives {
                    self.collect_leak_matches(alternative, leaked, out);
                }
            }
            Pattern::NamedReference(name) => {
                if let Some(target) = self.machine.named_pattern(name) {
                    self.collect_leak_matches(target, leaked, out);
                }
            }
            _ => {}
        }
    }

    fn try_bind(&self, pattern: &Pattern, pairs: &[(&Expr, &SmExpr)], out: &mut Vec<Match>) {
        let mut bindings = Bindings::new();
        let all_bound = pairs
            .iter()
            .all(|(actual, sm_expr)| self.compare(actual, sm_expr, &mut bindings));
        if !all_bound {
            return;
        }
        let found = Match::new(pattern.clone(), bindings);
        if !out.contains(&found) {
            out.push(found);
        }
    }
}

fn bind(bindings: &mut Bindings, name: &str, expr: Expr) -> bool {
    match bindings.get(name) {
        Some(existing) => *existing == expr,
        None => {
            bindings.insert(name.to_string(), expr);
            true
        }
    }
}

/// Every sub-expression of the statement, canonicalized
fn sub_exprs(stmt: &Statement) -> Vec<Expr> {
    let mut exprs = Vec::new();
    for top in stmt.all_exprs() {
        let top = top.simplify();
        top.walk(&mut |expr| exprs.push(expr.clone()));
    }
    exprs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::checker::domain::{Decl, StateMachine};
    use crate::shared::models::{CmpOp, FunctionId, TypeKind, Variable};
    use pretty_assertions::assert_eq;

    fn machine() -> CompiledMachine {
        let sm = StateMachine::new("m")
            .decl(Decl::any_pointer("ptr").stateful())
            .decl(Decl::any_expr("idx"))
            .named_pattern(
                "released",
                Pattern::Or(vec![
                    Pattern::args_of_call("free", vec!["ptr".into()]),
                    Pattern::args_of_call("release", vec!["ptr".into()]),
                ]),
            );
        CompiledMachine::compile(&sm).unwrap()
    }

    fn p() -> Expr {
        Expr::var(Variable::local("p", FunctionId(0), TypeKind::Pointer))
    }

    fn n() -> Expr {
        Expr::var(Variable::local("n", FunctionId(0), TypeKind::Integer))
    }

    #[test]
    fn test_result_of_call_binds_lhs() {
        let machine = machine();
        let matcher = Matcher::new(&machine);
        let stmt = Statement::call(Some(p()), "malloc", vec![Expr::constant(8)]);
        let matches = matcher.iter_matches(&Pattern::result_of_call("ptr", "malloc"), &stmt);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].binding("ptr"), Some(&p()));
        assert!(matcher
            .iter_matches(&Pattern::result_of_call("ptr", "calloc"), &stmt)
            .is_empty());
    }

    #[test]
    fn test_comparison_matches_flipped_operands() {
        let machine = machine();
        let matcher = Matcher::new(&machine);
        let stmt = Statement::cond(Expr::null(), CmpOp::Eq, p());
        let matches =
            matcher.iter_matches(&Pattern::comparison("ptr", CmpOp::Eq, 0i64), &stmt);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].binding("ptr"), Some(&p()));
    }

    #[test]
    fn test_named_disjunction_and_address_of() {
        let machine = machine();
        let matcher = Matcher::new(&machine);
        let stmt = Statement::call(None, "release", vec![Expr::addr_of(p())]);
        let matches = matcher.iter_matches(&Pattern::named("released"), &stmt);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pattern, Pattern::args_of_call("release", vec!["ptr".into()]));
    }

    #[test]
    fn test_dereference_and_array_lookup_walk_subexpressions() {
        let machine = machine();
        let matcher = Matcher::new(&machine);
        let load = Statement::assign(n(), Expr::field(Expr::deref(p()), "len", TypeKind::Integer));
        let derefs = matcher.iter_matches(&Pattern::dereference("ptr"), &load);
        assert_eq!(derefs.len(), 1);

        let read = Statement::assign(n(), Expr::array_ref(p(), n(), TypeKind::Integer));
        let lookups = matcher.iter_matches(&Pattern::array_lookup("ptr", "idx"), &read);
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].binding("idx"), Some(&n()));
    }

    #[test]
    fn test_pointer_decl_rejects_integers() {
        let machine = machine();
        let matcher = Matcher::new(&machine);
        let stmt = Statement::call(None, "free", vec![n()]);
        assert!(matcher
            .iter_matches(&Pattern::args_of_call("free", vec!["ptr".into()]), &stmt)
            .is_empty());
    }

    #[test]
    fn test_leaked_only_matches_leak_sets() {
        let machine = machine();
        let matcher = Matcher::new(&machine);
        let stmt = Statement::Return { value: None };
        assert!(matcher.iter_matches(&Pattern::leaked("ptr"), &stmt).is_empty());
        let leaks = matcher.iter_leak_matches(&Pattern::leaked("ptr"), &[p(), n()]);
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].binding("ptr"), Some(&p()));
    }
}
