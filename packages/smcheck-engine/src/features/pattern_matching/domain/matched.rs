//! Match results

use crate::features::checker::domain::{Outcome, Pattern, SmExpr, State};
use crate::shared::models::{Expr, Location};
use std::collections::BTreeMap;

/// One structural match of a pattern: declared name → bound expression.
///
/// Two matches are equal iff their pattern and bindings are.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Match {
    pub pattern: Pattern,
    pub bindings: BTreeMap<String, Expr>,
}

impl Match {
    pub fn new(pattern: Pattern, bindings: BTreeMap<String, Expr>) -> Self {
        Self { pattern, bindings }
    }

    pub fn binding(&self, name: &str) -> Option<&Expr> {
        self.bindings.get(name)
    }

    /// Human-readable description used for witness notes.
    ///
    /// `branch` is the polarity of the edge the match was found on, which
    /// decides how a comparison reads.
    pub fn description(&self, branch: Option<bool>) -> String {
        match &self.pattern {
            Pattern::Assignment { lhs, rhs } => {
                format!("{} assigned to {}", self.render(lhs), self.render(rhs))
            }
            Pattern::ResultOfCall { lhs, func } => {
                format!("{} assigned to the result of {}()", self.render(lhs), func)
            }
            Pattern::ArgsOfCall { func, args } => {
                let args: Vec<String> = args.iter().map(|arg| self.render(arg)).collect();
                format!("{} passed to {}()", args.join(", "), func)
            }
            Pattern::Comparison { lhs, op, rhs } => {
                let op = if branch == Some(false) { op.inverse() } else { *op };
                format!("when {} {} {}", self.render(lhs), op, self.render(rhs))
            }
            Pattern::Dereference { var } => format!("dereference of {}", self.render(var)),
            Pattern::ArrayLookup { array, index } => {
                format!("read of {}[{}]", self.render(array), self.render(index))
            }
            Pattern::Usage { var } => format!("usage of {}", self.render(var)),
            Pattern::Leaked { var } => format!("{} leaves scope", self.render(var)),
            other => other.to_string(),
        }
    }

    fn render(&self, sm_expr: &SmExpr) -> String {
        match sm_expr {
            SmExpr::Decl(name) => self
                .bindings
                .get(name)
                .map_or_else(|| name.clone(), |expr| expr.to_string()),
            SmExpr::Int(value) => value.to_string(),
        }
    }
}

/// A rule that may fire on a given edge, found ahead of the states pass
#[derive(Debug, Clone, PartialEq)]
pub struct PossibleMatch {
    /// Canonical stateful expression the rule acts on
    pub expr: Expr,
    /// State-list of the enclosing clause (may contain wildcards)
    pub statenames: Vec<String>,
    pub pattern: Pattern,
    /// Outcomes left after resolving boolean guards against the edge
    pub outcomes: Vec<Outcome>,
    pub matched: Match,
    pub rule_location: Option<Location>,
    /// The statement writes `expr`; only that expression changes state
    pub assigns_expr: bool,
}

impl PossibleMatch {
    pub fn applies_to(&self, state: &State) -> bool {
        self.statenames.iter().any(|name| state.matches(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{CmpOp, FunctionId, TypeKind, Variable};

    fn foo_match(pattern: Pattern) -> Match {
        let foo = Expr::var(Variable::local("foo", FunctionId(0), TypeKind::Pointer));
        let mut bindings = BTreeMap::new();
        bindings.insert("ptr".to_string(), foo);
        Match::new(pattern, bindings)
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            foo_match(Pattern::result_of_call("ptr", "malloc")).description(None),
            "foo assigned to the result of malloc()"
        );
        assert_eq!(
            foo_match(Pattern::args_of_call("free", vec!["ptr".into()])).description(None),
            "foo passed to free()"
        );
        let cmp = foo_match(Pattern::comparison("ptr", CmpOp::Eq, 0i64));
        assert_eq!(cmp.description(Some(true)), "when foo == 0");
        assert_eq!(cmp.description(Some(false)), "when foo != 0");
    }
}
