/*
 * Facts
 *
 * Conjunctive set of relational facts holding at one node.
 *
 * # Lattice
 * - Empty set: nothing known (every program state possible)
 * - Meet: set intersection; a fact survives only if it holds on every
 *   incoming path
 * - Unreachable is represented by the solver's `None`, not by a value here
 *
 * # Equivalence classes
 * Derived lazily from `==` facts with union-find and cached until the set
 * changes. Two partitions exist: one where literals glue classes together
 * (used by `is_possible`) and one over non-literal equalities only (used to
 * key per-expression state, so two unrelated NULL pointers stay apart).
 *
 * # Feasibility
 * `is_possible` rejects a class holding two different literals and any
 * non-equality fact whose two sides resolve to literals that violate it.
 * It is intentionally incomplete: no transitive ordering, no arithmetic.
 */

use super::fact::Fact;
use crate::shared::models::{CmpOp, Expr, FunctionId, VarKind};
use rustc_hash::FxHashMap;
use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::fmt;

/// Union-find result over the expressions of `==` facts
#[derive(Debug, Clone, Default)]
pub struct Partition {
    class_of: FxHashMap<Expr, usize>,
    classes: Vec<BTreeSet<Expr>>,
}

impl Partition {
    fn build<'a>(pairs: impl Iterator<Item = (&'a Expr, &'a Expr)>) -> Self {
        let mut index: FxHashMap<Expr, usize> = FxHashMap::default();
        let mut parent: Vec<usize> = Vec::new();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for (a, b) in pairs {
            let mut slot = |expr: &Expr| -> usize {
                if let Some(&i) = index.get(expr) {
                    return i;
                }
                let i = parent.len();
                parent.push(i);
                index.insert(expr.clone(), i);
                i
            };
            let (ia, ib) = (slot(a), slot(b));
            let (ra, rb) = (find(&mut parent, ia), find(&mut parent, ib));
            if ra != rb {
                parent[ra.max(rb)] = ra.min(rb);
            }
        }

        let mut root_to_class: FxHashMap<usize, usize> = FxHashMap::default();
        let mut classes: Vec<BTreeSet<Expr>> = Vec::new();
        let mut class_of = FxHashMap::default();
        let mut members: Vec<(Expr, usize)> = index.into_iter().collect();
        members.sort();
        for (expr, i) in members {
            let root = find(&mut parent, i);
            let class = *root_to_class.entry(root).or_insert_with(|| {
                classes.push(BTreeSet::new());
                classes.len() - 1
            });
            classes[class].insert(expr.clone());
            class_of.insert(expr, class);
        }
        Self { class_of, classes }
    }

    pub fn classes(&self) -> &[BTreeSet<Expr>] {
        &self.classes
    }

    pub fn class_of(&self, expr: &Expr) -> Option<&BTreeSet<Expr>> {
        self.class_of.get(expr).map(|&i| &self.classes[i])
    }

    pub fn same_class(&self, a: &Expr, b: &Expr) -> bool {
        match (self.class_of.get(a), self.class_of.get(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        }
    }

    /// The single literal in the class of `expr`, if the class has exactly one
    pub fn constant_of(&self, expr: &Expr) -> Option<i64> {
        if let Some(value) = expr.as_const() {
            return Some(value);
        }
        let mut literals = self.class_of(expr)?.iter().filter_map(Expr::as_const);
        let first = literals.next()?;
        match literals.next() {
            None => Some(first),
            Some(_) => None,
        }
    }
}

#[derive(Clone, Default)]
pub struct Facts {
    set: BTreeSet<Fact>,
    classes: OnceCell<Partition>,
    var_classes: OnceCell<Partition>,
}

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_facts(facts: impl IntoIterator<Item = Fact>) -> Self {
        let mut out = Self::new();
        for fact in facts {
            out.add(fact);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.set.iter()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.set.contains(fact)
    }

    /// Convenience lookup: does `lhs OP rhs` (in normal form) hold?
    pub fn has(&self, lhs: &Expr, op: CmpOp, rhs: &Expr) -> bool {
        self.contains(&Fact::new(lhs.clone(), op, rhs.clone()))
    }

    fn invalidate(&mut self) {
        self.classes = OnceCell::new();
        self.var_classes = OnceCell::new();
    }

    /// Adds a fact unless it is a tautology. Facts implied by an equality to
    /// a literal are kept so a join still finds them on both sides.
    /// Returns whether the set changed.
    pub fn add(&mut self, fact: Fact) -> bool {
        if fact.is_tautology() {
            return false;
        }
        let changed = self.set.insert(fact);
        if changed {
            self.invalidate();
        }
        changed
    }

    /// Drops every fact mentioning `expr` (directly or inside a larger expression)
    pub fn remove_mentions(&mut self, expr: &Expr) {
        let before = self.set.len();
        self.set.retain(|fact| !fact.mentions(expr));
        if self.set.len() != before {
            self.invalidate();
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Fact) -> bool) {
        let before = self.set.len();
        self.set.retain(|fact| keep(fact));
        if self.set.len() != before {
            self.invalidate();
        }
    }

    /// Facts common to both inputs
    pub fn meet(&self, other: &Facts) -> Facts {
        Facts {
            set: self.set.intersection(&other.set).cloned().collect(),
            ..Facts::default()
        }
    }

    /// Equality partition including literals
    pub fn equiv_classes(&self) -> &Partition {
        self.classes.get_or_init(|| {
            Partition::build(
                self.set
                    .iter()
                    .filter(|fact| fact.op == CmpOp::Eq)
                    .map(|fact| (&fact.lhs, &fact.rhs)),
            )
        })
    }

    /// Equality partition where literals do not join classes
    pub fn var_equiv_classes(&self) -> &Partition {
        self.var_classes.get_or_init(|| {
            Partition::build(
                self.set
                    .iter()
                    .filter(|fact| {
                        fact.op == CmpOp::Eq && !fact.lhs.is_const() && !fact.rhs.is_const()
                    })
                    .map(|fact| (&fact.lhs, &fact.rhs)),
            )
        })
    }

    /// Every expression known equal to `expr` (itself included)
    pub fn get_aliases(&self, expr: &Expr) -> BTreeSet<Expr> {
        let expr = expr.simplify();
        match self.equiv_classes().class_of(&expr) {
            Some(class) => class.clone(),
            None => BTreeSet::from([expr]),
        }
    }

    /// Like [`get_aliases`](Self::get_aliases) but without gluing through literals
    pub fn get_var_aliases(&self, expr: &Expr) -> BTreeSet<Expr> {
        let expr = expr.simplify();
        match self.var_equiv_classes().class_of(&expr) {
            Some(class) => class.clone(),
            None => BTreeSet::from([expr]),
        }
    }

    /// Literal value `expr` is pinned to, if any
    pub fn constant_of(&self, expr: &Expr) -> Option<i64> {
        self.equiv_classes().constant_of(&expr.simplify())
    }

    pub fn is_possible(&self) -> bool {
        let partition = self.equiv_classes();

        for class in partition.classes() {
            let literals: BTreeSet<i64> = class.iter().filter_map(Expr::as_const).collect();
            if literals.len() > 1 {
                return false;
            }
        }

        for fact in self.set.iter().filter(|fact| fact.op != CmpOp::Eq) {
            let lhs = partition.constant_of(&fact.lhs);
            let rhs = partition.constant_of(&fact.rhs);
            if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                if !fact.op.eval(lhs, rhs) {
                    return false;
                }
            } else if matches!(fact.op, CmpOp::Ne | CmpOp::Lt | CmpOp::Gt)
                && partition.same_class(&fact.lhs, &fact.rhs)
            {
                return false;
            }
        }
        true
    }

    /// True when an equality ties `expr` (or an alias) to storage that outlives
    /// `function`: a global, memory reached through a pointer, or another
    /// function's variable
    pub fn expr_is_referenced_externally(&self, expr: &Expr, function: FunctionId) -> bool {
        let aliases = self.get_var_aliases(expr);
        aliases.iter().any(|alias| is_external(alias, function))
    }
}

fn is_external(expr: &Expr, function: FunctionId) -> bool {
    match expr {
        Expr::Const(_) | Expr::Str(_) => false,
        Expr::Var(var) | Expr::Ssa { var, .. } => {
            var.kind == VarKind::Global || var.function != Some(function)
        }
        Expr::AddrOf(inner) => is_external(inner, function),
        // A member of a local aggregate is as local as the aggregate
        Expr::Field { base, .. } | Expr::ArrayRef { base, .. } => match base.as_ref() {
            Expr::Var(_) | Expr::Ssa { .. } => is_external(base, function),
            _ => true,
        },
        Expr::Deref(_) => true,
    }
}

impl PartialEq for Facts {
    fn eq(&self, other: &Self) -> bool {
        self.set == other.set
    }
}

impl Eq for Facts {}

impl fmt::Debug for Facts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.set.iter().map(|fact| fact.to_string())).finish()
    }
}

impl fmt::Display for Facts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let facts: Vec<String> = self.set.iter().map(|fact| fact.to_string()).collect();
        write!(f, "{{{}}}", facts.join(" && "))
    }
}
