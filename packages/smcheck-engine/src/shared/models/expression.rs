//! Program expressions as handed over by the supergraph collaborator
//!
//! Expressions are plain values: they hash and compare structurally, so the
//! canonical form produced by [`Expr::simplify`] is what the facts and states
//! domains key on.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a function inside the supergraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

/// Storage class of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VarKind {
    Local,
    Param,
    Global,
    /// Compiler temporary with no user-visible declaration
    Temporary,
}

/// Coarse type information, enough for declaration kinds like "any pointer"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeKind {
    Pointer,
    Integer,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// Owning function; `None` for globals
    pub function: Option<FunctionId>,
    pub kind: VarKind,
    pub ty: TypeKind,
}

impl Variable {
    pub fn local(name: impl Into<String>, function: FunctionId, ty: TypeKind) -> Self {
        Self {
            name: name.into(),
            function: Some(function),
            kind: VarKind::Local,
            ty,
        }
    }

    pub fn param(name: impl Into<String>, function: FunctionId, ty: TypeKind) -> Self {
        Self {
            name: name.into(),
            function: Some(function),
            kind: VarKind::Param,
            ty,
        }
    }

    pub fn temporary(name: impl Into<String>, function: FunctionId, ty: TypeKind) -> Self {
        Self {
            name: name.into(),
            function: Some(function),
            kind: VarKind::Temporary,
            ty,
        }
    }

    pub fn global(name: impl Into<String>, ty: TypeKind) -> Self {
        Self {
            name: name.into(),
            function: None,
            kind: VarKind::Global,
            ty,
        }
    }

    pub fn is_global(&self) -> bool {
        self.function.is_none()
    }
}

/// Relational operator of a fact or a conditional statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Logical negation: `!(a OP b)` is `a OP.inverse() b`
    pub fn inverse(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
        }
    }

    /// Operand swap: `a OP b` is `b OP.flip() a`
    pub fn flip(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Le,
        }
    }

    pub fn eval(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// Constant folding for the linear operators; `None` for anything else or on overflow
    pub fn apply_linear(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            BinaryOp::Add => lhs.checked_add(rhs),
            BinaryOp::Sub => lhs.checked_sub(rhs),
            BinaryOp::Mul => lhs.checked_mul(rhs),
            _ => None,
        }
    }

    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    Cast,
}

/// Program expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Expr {
    Var(Variable),
    /// SSA name of a variable (or of an anonymous temporary)
    Ssa { var: Variable, version: u32 },
    /// Integer literal; NULL is `Const(0)`
    Const(i64),
    Str(String),
    AddrOf(Box<Expr>),
    Deref(Box<Expr>),
    Field {
        base: Box<Expr>,
        field: String,
        ty: TypeKind,
    },
    ArrayRef {
        base: Box<Expr>,
        index: Box<Expr>,
        ty: TypeKind,
    },
}

impl Expr {
    pub fn var(var: Variable) -> Self {
        Expr::Var(var)
    }

    pub fn constant(value: i64) -> Self {
        Expr::Const(value)
    }

    pub fn null() -> Self {
        Expr::Const(0)
    }

    pub fn addr_of(expr: Expr) -> Self {
        Expr::AddrOf(Box::new(expr))
    }

    pub fn deref(expr: Expr) -> Self {
        Expr::Deref(Box::new(expr))
    }

    pub fn field(base: Expr, field: impl Into<String>, ty: TypeKind) -> Self {
        Expr::Field {
            base: Box::new(base),
            field: field.into(),
            ty,
        }
    }

    pub fn array_ref(base: Expr, index: Expr, ty: TypeKind) -> Self {
        Expr::ArrayRef {
            base: Box::new(base),
            index: Box::new(index),
            ty,
        }
    }

    pub fn ty(&self) -> TypeKind {
        match self {
            Expr::Var(var) | Expr::Ssa { var, .. } => var.ty,
            Expr::Const(_) => TypeKind::Integer,
            Expr::Str(_) | Expr::AddrOf(_) => TypeKind::Pointer,
            Expr::Deref(_) => TypeKind::Other,
            Expr::Field { ty, .. } | Expr::ArrayRef { ty, .. } => *ty,
        }
    }

    pub fn as_const(&self) -> Option<i64> {
        match self {
            Expr::Const(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Expr::Const(_))
    }

    /// The variable behind a plain variable reference or SSA name
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Expr::Var(var) | Expr::Ssa { var, .. } => Some(var),
            _ => None,
        }
    }

    /// Canonical form used for hashing and equality across the engine.
    ///
    /// SSA names of declared variables collapse to the variable, and
    /// `&*e` / `*&e` collapse to `e`.
    pub fn simplify(&self) -> Expr {
        match self {
            Expr::Ssa { var, .. } if var.kind != VarKind::Temporary => Expr::Var(var.clone()),
            Expr::AddrOf(inner) => match inner.simplify() {
                Expr::Deref(target) => *target,
                other => Expr::AddrOf(Box::new(other)),
            },
            Expr::Deref(inner) => match inner.simplify() {
                Expr::AddrOf(target) => *target,
                other => Expr::Deref(Box::new(other)),
            },
            Expr::Field { base, field, ty } => Expr::Field {
                base: Box::new(base.simplify()),
                field: field.clone(),
                ty: *ty,
            },
            Expr::ArrayRef { base, index, ty } => Expr::ArrayRef {
                base: Box::new(base.simplify()),
                index: Box::new(index.simplify()),
                ty: *ty,
            },
            other => other.clone(),
        }
    }

    /// Direct sub-expressions
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Var(_) | Expr::Ssa { .. } | Expr::Const(_) | Expr::Str(_) => Vec::new(),
            Expr::AddrOf(inner) | Expr::Deref(inner) => vec![inner.as_ref()],
            Expr::Field { base, .. } => vec![base.as_ref()],
            Expr::ArrayRef { base, index, .. } => vec![base.as_ref(), index.as_ref()],
        }
    }

    /// Pre-order walk over this expression and all of its sub-expressions
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            visit(expr);
            let children = expr.children();
            stack.extend(children.into_iter().rev());
        }
    }

    /// True when `other` occurs anywhere inside this expression (including itself)
    pub fn mentions(&self, other: &Expr) -> bool {
        let mut found = false;
        self.walk(&mut |expr| found |= expr == other);
        found
    }

    /// Leaf variables referenced by this expression
    pub fn variables(&self) -> Vec<&Variable> {
        let mut vars = Vec::new();
        self.walk(&mut |expr| {
            if let Some(var) = expr.as_variable() {
                vars.push(var);
            }
        });
        vars
    }

    /// True when every variable in the expression is global (constants qualify)
    pub fn is_global_or_const(&self) -> bool {
        self.variables().iter().all(|var| var.is_global())
    }

    /// True when some variable in the expression belongs to `function`
    pub fn is_scoped_to(&self, function: FunctionId) -> bool {
        self.variables()
            .iter()
            .any(|var| var.function == Some(function))
    }

    /// Function owning the first scoped variable, if any
    pub fn owner(&self) -> Option<FunctionId> {
        self.variables().iter().find_map(|var| var.function)
    }

    /// Rewrite every occurrence of a mapped sub-expression
    pub fn substitute(&self, mapping: &FxHashMap<Expr, Expr>) -> Expr {
        if let Some(target) = mapping.get(self) {
            return target.clone();
        }
        match self {
            Expr::AddrOf(inner) => Expr::AddrOf(Box::new(inner.substitute(mapping))),
            Expr::Deref(inner) => Expr::Deref(Box::new(inner.substitute(mapping))),
            Expr::Field { base, field, ty } => Expr::Field {
                base: Box::new(base.substitute(mapping)),
                field: field.clone(),
                ty: *ty,
            },
            Expr::ArrayRef { base, index, ty } => Expr::ArrayRef {
                base: Box::new(base.substitute(mapping)),
                index: Box::new(index.substitute(mapping)),
                ty: *ty,
            },
            other => other.clone(),
        }
    }
}

impl From<Variable> for Expr {
    fn from(var: Variable) -> Self {
        Expr::Var(var)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Const(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(var) => write!(f, "{}", var.name),
            Expr::Ssa { var, version } => write!(f, "{}_{}", var.name, version),
            Expr::Const(value) => write!(f, "{}", value),
            Expr::Str(text) => write!(f, "{:?}", text),
            Expr::AddrOf(inner) => write!(f, "&{}", inner),
            Expr::Deref(inner) => write!(f, "*{}", inner),
            Expr::Field { base, field, .. } => match base.as_ref() {
                Expr::Deref(ptr) => write!(f, "{}->{}", ptr, field),
                other => write!(f, "{}.{}", other, field),
            },
            Expr::ArrayRef { base, index, .. } => write!(f, "{}[{}]", base, index),
        }
    }
}
