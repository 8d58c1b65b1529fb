//! A single relational fact between two expressions

use crate::shared::models::{CmpOp, Expr};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `lhs OP rhs`, kept in normal form: both sides simplified and a literal
/// never on the left unless both sides are literals
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fact {
    pub lhs: Expr,
    pub op: CmpOp,
    pub rhs: Expr,
}

impl Fact {
    pub fn new(lhs: Expr, op: CmpOp, rhs: Expr) -> Self {
        let (lhs, rhs) = (lhs.simplify(), rhs.simplify());
        if lhs.is_const() && !rhs.is_const() {
            Self {
                lhs: rhs,
                op: op.flip(),
                rhs: lhs,
            }
        } else {
            Self { lhs, op, rhs }
        }
    }

    pub fn mentions(&self, expr: &Expr) -> bool {
        self.lhs.mentions(expr) || self.rhs.mentions(expr)
    }

    /// `x == x`, `x <= x`, `x >= x`
    pub fn is_tautology(&self) -> bool {
        self.lhs == self.rhs && matches!(self.op, CmpOp::Eq | CmpOp::Le | CmpOp::Ge)
    }

    /// The other side of the fact when `expr` is one side
    pub fn other_side(&self, expr: &Expr) -> Option<&Expr> {
        if &self.lhs == expr {
            Some(&self.rhs)
        } else if &self.rhs == expr {
            Some(&self.lhs)
        } else {
            None
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}
