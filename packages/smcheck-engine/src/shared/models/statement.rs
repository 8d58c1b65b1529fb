//! Statement shapes attached to supergraph nodes

use super::expression::{BinaryOp, CmpOp, Expr, UnaryOp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Right-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rvalue {
    /// Plain copy; the expression variant doubles as the expression-kind tag
    /// (variable, constant, field load, address-of, dereference, array read)
    Use(Expr),
    Binary(BinaryOp, Expr, Expr),
    Unary(UnaryOp, Expr),
}

impl Rvalue {
    pub fn operands(&self) -> Vec<&Expr> {
        match self {
            Rvalue::Use(expr) | Rvalue::Unary(_, expr) => vec![expr],
            Rvalue::Binary(_, lhs, rhs) => vec![lhs, rhs],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statement {
    Assign {
        lhs: Expr,
        rhs: Rvalue,
    },
    Call {
        lhs: Option<Expr>,
        callee: String,
        args: Vec<Expr>,
    },
    Cond {
        lhs: Expr,
        op: CmpOp,
        rhs: Expr,
    },
    /// Case labels live on the outgoing edges
    Switch {
        index: Expr,
    },
    /// One split node per incoming edge of the original merge
    Phi {
        lhs: Expr,
        rhs: Expr,
    },
    Return {
        value: Option<Expr>,
    },
    Nop,
}

impl Statement {
    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Statement::Assign {
            lhs,
            rhs: Rvalue::Use(rhs),
        }
    }

    pub fn binary(lhs: Expr, op: BinaryOp, a: Expr, b: Expr) -> Self {
        Statement::Assign {
            lhs,
            rhs: Rvalue::Binary(op, a, b),
        }
    }

    pub fn call(lhs: Option<Expr>, callee: impl Into<String>, args: Vec<Expr>) -> Self {
        Statement::Call {
            lhs,
            callee: callee.into(),
            args,
        }
    }

    pub fn cond(lhs: Expr, op: CmpOp, rhs: Expr) -> Self {
        Statement::Cond { lhs, op, rhs }
    }

    /// Expression written by this statement, if any
    pub fn defined_expr(&self) -> Option<&Expr> {
        match self {
            Statement::Assign { lhs, .. } | Statement::Phi { lhs, .. } => Some(lhs),
            Statement::Call { lhs, .. } => lhs.as_ref(),
            _ => None,
        }
    }

    /// Top-level expressions read by this statement
    pub fn read_exprs(&self) -> Vec<&Expr> {
        match self {
            Statement::Assign { rhs, .. } => rhs.operands(),
            Statement::Call { args, .. } => args.iter().collect(),
            Statement::Cond { lhs, rhs, .. } => vec![lhs, rhs],
            Statement::Switch { index } => vec![index],
            Statement::Phi { rhs, .. } => vec![rhs],
            Statement::Return { value } => value.iter().collect(),
            Statement::Nop => Vec::new(),
        }
    }

    /// Every top-level expression, written or read
    pub fn all_exprs(&self) -> Vec<&Expr> {
        let mut exprs: Vec<&Expr> = self.defined_expr().into_iter().collect();
        exprs.extend(self.read_exprs());
        exprs
    }

    /// Callee name when this is a call
    pub fn callee(&self) -> Option<&str> {
        match self {
            Statement::Call { callee, .. } => Some(callee),
            _ => None,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assign { lhs, rhs } => match rhs {
                Rvalue::Use(expr) => write!(f, "{} = {}", lhs, expr),
                Rvalue::Binary(op, a, b) => write!(f, "{} = {} {} {}", lhs, a, op.symbol(), b),
                Rvalue::Unary(UnaryOp::Neg, a) => write!(f, "{} = -{}", lhs, a),
                Rvalue::Unary(UnaryOp::Not, a) => write!(f, "{} = !{}", lhs, a),
                Rvalue::Unary(UnaryOp::Cast, a) => write!(f, "{} = ({})", lhs, a),
            },
            Statement::Call { lhs, callee, args } => {
                if let Some(lhs) = lhs {
                    write!(f, "{} = ", lhs)?;
                }
                let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
                write!(f, "{}({})", callee, args.join(", "))
            }
            Statement::Cond { lhs, op, rhs } => write!(f, "if ({} {} {})", lhs, op, rhs),
            Statement::Switch { index } => write!(f, "switch ({})", index),
            Statement::Phi { lhs, rhs } => write!(f, "{} = PHI<{}>", lhs, rhs),
            Statement::Return { value: Some(value) } => write!(f, "return {}", value),
            Statement::Return { value: None } => write!(f, "return"),
            Statement::Nop => write!(f, "nop"),
        }
    }
}
