//! Pattern variants of a checker rule

use crate::shared::models::CmpOp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic sub-expression of a pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SmExpr {
    /// Reference to a declaration by name
    Decl(String),
    Int(i64),
}

impl From<&str> for SmExpr {
    fn from(name: &str) -> Self {
        SmExpr::Decl(name.to_string())
    }
}

impl From<i64> for SmExpr {
    fn from(value: i64) -> Self {
        SmExpr::Int(value)
    }
}

impl fmt::Display for SmExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmExpr::Decl(name) => f.write_str(name),
            SmExpr::Int(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pattern {
    /// `lhs = rhs`
    Assignment { lhs: SmExpr, rhs: SmExpr },
    /// `lhs = func(...)`
    ResultOfCall { lhs: SmExpr, func: String },
    /// `func(args...)`
    ArgsOfCall { func: String, args: Vec<SmExpr> },
    /// `lhs OP rhs` in a conditional
    Comparison { lhs: SmExpr, op: CmpOp, rhs: SmExpr },
    /// `*var` anywhere in the statement
    Dereference { var: SmExpr },
    /// `array[index]` anywhere in the statement
    ArrayLookup { array: SmExpr, index: SmExpr },
    /// Any read of `var`
    Usage { var: SmExpr },
    /// `var` goes out of scope unreferenced
    Leaked { var: SmExpr },
    Or(Vec<Pattern>),
    NamedReference(String),
}

impl Pattern {
    pub fn assignment(lhs: impl Into<SmExpr>, rhs: impl Into<SmExpr>) -> Self {
        Pattern::Assignment {
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    pub fn result_of_call(lhs: impl Into<SmExpr>, func: &str) -> Self {
        Pattern::ResultOfCall {
            lhs: lhs.into(),
            func: func.to_string(),
        }
    }

    pub fn args_of_call(func: &str, args: Vec<SmExpr>) -> Self {
        Pattern::ArgsOfCall {
            func: func.to_string(),
            args,
        }
    }

    pub fn comparison(lhs: impl Into<SmExpr>, op: CmpOp, rhs: impl Into<SmExpr>) -> Self {
        Pattern::Comparison {
            lhs: lhs.into(),
            op,
            rhs: rhs.into(),
        }
    }

    pub fn dereference(var: impl Into<SmExpr>) -> Self {
        Pattern::Dereference { var: var.into() }
    }

    pub fn array_lookup(array: impl Into<SmExpr>, index: impl Into<SmExpr>) -> Self {
        Pattern::ArrayLookup {
            array: array.into(),
            index: index.into(),
        }
    }

    pub fn usage(var: impl Into<SmExpr>) -> Self {
        Pattern::Usage { var: var.into() }
    }

    pub fn leaked(var: impl Into<SmExpr>) -> Self {
        Pattern::Leaked { var: var.into() }
    }

    pub fn named(name: &str) -> Self {
        Pattern::NamedReference(name.to_string())
    }

    /// Symbolic sub-expressions of this pattern (not of nested patterns)
    pub fn sm_exprs(&self) -> Vec<&SmExpr> {
        match self {
            Pattern::Assignment { lhs, rhs } | Pattern::Comparison { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            Pattern::ResultOfCall { lhs, .. } => vec![lhs],
            Pattern::ArgsOfCall { args, .. } => args.iter().collect(),
            Pattern::Dereference { var } | Pattern::Usage { var } | Pattern::Leaked { var } => {
                vec![var]
            }
            Pattern::ArrayLookup { array, index } => vec![array, index],
            Pattern::Or(_) | Pattern::NamedReference(_) => Vec::new(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Assignment { lhs, rhs } => write!(f, "{} = {}", lhs, rhs),
            Pattern::ResultOfCall { lhs, func } => write!(f, "{} = {}()", lhs, func),
            Pattern::ArgsOfCall { func, args } => {
                let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
                write!(f, "{}({})", func, args.join(", "))
            }
            Pattern::Comparison { lhs, op, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Pattern::Dereference { var } => write!(f, "*{}", var),
            Pattern::ArrayLookup { array, index } => write!(f, "{}[{}]", array, index),
            Pattern::Usage { var } => write!(f, "{}", var),
            Pattern::Leaked { var } => write!(f, "$leaked$ {}", var),
            Pattern::Or(patterns) => {
                let parts: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", parts.join(" | "))
            }
            Pattern::NamedReference(name) => write!(f, "${}$", name),
        }
    }
}
