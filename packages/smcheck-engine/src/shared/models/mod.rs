//! Shared models

pub mod expression;
mod location;
pub mod statement;
pub mod supergraph;

pub use expression::{BinaryOp, CmpOp, Expr, FunctionId, TypeKind, UnaryOp, VarKind, Variable};
pub use location::Location;
pub use statement::{Rvalue, Statement};
pub use supergraph::{
    CaseLabel, EdgeKind, FunctionInfo, NodeKind, Supergraph, SupergraphBuilder, SupergraphEdge,
    SupergraphNode,
};
