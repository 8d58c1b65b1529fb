//! Checkers and their state machines
//!
//! The in-memory form of a parsed checker (declarations, named patterns,
//! state clauses, outcomes) and its compiled, validated counterpart that the
//! analysis passes consume.

pub mod application;
pub mod domain;

pub use application::CompiledMachine;
pub use domain::{
    ActionContext, ActionError, ActionOutcome, Checker, Clause, Decl, DeclKind, NamedPattern,
    Outcome, Pattern, PatternRule, RaisedError, SmExpr, State, StateAttr, StateClause,
    StateMachine,
};
