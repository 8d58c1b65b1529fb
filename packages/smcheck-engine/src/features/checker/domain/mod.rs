//! Checker domain models

mod machine;
mod outcome;
mod pattern;
mod state;

pub use machine::{Checker, Clause, Decl, DeclKind, NamedPattern, PatternRule, StateClause, StateMachine};
pub use outcome::{ActionContext, ActionError, ActionFn, ActionOutcome, Outcome, RaisedError};
pub use pattern::{Pattern, SmExpr};
pub use state::{is_wildcard, state_name_matches, State, StateAttr};
