/*
 * Rule Outcomes
 *
 * What happens when a pattern rule matches:
 * - TransitionTo : the matched expression moves to a new state
 * - Boolean      : the inner outcome applies only on the true (or false)
 *                  out-edge of the matched conditional
 * - Action       : arbitrary Rust code run against an `ActionContext`; it may
 *                  set states and raise errors
 *
 * Actions receive a scratch namespace that the engine clears after every
 * invocation, so nothing leaks from one match to the next.
 */

use super::state::State;
use crate::shared::models::{Expr, Location};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by action code; skips that outcome only
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown binding '{0}'")]
    UnknownBinding(String),

    #[error("{0}")]
    Failed(String),
}

/// Error registered by an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaisedError {
    pub message: String,
    pub cwe: Option<String>,
}

pub type ActionFn = Arc<dyn Fn(&mut ActionContext<'_>) -> Result<(), ActionError> + Send + Sync>;

/// View handed to action code for one (match, source state) pair
pub struct ActionContext<'a> {
    bindings: &'a BTreeMap<String, Expr>,
    expr: &'a Expr,
    state: &'a State,
    location: Option<&'a Location>,
    namespace: &'a mut FxHashMap<String, serde_json::Value>,
    new_states: Vec<State>,
    errors: Vec<RaisedError>,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        bindings: &'a BTreeMap<String, Expr>,
        expr: &'a Expr,
        state: &'a State,
        location: Option<&'a Location>,
        namespace: &'a mut FxHashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            bindings,
            expr,
            state,
            location,
            namespace,
            new_states: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn binding(&self, name: &str) -> Option<&Expr> {
        self.bindings.get(name)
    }

    pub fn bindings(&self) -> &BTreeMap<String, Expr> {
        self.bindings
    }

    /// The stateful expression the rule matched
    pub fn expr(&self) -> &Expr {
        self.expr
    }

    /// State of the matched expression before this outcome
    pub fn state(&self) -> &State {
        self.state
    }

    pub fn location(&self) -> Option<&Location> {
        self.location
    }

    pub fn namespace(&self) -> &FxHashMap<String, serde_json::Value> {
        self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut FxHashMap<String, serde_json::Value> {
        self.namespace
    }

    pub fn set_state(&mut self, name: &str) {
        self.new_states.push(State::new(name));
    }

    pub fn set_state_with(&mut self, state: State) {
        self.new_states.push(state);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(RaisedError {
            message: message.into(),
            cwe: None,
        });
    }

    pub fn error_with_cwe(&mut self, message: impl Into<String>, cwe: impl Into<String>) {
        self.errors.push(RaisedError {
            message: message.into(),
            cwe: Some(cwe.into()),
        });
    }

    /// Expands `{name}` placeholders with the bound expressions; `{{` and
    /// `}}` stand for literal braces
    pub fn format(&self, template: &str) -> Result<String, ActionError> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        // unterminated placeholder stays literal
                        out.push('{');
                        out.push_str(&name);
                        break;
                    }
                    let bound = self
                        .bindings
                        .get(name.as_str())
                        .ok_or_else(|| ActionError::UnknownBinding(name.clone()))?;
                    out.push_str(&bound.to_string());
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }

    /// (states set by the action, errors raised)
    pub fn into_effects(self) -> (Vec<State>, Vec<RaisedError>) {
        (self.new_states, self.errors)
    }
}

#[derive(Clone)]
pub struct ActionOutcome {
    pub name: String,
    /// Whether the action may call `set_state`
    pub uses_set_state: bool,
    /// States the action is known to enter, for reachability checking
    pub declared_states: Vec<String>,
    callback: ActionFn,
}

impl ActionOutcome {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            uses_set_state: false,
            declared_states: Vec::new(),
            callback: Arc::new(callback),
        }
    }

    /// Marks the action as calling `set_state` with states outside `declared`
    pub fn with_set_state(mut self) -> Self {
        self.uses_set_state = true;
        self
    }

    pub fn with_declared_states(mut self, states: &[&str]) -> Self {
        self.declared_states = states.iter().map(|state| state.to_string()).collect();
        self
    }

    pub fn run(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
        (self.callback)(ctx)
    }
}

impl fmt::Debug for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionOutcome")
            .field("name", &self.name)
            .field("uses_set_state", &self.uses_set_state)
            .field("declared_states", &self.declared_states)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ActionOutcome {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.callback, &other.callback)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    TransitionTo(State),
    Boolean { guard: bool, outcome: Box<Outcome> },
    Action(ActionOutcome),
}

impl Outcome {
    pub fn transition(state: &str) -> Self {
        Outcome::TransitionTo(State::new(state))
    }

    pub fn on_true(outcome: Outcome) -> Self {
        Outcome::Boolean {
            guard: true,
            outcome: Box::new(outcome),
        }
    }

    pub fn on_false(outcome: Outcome) -> Self {
        Outcome::Boolean {
            guard: false,
            outcome: Box::new(outcome),
        }
    }

    pub fn action<F>(name: &str, callback: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        Outcome::Action(ActionOutcome::new(name, callback))
    }

    /// Raises an error built from `template` (`{binding}` placeholders)
    pub fn error(template: &str) -> Self {
        let template = template.to_string();
        Outcome::action("error", move |ctx| {
            let message = ctx.format(&template)?;
            ctx.error(message);
            Ok(())
        })
    }

    pub fn error_with_cwe(template: &str, cwe: &str) -> Self {
        let template = template.to_string();
        let cwe = cwe.to_string();
        Outcome::action("error", move |ctx| {
            let message = ctx.format(&template)?;
            ctx.error_with_cwe(message, cwe.clone());
            Ok(())
        })
    }

    /// Outcome that applies on an edge with the given branch value.
    ///
    /// Guarded outcomes are dropped on edges of the other polarity and on
    /// edges that are not conditional at all.
    pub fn resolve_for_edge(&self, branch: Option<bool>) -> Option<&Outcome> {
        match self {
            Outcome::Boolean { guard, outcome } => {
                if branch == Some(*guard) {
                    outcome.resolve_for_edge(branch)
                } else {
                    None
                }
            }
            other => Some(other),
        }
    }

    /// State names this outcome can enter
    pub fn iter_reachable_statenames(&self) -> Vec<&str> {
        match self {
            Outcome::TransitionTo(state) => vec![state.name.as_str()],
            Outcome::Boolean { outcome, .. } => outcome.iter_reachable_statenames(),
            Outcome::Action(action) => action.declared_states.iter().map(String::as_str).collect(),
        }
    }

    pub fn uses_set_state(&self) -> bool {
        match self {
            Outcome::TransitionTo(_) => false,
            Outcome::Boolean { outcome, .. } => outcome.uses_set_state(),
            Outcome::Action(action) => action.uses_set_state,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::TransitionTo(state) => write!(f, "{}", state),
            Outcome::Boolean { guard, outcome } => write!(f, "{}={}", guard, outcome),
            Outcome::Action(action) => write!(f, "{{ {} }}", action.name),
        }
    }
}
