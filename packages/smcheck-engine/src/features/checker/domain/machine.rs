//! In-memory checker model, as produced by the DSL parser

use super::outcome::Outcome;
use super::pattern::Pattern;
use crate::shared::models::{Expr, Location, TypeKind};
use std::fmt;

/// Capability a declaration matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    AnyPointer,
    AnyExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub name: String,
    pub kind: DeclKind,
    /// The state machine tracks states for expressions bound to this decl
    pub has_state: bool,
    pub location: Option<Location>,
}

impl Decl {
    pub fn any_pointer(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: DeclKind::AnyPointer,
            has_state: false,
            location: None,
        }
    }

    pub fn any_expr(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: DeclKind::AnyExpr,
            has_state: false,
            location: None,
        }
    }

    pub fn stateful(mut self) -> Self {
        self.has_state = true;
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Whether an actual program expression can bind to this declaration
    pub fn accepts(&self, expr: &Expr) -> bool {
        match self.kind {
            DeclKind::AnyExpr => true,
            DeclKind::AnyPointer => expr.ty() == TypeKind::Pointer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPattern {
    pub name: String,
    pub pattern: Pattern,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternRule {
    pub pattern: Pattern,
    pub outcomes: Vec<Outcome>,
    pub location: Option<Location>,
}

impl PatternRule {
    pub fn new(pattern: Pattern, outcomes: Vec<Outcome>) -> Self {
        Self {
            pattern,
            outcomes,
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// Rules applying while the stateful expression is in one of `states`
#[derive(Debug, Clone, PartialEq)]
pub struct StateClause {
    pub states: Vec<String>,
    pub rules: Vec<PatternRule>,
    pub location: Option<Location>,
}

impl StateClause {
    /// True when any state-list entry accepts `name`
    pub fn applies_to(&self, name: &str) -> bool {
        self.states
            .iter()
            .any(|pattern| super::state::state_name_matches(pattern, name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Decl(Decl),
    NamedPattern(NamedPattern),
    StateClause(StateClause),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateMachine {
    pub name: String,
    pub clauses: Vec<Clause>,
    pub location: Option<Location>,
}

impl StateMachine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            clauses: Vec::new(),
            location: None,
        }
    }

    pub fn decl(mut self, decl: Decl) -> Self {
        self.clauses.push(Clause::Decl(decl));
        self
    }

    pub fn named_pattern(mut self, name: &str, pattern: Pattern) -> Self {
        self.clauses.push(Clause::NamedPattern(NamedPattern {
            name: name.to_string(),
            pattern,
            location: None,
        }));
        self
    }

    pub fn state_clause(mut self, states: &[&str], rules: Vec<PatternRule>) -> Self {
        self.clauses.push(Clause::StateClause(StateClause {
            states: states.iter().map(|state| state.to_string()).collect(),
            rules,
            location: None,
        }));
        self
    }

    pub fn clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn decls(&self) -> impl Iterator<Item = &Decl> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::Decl(decl) => Some(decl),
            _ => None,
        })
    }

    pub fn named_patterns(&self) -> impl Iterator<Item = &NamedPattern> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::NamedPattern(named) => Some(named),
            _ => None,
        })
    }

    pub fn state_clauses(&self) -> impl Iterator<Item = &StateClause> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::StateClause(sc) => Some(sc),
            _ => None,
        })
    }
}

/// A parsed checker file: one or more state machines
#[derive(Debug, Clone, PartialEq)]
pub struct Checker {
    pub name: String,
    pub machines: Vec<StateMachine>,
}

impl Checker {
    pub fn new(name: &str, machines: Vec<StateMachine>) -> Self {
        Self {
            name: name.to_string(),
            machines,
        }
    }
}

impl fmt::Display for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sm {} {{", self.name)?;
        for clause in &self.clauses {
            match clause {
                Clause::Decl(decl) => {
                    let state = if decl.has_state { "stateful " } else { "" };
                    let kind = match decl.kind {
                        DeclKind::AnyPointer => "any_pointer",
                        DeclKind::AnyExpr => "any_expr",
                    };
                    writeln!(f, "  {}decl {} {};", state, kind, decl.name)?;
                }
                Clause::NamedPattern(named) => {
                    writeln!(f, "  {} = {};", named.name, named.pattern)?;
                }
                Clause::StateClause(sc) => {
                    writeln!(f, "  {}:", sc.states.join(", "))?;
                    for (i, rule) in sc.rules.iter().enumerate() {
                        let outcomes: Vec<String> =
                            rule.outcomes.iter().map(|o| o.to_string()).collect();
                        let sep = if i == 0 { " " } else { "| " };
                        writeln!(f, "   {}{{ {} }} => {}", sep, rule.pattern, outcomes.join(", "))?;
                    }
                    writeln!(f, "  ;")?;
                }
            }
        }
        write!(f, "}}")
    }
}
