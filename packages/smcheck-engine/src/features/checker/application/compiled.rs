/*
 * Compiled State Machine
 *
 * Validated, lookup-friendly form of one `StateMachine`.
 *
 * Load-time checks (all fatal, reported with the DSL location):
 * - every symbolic name in a pattern is a declaration
 * - every named-pattern reference resolves, without cycles
 * - no empty disjunction, no comparison between two literals
 * - every rule's pattern binds the stateful declaration
 * - exactly one stateful declaration drives the machine
 * - every state named in a state clause is reachable from the default
 *   state, unless some action sets states dynamically
 */

use crate::config::find_closest_match;
use crate::errors::{EngineError, EngineResult};
use crate::features::checker::domain::{
    is_wildcard, Decl, Pattern, SmExpr, State, StateClause, StateMachine,
};
use crate::shared::models::Location;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CompiledMachine {
    name: String,
    decls: BTreeMap<String, Decl>,
    named: BTreeMap<String, Pattern>,
    clauses: Vec<StateClause>,
    stateful: Decl,
    default_state: State,
    uses_set_state: bool,
    reachable: BTreeSet<String>,
}

impl CompiledMachine {
    pub fn compile(machine: &StateMachine) -> EngineResult<Self> {
        let decls: BTreeMap<String, Decl> = machine
            .decls()
            .map(|decl| (decl.name.clone(), decl.clone()))
            .collect();
        let named: BTreeMap<String, Pattern> = machine
            .named_patterns()
            .map(|named| (named.name.clone(), named.pattern.clone()))
            .collect();

        let stateful = machine
            .decls()
            .find(|decl| decl.has_state)
            .cloned()
            .ok_or_else(|| EngineError::NoStatefulDecl {
                machine: machine.name.clone(),
            })?;
        let default_state = State::new(format!("{}.start", stateful.name));

        let mut compiled = Self {
            name: machine.name.clone(),
            decls,
            named,
            clauses: machine.state_clauses().cloned().collect(),
            stateful,
            default_state,
            uses_set_state: false,
            reachable: BTreeSet::new(),
        };

        for named in machine.named_patterns() {
            compiled.validate_pattern(&named.pattern, named.location.as_ref(), &mut vec![
                named.name.clone(),
            ])?;
        }
        for clause in &compiled.clauses {
            for rule in &clause.rules {
                let location = rule.location.as_ref().or(clause.location.as_ref());
                compiled.validate_pattern(&rule.pattern, location, &mut Vec::new())?;
                if !compiled.binds_stateful(&rule.pattern) {
                    return Err(EngineError::malformed(
                        format!(
                            "pattern '{}' never binds stateful declaration '{}'",
                            rule.pattern, compiled.stateful.name
                        ),
                        location.cloned(),
                    ));
                }
            }
        }

        compiled.uses_set_state = compiled
            .clauses
            .iter()
            .flat_map(|clause| clause.rules.iter())
            .flat_map(|rule| rule.outcomes.iter())
            .any(|outcome| outcome.uses_set_state());
        compiled.reachable = compiled.iter_reachable_statenames();
        compiled.check_reachability()?;

        debug!(
            machine = %compiled.name,
            clauses = compiled.clauses.len(),
            states = compiled.reachable.len(),
            "state machine compiled"
        );
        Ok(compiled)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decl(&self, name: &str) -> Option<&Decl> {
        self.decls.get(name)
    }

    pub fn named_pattern(&self, name: &str) -> Option<&Pattern> {
        self.named.get(name)
    }

    pub fn clauses(&self) -> &[StateClause] {
        &self.clauses
    }

    pub fn stateful_decl(&self) -> &Decl {
        &self.stateful
    }

    pub fn default_state(&self) -> &State {
        &self.default_state
    }

    pub fn uses_set_state(&self) -> bool {
        self.uses_set_state
    }

    /// The default state plus every state an outcome can enter
    pub fn iter_reachable_statenames(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        names.insert(self.default_state.name.clone());
        for clause in &self.clauses {
            for rule in &clause.rules {
                for outcome in &rule.outcomes {
                    names.extend(outcome.iter_reachable_statenames().into_iter().map(String::from));
                }
            }
        }
        names
    }

    fn check_reachability(&self) -> EngineResult<()> {
        if self.uses_set_state {
            return Ok(());
        }
        for clause in &self.clauses {
            for state in &clause.states {
                if is_wildcard(state) || self.reachable.contains(state) {
                    continue;
                }
                return Err(EngineError::UnreachableState {
                    state: state.clone(),
                    location: clause.location.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_pattern(
        &self,
        pattern: &Pattern,
        location: Option<&Location>,
        visiting: &mut Vec<String>,
    ) -> EngineResult<()> {
        match pattern {
            Pattern::Or(alternatives) => {
                if alternatives.is_empty() {
                    return Err(EngineError::malformed("empty disjunction", location.cloned()));
                }
                for alternative in alternatives {
                    self.validate_pattern(alternative, location, visiting)?;
                }
            }
            Pattern::NamedReference(name) => {
                if visiting.contains(name) {
                    return Err(EngineError::malformed(
                        format!("named pattern '{}' refers to itself", name),
                        location.cloned(),
                    ));
                }
                let target = self.named.get(name).ok_or_else(|| {
                    EngineError::UnknownNamedPattern {
                        name: name.clone(),
                        location: location.cloned(),
                    }
                })?;
                visiting.push(name.clone());
                self.validate_pattern(target, location, visiting)?;
                visiting.pop();
            }
            Pattern::Comparison {
                lhs: SmExpr::Int(_),
                rhs: SmExpr::Int(_),
                ..
            } => {
                return Err(EngineError::malformed(
                    format!("comparison '{}' has no declaration operand", pattern),
                    location.cloned(),
                ));
            }
            Pattern::Assignment {
                lhs: SmExpr::Int(_),
                ..
            }
            | Pattern::ResultOfCall {
                lhs: SmExpr::Int(_),
                ..
            } => {
                return Err(EngineError::malformed(
                    format!("assignment '{}' to a literal", pattern),
                    location.cloned(),
                ));
            }
            Pattern::ResultOfCall { func, .. } | Pattern::ArgsOfCall { func, .. }
                if func.is_empty() =>
            {
                return Err(EngineError::malformed("call pattern without callee", location.cloned()));
            }
            _ => {}
        }

        for sm_expr in pattern.sm_exprs() {
            if let SmExpr::Decl(name) = sm_expr {
                if !self.decls.contains_key(name) {
                    let candidates: Vec<String> = self.decls.keys().cloned().collect();
                    return Err(EngineError::UnknownDecl {
                        name: name.clone(),
                        suggestion: find_closest_match(name, &candidates),
                        location: location.cloned(),
                    });
                }
            }
        }
        Ok(())
    }

    /// A pattern binds the stateful decl when every way of matching it does.
    /// Only called on validated (acyclic) patterns.
    fn binds_stateful(&self, pattern: &Pattern) -> bool {
        match pattern {
            Pattern::Or(alternatives) => alternatives
                .iter()
                .all(|alternative| self.binds_stateful(alternative)),
            Pattern::NamedReference(name) => self
                .named
                .get(name)
                .map_or(false, |target| self.binds_stateful(target)),
            other => other
                .sm_exprs()
                .into_iter()
                .any(|sm_expr| matches!(sm_expr, SmExpr::Decl(name) if *name == self.stateful.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::checker::domain::{Outcome, PatternRule};
    use crate::shared::models::CmpOp;

    fn base() -> StateMachine {
        StateMachine::new("malloc")
            .decl(Decl::any_pointer("ptr").stateful())
            .decl(Decl::any_expr("other"))
    }

    fn malloc_machine() -> StateMachine {
        base()
            .named_pattern("released", Pattern::args_of_call("free", vec!["ptr".into()]))
            .state_clause(
                &["ptr.start"],
                vec![PatternRule::new(
                    Pattern::result_of_call("ptr", "malloc"),
                    vec![Outcome::transition("ptr.unknown")],
                )],
            )
            .state_clause(
                &["ptr.unknown"],
                vec![PatternRule::new(
                    Pattern::comparison("ptr", CmpOp::Eq, 0i64),
                    vec![
                        Outcome::on_true(Outcome::transition("ptr.null")),
                        Outcome::on_false(Outcome::transition("ptr.nonnull")),
                    ],
                )],
            )
            .state_clause(
                &["ptr.nonnull", "ptr.null"],
                vec![PatternRule::new(
                    Pattern::named("released"),
                    vec![Outcome::transition("ptr.freed")],
                )],
            )
            .state_clause(
                &["ptr.freed"],
                vec![PatternRule::new(
                    Pattern::dereference("ptr"),
                    vec![Outcome::error("use after free of {ptr}")],
                )],
            )
    }

    #[test]
    fn test_compile_malloc_machine() {
        let compiled = CompiledMachine::compile(&malloc_machine()).unwrap();
        assert_eq!(compiled.default_state(), &State::new("ptr.start"));
        assert_eq!(compiled.stateful_decl().name, "ptr");
        let names = compiled.iter_reachable_statenames();
        for name in ["ptr.start", "ptr.unknown", "ptr.null", "ptr.nonnull", "ptr.freed"] {
            assert!(names.contains(name), "{} should be reachable", name);
        }
    }

    #[test]
    fn test_unknown_decl_suggests_closest() {
        let machine = base().state_clause(
            &["ptr.start"],
            vec![PatternRule::new(
                Pattern::args_of_call("free", vec!["ptr".into(), "othr".into()]),
                vec![Outcome::transition("ptr.freed")],
            )],
        );
        match CompiledMachine::compile(&machine) {
            Err(EngineError::UnknownDecl { name, suggestion, .. }) => {
                assert_eq!(name, "othr");
                assert!(suggestion.contains("other"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_state_is_rejected() {
        let machine = base().state_clause(
            &["ptr.zombie"],
            vec![PatternRule::new(
                Pattern::dereference("ptr"),
                vec![Outcome::error("zombie")],
            )],
        );
        assert!(matches!(
            CompiledMachine::compile(&machine),
            Err(EngineError::UnreachableState { state, .. }) if state == "ptr.zombie"
        ));
    }

    #[test]
    fn test_set_state_and_wildcards_skip_reachability() {
        let machine = base()
            .state_clause(
                &["ptr.start"],
                vec![PatternRule::new(
                    Pattern::result_of_call("ptr", "malloc"),
                    vec![Outcome::Action(
                        crate::features::checker::domain::ActionOutcome::new("dyn", |ctx| {
                            ctx.set_state("ptr.zombie");
                            Ok(())
                        })
                        .with_set_state(),
                    )],
                )],
            )
            .state_clause(
                &["ptr.zombie", "*.gone"],
                vec![PatternRule::new(
                    Pattern::dereference("ptr"),
                    vec![Outcome::error("zombie")],
                )],
            );
        let compiled = CompiledMachine::compile(&machine).unwrap();
        assert!(compiled.uses_set_state());
    }

    #[test]
    fn test_named_pattern_cycle_is_rejected() {
        let machine = base()
            .named_pattern("a", Pattern::Or(vec![Pattern::named("b"), Pattern::usage("ptr")]))
            .named_pattern("b", Pattern::named("a"));
        assert!(matches!(
            CompiledMachine::compile(&machine),
            Err(EngineError::MalformedPattern { .. })
        ));
    }

    #[test]
    fn test_unknown_named_pattern() {
        let machine = base().state_clause(
            &["ptr.start"],
            vec![PatternRule::new(Pattern::named("nope"), vec![])],
        );
        assert!(matches!(
            CompiledMachine::compile(&machine),
            Err(EngineError::UnknownNamedPattern { name, .. }) if name == "nope"
        ));
    }

    #[test]
    fn test_structural_errors() {
        let no_state = StateMachine::new("bare").decl(Decl::any_pointer("ptr"));
        assert!(matches!(
            CompiledMachine::compile(&no_state),
            Err(EngineError::NoStatefulDecl { .. })
        ));

        let empty_or = base().state_clause(
            &["ptr.start"],
            vec![PatternRule::new(Pattern::Or(vec![]), vec![])],
        );
        assert!(CompiledMachine::compile(&empty_or).is_err());

        let literals = base().state_clause(
            &["ptr.start"],
            vec![PatternRule::new(Pattern::comparison(1i64, CmpOp::Eq, 0i64), vec![])],
        );
        assert!(CompiledMachine::compile(&literals).is_err());

        let unbound = base().state_clause(
            &["ptr.start"],
            vec![PatternRule::new(Pattern::usage("other"), vec![])],
        );
        assert!(matches!(
            CompiledMachine::compile(&unbound),
            Err(EngineError::MalformedPattern { .. })
        ));
    }
}
