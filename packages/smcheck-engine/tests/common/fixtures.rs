//! Checker fixtures

use smcheck_engine::features::checker::{Checker, Decl, Outcome, Pattern, PatternRule, StateMachine};
use smcheck_engine::shared::models::CmpOp;

/// The classic malloc checker: NULL checks, frees, dereferences and leaks
pub fn malloc_checker() -> StateMachine {
    StateMachine::new("malloc_checker")
        .decl(Decl::any_pointer("ptr").stateful())
        .state_clause(
            &["ptr.start"],
            vec![PatternRule::new(
                Pattern::result_of_call("ptr", "malloc"),
                vec![Outcome::transition("ptr.unknown")],
            )],
        )
        .state_clause(
            &["ptr.unknown"],
            vec![
                PatternRule::new(
                    Pattern::comparison("ptr", CmpOp::Eq, 0i64),
                    vec![
                        Outcome::on_true(Outcome::transition("ptr.null")),
                        Outcome::on_false(Outcome::transition("ptr.nonnull")),
                    ],
                ),
                PatternRule::new(
                    Pattern::dereference("ptr"),
                    vec![Outcome::error_with_cwe(
                        "possible NULL dereference of {ptr}",
                        "CWE-690",
                    )],
                ),
            ],
        )
        .state_clause(
            &["ptr.unknown", "ptr.nonnull"],
            vec![
                PatternRule::new(
                    Pattern::args_of_call("free", vec!["ptr".into()]),
                    vec![Outcome::transition("ptr.free")],
                ),
                PatternRule::new(
                    Pattern::leaked("ptr"),
                    vec![Outcome::error_with_cwe("leak of {ptr}", "CWE-401")],
                ),
            ],
        )
        .state_clause(
            &["ptr.free"],
            vec![
                PatternRule::new(
                    Pattern::args_of_call("free", vec!["ptr".into()]),
                    vec![Outcome::error_with_cwe("double free of {ptr}", "CWE-415")],
                ),
                PatternRule::new(
                    Pattern::dereference("ptr"),
                    vec![Outcome::error_with_cwe("use of freed pointer {ptr}", "CWE-416")],
                ),
            ],
        )
}

pub fn malloc_checker_suite() -> Checker {
    Checker::new("malloc", vec![malloc_checker()])
}
