//! End-to-end scenarios for the malloc checker
//!
//! Each test builds a small program by hand, the way the host compiler
//! would hand it over, and checks states, facts and reports.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use smcheck_engine::config::EngineConfig;
use smcheck_engine::pipeline::{AnalysisOutcome, StateMachineAnalysis};
use smcheck_engine::shared::models::{CmpOp, Expr, Statement};

fn analysis() -> StateMachineAnalysis {
    StateMachineAnalysis::new(&malloc_checker(), EngineConfig::default()).unwrap()
}

#[test]
fn test_result_of_malloc_is_unknown() {
    let mut program = ProgramBuilder::new();
    let test = program.function("test", 1, 5);
    let p = program.pointer(test, "p");
    let alloc = program.stmt(test, 2, Statement::call(Some(p.clone()), "malloc", vec![]));
    let next = program.marker(test, 3, "marker");
    let (entry, exit) = (program.entry(test), program.exit(test));
    program.chain(&[entry, alloc, next, exit]);
    let supergraph = program.build();

    let analysis = analysis();
    let solution = analysis.solve(&supergraph).unwrap();
    assert_statenames(&solution, alloc, &p, &["ptr.start"]);
    assert_statenames(&solution, next, &p, &["ptr.unknown"]);
}

#[test]
fn test_null_check_splits_states() {
    let mut program = ProgramBuilder::new();
    let test = program.function("test", 1, 8);
    let p = program.pointer(test, "p");
    let (_, check) = malloc_and_check(&mut program, test, &p, 2);
    let on_null = program.marker(test, 4, "on_null");
    let on_nonnull = program.marker(test, 6, "on_nonnull");
    let exit = program.exit(test);
    program.branch(check, on_null, on_nonnull);
    program.chain(&[on_null, exit]);
    program.chain(&[on_nonnull, exit]);
    let supergraph = program.build();

    let analysis = analysis();
    let solution = analysis.solve(&supergraph).unwrap();
    assert_statenames(&solution, check, &p, &["ptr.unknown"]);
    assert_statenames(&solution, on_null, &p, &["ptr.null"]);
    assert_statenames(&solution, on_nonnull, &p, &["ptr.nonnull"]);
    assert_fact(&solution, on_null, &p, CmpOp::Eq, &Expr::null());
    assert_fact(&solution, on_nonnull, &p, CmpOp::Ne, &Expr::null());
}

#[test]
fn test_fact_survives_rejoin_of_untouched_branches() {
    let mut program = ProgramBuilder::new();
    let test = program.function("test", 1, 12);
    let flag = program.int_param(test, "flag");
    let x = program.int(test, "x");

    let outer = program.stmt(test, 2, Statement::cond(flag.clone(), CmpOp::Ne, Expr::constant(0)));
    let inner = program.stmt(test, 3, Statement::cond(x.clone(), CmpOp::Eq, Expr::constant(1)));
    let then_arm = program.stmt(test, 4, Statement::assign(x.clone(), Expr::constant(2)));
    let else_arm = program.marker(test, 6, "other");
    let joined = program.marker(test, 8, "marker_A");
    let (entry, exit) = (program.entry(test), program.exit(test));
    program.edge(entry, outer);
    program.branch(outer, inner, exit);
    program.branch(inner, then_arm, else_arm);
    program.edge(then_arm, joined);
    program.edge(else_arm, joined);
    program.edge(joined, exit);
    let supergraph = program.build();

    let analysis = analysis();
    let solution = analysis.solve(&supergraph).unwrap();
    let zero = Expr::constant(0);
    assert_fact(&solution, then_arm, &flag, CmpOp::Ne, &zero);
    assert_fact(&solution, else_arm, &flag, CmpOp::Ne, &zero);
    assert_fact(&solution, joined, &flag, CmpOp::Ne, &zero);

    // x differs per arm and must not survive the merge
    let facts = solution.facts_at(joined).unwrap();
    assert!(!facts.has(&x, CmpOp::Eq, &Expr::constant(2)));
    assert!(!facts.has(&x, CmpOp::Ne, &Expr::constant(1)));
}

/// ```c
/// void test(int flag) {
///     void *ptr;
///     if (flag) {
///         ptr = malloc(4096);
///         if (!ptr) return;
///         marker_A();
///     }
///     marker_B();
///     if (flag) {
///         marker_C();
///         free(ptr);
///     }
///     marker_D();
/// }
/// ```
#[test]
fn test_leak_requiring_contradictory_branches_is_impossible() {
    let mut program = ProgramBuilder::new();
    let test = program.function("test", 1, 16);
    let flag = program.int_param(test, "flag");
    let ptr = program.pointer(test, "ptr");
    let zero = Expr::constant(0);

    let first = program.stmt(test, 3, Statement::cond(flag.clone(), CmpOp::Ne, zero.clone()));
    let alloc = program.stmt(
        test,
        4,
        Statement::call(Some(ptr.clone()), "malloc", vec![Expr::constant(4096)]),
    );
    let check = program.stmt(test, 5, Statement::cond(ptr.clone(), CmpOp::Eq, Expr::null()));
    let marker_a = program.marker(test, 6, "marker_A");
    let marker_b = program.marker(test, 8, "marker_B");
    let second = program.stmt(test, 9, Statement::cond(flag.clone(), CmpOp::Ne, zero.clone()));
    let marker_c = program.marker(test, 10, "marker_C");
    let release = program.stmt(test, 11, Statement::call(None, "free", vec![ptr.clone()]));
    let marker_d = program.marker(test, 13, "marker_D");
    let done = program.stmt(test, 14, Statement::Return { value: None });
    let (entry, exit) = (program.entry(test), program.exit(test));

    program.edge(entry, first);
    program.branch(first, alloc, marker_b);
    program.edge(alloc, check);
    program.branch(check, done, marker_a);
    program.edge(marker_a, marker_b);
    program.edge(marker_b, second);
    program.branch(second, marker_c, marker_d);
    program.chain(&[marker_c, release, marker_d, done, exit]);
    let supergraph = program.build();

    let analysis = analysis();
    let mut solution = analysis.solve(&supergraph).unwrap();

    assert_fact(&solution, marker_a, &flag, CmpOp::Ne, &zero);
    assert_fact(&solution, marker_a, &ptr, CmpOp::Ne, &zero);
    assert_statenames(&solution, marker_a, &ptr, &["ptr.nonnull"]);
    assert_statenames(&solution, marker_b, &ptr, &["ptr.nonnull", "ptr.start"]);
    // flag is known again, but the states pass alone cannot use it
    assert_fact(&solution, marker_c, &flag, CmpOp::Ne, &zero);
    assert_statenames(&solution, marker_c, &ptr, &["ptr.nonnull", "ptr.start"]);
    assert_statenames(&solution, marker_d, &ptr, &["ptr.free", "ptr.nonnull", "ptr.start"]);

    let leak_edge = supergraph.in_edges(exit)[0];
    let leak = solution
        .possible_matches(leak_edge)
        .iter()
        .find(|pm| pm.matched.description(None) == "ptr leaves scope")
        .expect("ptr is leaked at the end of test");
    assert_eq!(leak.expr, ptr);

    assert_eq!(solution.errors().len(), 1);
    let error = solution.errors()[0].clone();
    assert_eq!(error.message, "leak of ptr");
    assert_eq!(error.state.name, "ptr.nonnull");
    assert_error_is_impossible(&mut solution, &error);

    match analysis.run(&supergraph).unwrap() {
        AnalysisOutcome::Analyzed(report) => {
            assert!(report.reports.is_empty());
            assert_eq!(report.suppressed.len(), 1);
            assert_eq!(report.stats.errors_found, 1);
            assert!(report.stats.pruned_nodes > 0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

/// ```c
/// void test(int flag) {
///     int seen;
///     if (flag) {
///         seen = 1;
///         noop();
///         marker_A();
///     }
/// }
/// ```
#[test]
fn test_caller_facts_survive_call_to_analyzed_function() {
    let mut program = ProgramBuilder::new();
    let noop = program.function("noop", 20, 22);
    let (noop_entry, noop_exit) = (program.entry(noop), program.exit(noop));
    program.edge(noop_entry, noop_exit);

    let test = program.function("test", 1, 8);
    let flag = program.int_param(test, "flag");
    let seen = program.int(test, "seen");
    let zero = Expr::constant(0);
    let check = program.stmt(test, 3, Statement::cond(flag.clone(), CmpOp::Ne, zero.clone()));
    let set = program.stmt(test, 4, Statement::assign(seen.clone(), Expr::constant(1)));
    let (call, ret) = program.call(test, 5, Statement::call(None, "noop", vec![]), noop);
    let marker_a = program.marker(test, 6, "marker_A");
    let (entry, exit) = (program.entry(test), program.exit(test));
    program.edge(entry, check);
    program.branch(check, set, exit);
    program.chain(&[set, call]);
    program.chain(&[ret, marker_a, exit]);
    program.entry_point(test);
    let supergraph = program.build();

    let solution = analysis().solve(&supergraph).unwrap();
    assert_fact(&solution, call, &flag, CmpOp::Ne, &zero);
    assert_fact(&solution, ret, &flag, CmpOp::Ne, &zero);
    assert_fact(&solution, ret, &seen, CmpOp::Eq, &Expr::constant(1));
    assert_fact(&solution, marker_a, &flag, CmpOp::Ne, &zero);
}

/// The contradictory-branches program with a call to an analyzed function
/// between the two `flag` checks
///
/// ```c
/// void noop(void) {}
///
/// void test(int flag) {
///     void *ptr;
///     if (flag) {
///         ptr = malloc(4096);
///         if (!ptr) return;
///         marker_A();
///     }
///     marker_B();
///     noop();
///     if (flag) {
///         marker_C();
///         free(ptr);
///     }
///     marker_D();
/// }
/// ```
#[test]
fn test_leak_requiring_contradictory_branches_across_call_is_impossible() {
    let mut program = ProgramBuilder::new();
    let noop = program.function("noop", 30, 31);
    let (noop_entry, noop_exit) = (program.entry(noop), program.exit(noop));
    program.edge(noop_entry, noop_exit);

    let test = program.function("test", 1, 17);
    let flag = program.int_param(test, "flag");
    let ptr = program.pointer(test, "ptr");
    let zero = Expr::constant(0);

    let first = program.stmt(test, 3, Statement::cond(flag.clone(), CmpOp::Ne, zero.clone()));
    let alloc = program.stmt(
        test,
        4,
        Statement::call(Some(ptr.clone()), "malloc", vec![Expr::constant(4096)]),
    );
    let check = program.stmt(test, 5, Statement::cond(ptr.clone(), CmpOp::Eq, Expr::null()));
    let marker_a = program.marker(test, 6, "marker_A");
    let marker_b = program.marker(test, 8, "marker_B");
    let (call, ret) = program.call(test, 9, Statement::call(None, "noop", vec![]), noop);
    let second = program.stmt(test, 10, Statement::cond(flag.clone(), CmpOp::Ne, zero.clone()));
    let marker_c = program.marker(test, 11, "marker_C");
    let release = program.stmt(test, 12, Statement::call(None, "free", vec![ptr.clone()]));
    let marker_d = program.marker(test, 14, "marker_D");
    let done = program.stmt(test, 15, Statement::Return { value: None });
    let (entry, exit) = (program.entry(test), program.exit(test));

    program.edge(entry, first);
    program.branch(first, alloc, marker_b);
    program.edge(alloc, check);
    program.branch(check, done, marker_a);
    program.chain(&[marker_a, marker_b, call]);
    program.edge(ret, second);
    program.branch(second, marker_c, marker_d);
    program.chain(&[marker_c, release, marker_d, done, exit]);
    program.entry_point(test);
    let supergraph = program.build();

    let analysis = analysis();
    let mut solution = analysis.solve(&supergraph).unwrap();
    assert_statenames(&solution, ret, &ptr, &["ptr.nonnull", "ptr.start"]);
    assert_eq!(solution.errors().len(), 1);
    let error = solution.errors()[0].clone();
    assert_eq!(error.message, "leak of ptr");
    assert_eq!(error.state.name, "ptr.nonnull");
    assert_error_is_impossible(&mut solution, &error);

    match analysis.run(&supergraph).unwrap() {
        AnalysisOutcome::Analyzed(report) => {
            assert!(report.reports.is_empty());
            assert_eq!(report.suppressed.len(), 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

/// ```c
/// void test(void) {
///     void *p = malloc(4096);
///     int n, m;
///     if (p == NULL)
///         return;
///     n = m;
/// }
/// ```
#[test]
fn test_leak_detected_when_last_statement_is_a_copy() {
    let mut program = ProgramBuilder::new();
    let test = program.function("test", 1, 8);
    let p = program.pointer(test, "p");
    let n = program.int(test, "n");
    let m = program.int(test, "m");
    let (_, check) = malloc_and_check(&mut program, test, &p, 2);
    let done = program.stmt(test, 5, Statement::Return { value: None });
    let copy = program.stmt(test, 6, Statement::assign(n, m));
    let exit = program.exit(test);
    program.branch(check, done, copy);
    program.edge(done, exit);
    program.edge(copy, exit);
    let supergraph = program.build();

    let analysis = analysis();
    let solution = analysis.solve(&supergraph).unwrap();
    assert_statenames(&solution, copy, &p, &["ptr.nonnull"]);
    assert_eq!(solution.errors().len(), 1);
    assert_eq!(solution.errors()[0].message, "leak of p");
    assert_eq!(solution.errors()[0].node, copy);

    let outcome = analysis.run(&supergraph).unwrap();
    let reports = outcome.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].message, "leak of p");
    assert_eq!(reports[0].location, Some(line(6)));
}

/// ```c
/// void test(void) {            // line 9
///     void *p = malloc(4096);  // line 10
///     if (p == NULL)           // line 11
///         return;
///     free(p);                 // line 12
///     x = *p;                  // line 13
///     return;                  // line 14
/// }                            // line 16
/// ```
#[test]
fn test_use_after_free_reported_once_with_witness() {
    let mut program = ProgramBuilder::new();
    let test = program.function("test", 9, 16);
    let p = program.pointer(test, "p");
    let x = program.int(test, "x");
    let (_, check) = malloc_and_check(&mut program, test, &p, 10);
    let release = program.stmt(test, 12, Statement::call(None, "free", vec![p.clone()]));
    let deref = program.stmt(test, 13, Statement::assign(x, Expr::deref(p.clone())));
    let done = program.stmt(test, 14, Statement::Return { value: None });
    let exit = program.exit(test);
    program.branch(check, done, release);
    program.chain(&[release, deref, done, exit]);
    let supergraph = program.build();

    let analysis = analysis();
    let outcome = analysis.run(&supergraph).unwrap();
    let reports = outcome.reports();
    assert_eq!(reports.len(), 1);

    let report = &reports[0];
    assert_eq!(report.message, "use of freed pointer p");
    assert_eq!(report.cwe.as_deref(), Some("CWE-416"));
    assert_eq!(report.function.as_deref(), Some("test"));
    assert_eq!(report.location, Some(line(13)));

    let notes: Vec<(u32, &str)> = report
        .notes
        .iter()
        .map(|note| (note.location.line, note.message.as_str()))
        .collect();
    assert_eq!(
        notes,
        vec![
            (10, "p assigned to the result of malloc()"),
            (11, "when p != 0"),
            (12, "p passed to free()"),
            (13, "use of freed pointer p"),
        ]
    );

    let mut solution = analysis.solve(&supergraph).unwrap();
    let error = solution.errors()[0].clone();
    assert_eq!(error.node, deref);
    let exploded = explode(&mut solution);
    assert_witness_path_is_valid(&exploded, &error);
}

/// Callee frees its parameter; the caller's argument is freed after the call
#[test]
fn test_free_in_callee_reaches_caller_argument() {
    let mut program = ProgramBuilder::new();
    let release = program.function("release", 19, 22);
    let q = program.pointer_param(release, "q");
    let free_q = program.stmt(release, 20, Statement::call(None, "free", vec![q.clone()]));
    let (release_entry, release_exit) = (program.entry(release), program.exit(release));
    program.chain(&[release_entry, free_q, release_exit]);

    let test = program.function("test", 29, 36);
    let p = program.pointer(test, "p");
    let x = program.int(test, "x");
    let (_, check) = malloc_and_check(&mut program, test, &p, 30);
    let (call, ret) = program.call(test, 32, Statement::call(None, "release", vec![p.clone()]), release);
    let deref = program.stmt(test, 33, Statement::assign(x, Expr::deref(p.clone())));
    let done = program.stmt(test, 34, Statement::Return { value: None });
    let exit = program.exit(test);
    program.branch(check, done, call);
    program.chain(&[ret, deref, done, exit]);
    program.entry_point(test);
    let supergraph = program.build();

    let analysis = analysis();
    let solution = analysis.solve(&supergraph).unwrap();
    assert_statenames(&solution, call, &p, &["ptr.nonnull"]);
    assert_statenames(&solution, free_q, &q, &["ptr.nonnull"]);
    assert_statenames(&solution, release_exit, &q, &["ptr.free"]);
    assert_statenames(&solution, ret, &p, &["ptr.free"]);

    let outcome = analysis.run(&supergraph).unwrap();
    let reports = outcome.reports();
    assert_eq!(reports.len(), 1);
    let notes: Vec<(u32, &str)> = reports[0]
        .notes
        .iter()
        .map(|note| (note.location.line, note.message.as_str()))
        .collect();
    assert_eq!(
        notes,
        vec![
            (30, "p assigned to the result of malloc()"),
            (31, "when p != 0"),
            (32, "p passed to release() as q"),
            (20, "q passed to free()"),
            (22, "returning from release()"),
            (33, "use of freed pointer p"),
        ]
    );
}
