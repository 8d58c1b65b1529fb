//! Facts across call-to-start and exit-to-return-site edges
//!
//! Facts are rewritten through an argument/parameter mapping; anything still
//! mentioning a variable of the function being left is dropped. Facts over
//! the caller's own variables ride through the callee unchanged and come
//! back at the return site, minus those naming the call's result or a
//! variable whose address was passed.

use crate::features::facts::domain::{Fact, Facts};
use crate::shared::models::{CmpOp, Expr, FunctionId, Supergraph};
use petgraph::graph::NodeIndex;
use rustc_hash::FxHashMap;

/// Caller facts → callee entry, arguments renamed to parameters
pub fn call_to_start(
    supergraph: &Supergraph,
    src: &Facts,
    call_node: NodeIndex,
    callee_entry: NodeIndex,
) -> Option<Facts> {
    let callee = supergraph.function_of(callee_entry)?;
    let caller = supergraph.node(call_node).function?;
    let (_, args) = supergraph.call_at(call_node)?;
    let written = address_taken(args);

    let mut mapping: FxHashMap<Expr, Expr> = FxHashMap::default();
    let mut out = Facts::new();
    for (arg, param) in args.iter().zip(callee.param_exprs()) {
        let arg = arg.simplify();
        if arg.is_const() {
            out.add(Fact::new(param, CmpOp::Eq, arg));
        } else if let Some(first) = mapping.get(&arg) {
            // same argument passed twice
            out.add(Fact::new(param, CmpOp::Eq, first.clone()));
        } else {
            mapping.insert(arg, param);
        }
    }

    for fact in src.iter().filter(|fact| !mentions_any(fact, &written)) {
        if let Some(renamed) = remap(fact, &mapping, caller) {
            out.add(renamed);
        }
        // a recursive call opens a fresh frame over the same variables
        if caller != callee.id && is_owned_by(fact, caller) {
            out.add(fact.clone());
        }
    }
    Some(out)
}

/// Callee facts at exit → caller return site, parameters renamed back to
/// arguments and the return value renamed to the call's result
pub fn exit_to_return_site(
    supergraph: &Supergraph,
    src: &Facts,
    exit_node: NodeIndex,
    call_site: NodeIndex,
) -> Option<Facts> {
    let callee = supergraph.function_of(exit_node)?;
    let caller = supergraph.node(call_site).function?;
    let (result, args) = supergraph.call_at(call_site)?;
    let result = result.map(Expr::simplify);

    let mut overwritten = address_taken(args);
    overwritten.extend(result.iter().cloned());

    let mut mapping: FxHashMap<Expr, Expr> = FxHashMap::default();
    for (param, arg) in callee.param_exprs().into_iter().zip(args) {
        let arg = arg.simplify();
        // `y = f(y)`: facts on the parameter describe the old y
        if result.as_ref() != Some(&arg) {
            mapping.insert(param, arg);
        }
    }

    let mut out = Facts::new();
    if let (Some(result), Some(ret)) = (result.as_ref(), callee.return_value.as_ref()) {
        match mapping.get(ret).cloned() {
            Some(arg) => {
                out.add(Fact::new(result.clone(), CmpOp::Eq, arg));
            }
            None if ret.is_const() => {
                out.add(Fact::new(result.clone(), CmpOp::Eq, ret.clone()));
            }
            None => {
                mapping.insert(ret.clone(), result.clone());
            }
        }
    }

    for fact in src.iter().filter(|fact| !mentions_any(fact, &overwritten)) {
        if let Some(fact) = remap(fact, &mapping, callee.id) {
            if is_visible_in(&fact, caller) {
                out.add(fact);
            }
        }
    }
    Some(out)
}

/// Targets of `&x` arguments; the callee may write through them
fn address_taken(args: &[Expr]) -> Vec<Expr> {
    args.iter()
        .filter_map(|arg| match arg.simplify() {
            Expr::AddrOf(target) => Some(*target),
            _ => None,
        })
        .collect()
}

fn mentions_any(fact: &Fact, exprs: &[Expr]) -> bool {
    exprs.iter().any(|expr| fact.mentions(expr))
}

/// Every variable of the fact is a variable of `function`
fn is_owned_by(fact: &Fact, function: FunctionId) -> bool {
    let mut vars = fact.lhs.variables().into_iter().chain(fact.rhs.variables()).peekable();
    vars.peek().is_some() && vars.all(|var| var.function == Some(function))
}

/// No variable of the fact belongs to a function other than `function`
fn is_visible_in(fact: &Fact, function: FunctionId) -> bool {
    fact.lhs
        .variables()
        .into_iter()
        .chain(fact.rhs.variables())
        .all(|var| var.function.map_or(true, |owner| owner == function))
}

/// Rewrites both sides; `None` if either side still refers to `leaving`
fn remap(fact: &Fact, mapping: &FxHashMap<Expr, Expr>, leaving: FunctionId) -> Option<Fact> {
    let lhs = fact.lhs.substitute(mapping);
    let rhs = fact.rhs.substitute(mapping);
    let mapped_into_scope =
        |expr: &Expr| !expr.is_scoped_to(leaving) || mapping.values().any(|v| v == expr);
    if mapped_into_scope(&lhs) && mapped_into_scope(&rhs) {
        Some(Fact::new(lhs, fact.op, rhs))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{Statement, SupergraphBuilder, TypeKind};
    use pretty_assertions::assert_eq;

    struct Fixture {
        supergraph: Supergraph,
        call: NodeIndex,
        x: Expr,
        y: Expr,
        z: Expr,
        g: Expr,
        n: Expr,
    }

    /// main(): x, y, z locals; `y = id(x, 7)` whose params are (a, b)
    fn fixture() -> Fixture {
        let mut builder = SupergraphBuilder::new();
        let g = builder.add_global("g", TypeKind::Integer);
        let main = builder.add_function("main", None);
        let callee = builder.add_function("id", None);
        let x = builder.add_local(main, "x", TypeKind::Integer);
        let y = builder.add_local(main, "y", TypeKind::Integer);
        let z = builder.add_local(main, "z", TypeKind::Integer);
        builder.add_param(callee, "a", TypeKind::Integer);
        let b = builder.add_param(callee, "b", TypeKind::Integer);
        let n = builder.add_local(callee, "n", TypeKind::Integer);
        let ret = builder.add_stmt(callee, Statement::Return { value: Some(b) }, None);
        let (entry, exit) = (builder.entry(callee), builder.exit(callee));
        builder.edge(entry, ret);
        builder.edge(ret, exit);
        let (call, _) = builder.add_call(
            main,
            Statement::call(Some(y.clone()), "id", vec![x.clone(), Expr::constant(7)]),
            callee,
            None,
        );
        Fixture {
            supergraph: builder.build().unwrap(),
            call,
            x,
            y,
            z,
            g,
            n,
        }
    }

    #[test]
    fn test_call_to_start_renames_arguments_and_keeps_caller_facts() {
        let fx = fixture();
        let callee = fx.supergraph.function_by_name("id").unwrap();
        let (a, b) = (callee.param_exprs()[0].clone(), callee.param_exprs()[1].clone());
        let caller_facts = Facts::from_facts([
            Fact::new(fx.x.clone(), CmpOp::Gt, Expr::constant(0)),
            Fact::new(fx.y.clone(), CmpOp::Eq, Expr::constant(3)),
            Fact::new(fx.g.clone(), CmpOp::Ne, Expr::constant(0)),
        ]);
        let facts = call_to_start(&fx.supergraph, &caller_facts, fx.call, callee.entry).unwrap();
        assert_eq!(
            facts,
            Facts::from_facts([
                Fact::new(a, CmpOp::Gt, Expr::constant(0)),
                Fact::new(b, CmpOp::Eq, Expr::constant(7)),
                Fact::new(fx.g.clone(), CmpOp::Ne, Expr::constant(0)),
                Fact::new(fx.x.clone(), CmpOp::Gt, Expr::constant(0)),
                Fact::new(fx.y.clone(), CmpOp::Eq, Expr::constant(3)),
            ])
        );
    }

    #[test]
    fn test_round_trip_through_non_mutating_callee() {
        let fx = fixture();
        let callee = fx.supergraph.function_by_name("id").unwrap();
        let caller_facts = Facts::from_facts([
            Fact::new(fx.x.clone(), CmpOp::Gt, Expr::constant(0)),
            Fact::new(fx.g.clone(), CmpOp::Ne, Expr::constant(0)),
            Fact::new(fx.y.clone(), CmpOp::Eq, Expr::constant(3)),
            Fact::new(fx.z.clone(), CmpOp::Eq, Expr::constant(4)),
        ]);
        let at_entry = call_to_start(&fx.supergraph, &caller_facts, fx.call, callee.entry).unwrap();
        let back = exit_to_return_site(&fx.supergraph, &at_entry, callee.exit, fx.call).unwrap();

        // y is overwritten by the call result
        let mut expected = caller_facts.clone();
        expected.remove_mentions(&fx.y);
        expected.add(Fact::new(fx.y.clone(), CmpOp::Eq, Expr::constant(7)));
        assert_eq!(back, expected);
    }

    #[test]
    fn test_exit_drops_callee_locals() {
        let fx = fixture();
        let callee = fx.supergraph.function_by_name("id").unwrap();
        let callee_facts = Facts::from_facts([Fact::new(fx.n.clone(), CmpOp::Eq, Expr::constant(1))]);
        let back = exit_to_return_site(&fx.supergraph, &callee_facts, callee.exit, fx.call).unwrap();
        assert!(!back.iter().any(|fact| fact.mentions(&fx.n)));
    }

    #[test]
    fn test_exit_kills_stale_facts_on_the_result() {
        let fx = fixture();
        let callee = fx.supergraph.function_by_name("id").unwrap();
        let at_exit = Facts::from_facts([
            Fact::new(fx.y.clone(), CmpOp::Gt, Expr::constant(100)),
            Fact::new(fx.z.clone(), CmpOp::Ne, Expr::constant(0)),
        ]);
        let back = exit_to_return_site(&fx.supergraph, &at_exit, callee.exit, fx.call).unwrap();
        assert!(!back.has(&fx.y, CmpOp::Gt, &Expr::constant(100)));
        assert!(back.has(&fx.z, CmpOp::Ne, &Expr::constant(0)));
    }

    /// main(): `set(&k)`; set(p) may write through p
    #[test]
    fn test_address_taken_argument_loses_its_facts() {
        let mut builder = SupergraphBuilder::new();
        let main = builder.add_function("main", None);
        let callee = builder.add_function("set", None);
        let k = builder.add_local(main, "k", TypeKind::Integer);
        let other = builder.add_local(main, "other", TypeKind::Integer);
        builder.add_param(callee, "p", TypeKind::Pointer);
        let (entry, exit) = (builder.entry(callee), builder.exit(callee));
        builder.edge(entry, exit);
        let (call, _) = builder.add_call(
            main,
            Statement::call(None, "set", vec![Expr::addr_of(k.clone())]),
            callee,
            None,
        );
        let supergraph = builder.build().unwrap();

        let caller_facts = Facts::from_facts([
            Fact::new(k.clone(), CmpOp::Eq, Expr::constant(1)),
            Fact::new(other.clone(), CmpOp::Eq, Expr::constant(2)),
        ]);
        let at_entry = call_to_start(&supergraph, &caller_facts, call, entry).unwrap();
        assert!(!at_entry.iter().any(|fact| fact.mentions(&k)));
        assert!(at_entry.has(&other, CmpOp::Eq, &Expr::constant(2)));

        let back = exit_to_return_site(&supergraph, &caller_facts, exit, call).unwrap();
        assert!(!back.iter().any(|fact| fact.mentions(&k)));
        assert!(back.has(&other, CmpOp::Eq, &Expr::constant(2)));
    }

    #[test]
    fn test_recursive_call_does_not_carry_own_locals() {
        let mut builder = SupergraphBuilder::new();
        let f = builder.add_function("f", None);
        let local = builder.add_local(f, "depth", TypeKind::Integer);
        let (entry, exit) = (builder.entry(f), builder.exit(f));
        let (call, ret) = builder.add_call(f, Statement::call(None, "f", vec![]), f, None);
        builder.edge(entry, call);
        builder.edge(ret, exit);
        let supergraph = builder.build().unwrap();

        let facts = Facts::from_facts([Fact::new(local.clone(), CmpOp::Eq, Expr::constant(3))]);
        let at_entry = call_to_start(&supergraph, &facts, call, entry).unwrap();
        assert!(at_entry.is_empty());
    }
}
