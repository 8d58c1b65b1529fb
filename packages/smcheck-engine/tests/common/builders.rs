//! Test data builders
//!
//! `ProgramBuilder` wraps `SupergraphBuilder` so every statement gets a
//! `test.c` line number and straight-line code can be chained in one call.

use petgraph::graph::NodeIndex;
use smcheck_engine::shared::models::{
    CmpOp, Expr, FunctionId, Location, Statement, Supergraph, SupergraphBuilder, TypeKind,
};

pub const FILE: &str = "test.c";

pub fn line(line: u32) -> Location {
    Location::new(FILE, line, 3)
}

pub struct ProgramBuilder {
    inner: SupergraphBuilder,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self {
            inner: SupergraphBuilder::new(),
        }
    }

    /// Function declared at `start`, closing brace at `end`
    pub fn function(&mut self, name: &str, start: u32, end: u32) -> FunctionId {
        let id = self.inner.add_function(name, Some(Location::new(FILE, start, 1)));
        self.inner.set_end_location(id, Location::new(FILE, end, 1));
        id
    }

    pub fn pointer(&mut self, function: FunctionId, name: &str) -> Expr {
        self.inner.add_local(function, name, TypeKind::Pointer)
    }

    pub fn int(&mut self, function: FunctionId, name: &str) -> Expr {
        self.inner.add_local(function, name, TypeKind::Integer)
    }

    pub fn pointer_param(&mut self, function: FunctionId, name: &str) -> Expr {
        self.inner.add_param(function, name, TypeKind::Pointer)
    }

    pub fn int_param(&mut self, function: FunctionId, name: &str) -> Expr {
        self.inner.add_param(function, name, TypeKind::Integer)
    }

    pub fn stmt(&mut self, function: FunctionId, at: u32, stmt: Statement) -> NodeIndex {
        self.inner.add_stmt(function, stmt, Some(line(at)))
    }

    /// `callee(args...)` with no result, to an unanalyzed function
    pub fn marker(&mut self, function: FunctionId, at: u32, callee: &str) -> NodeIndex {
        self.stmt(function, at, Statement::call(None, callee, vec![]))
    }

    /// Split call to an analyzed function; (call node, return-site node)
    pub fn call(
        &mut self,
        caller: FunctionId,
        at: u32,
        stmt: Statement,
        callee: FunctionId,
    ) -> (NodeIndex, NodeIndex) {
        self.inner.add_call(caller, stmt, callee, Some(line(at)))
    }

    pub fn entry(&self, function: FunctionId) -> NodeIndex {
        self.inner.entry(function)
    }

    pub fn exit(&self, function: FunctionId) -> NodeIndex {
        self.inner.exit(function)
    }

    pub fn edge(&mut self, src: NodeIndex, dst: NodeIndex) {
        self.inner.edge(src, dst);
    }

    /// Consecutive edges through `nodes`
    pub fn chain(&mut self, nodes: &[NodeIndex]) {
        for pair in nodes.windows(2) {
            self.inner.edge(pair[0], pair[1]);
        }
    }

    pub fn branch(&mut self, cond: NodeIndex, on_true: NodeIndex, on_false: NodeIndex) {
        self.inner.branch(cond, on_true, on_false);
    }

    pub fn entry_point(&mut self, function: FunctionId) {
        self.inner.mark_entry_point(function);
    }

    pub fn build(self) -> Supergraph {
        self.inner.build().expect("test supergraph is well formed")
    }
}

/// `p = malloc(); if (p == 0) ... else ...` prologue shared by most
/// scenarios. Returns (alloc, check) nodes, already chained from the
/// function entry.
pub fn malloc_and_check(
    program: &mut ProgramBuilder,
    function: FunctionId,
    ptr: &Expr,
    at: u32,
) -> (NodeIndex, NodeIndex) {
    let alloc = program.stmt(
        function,
        at,
        Statement::call(Some(ptr.clone()), "malloc", vec![Expr::constant(4096)]),
    );
    let check = program.stmt(
        function,
        at + 1,
        Statement::cond(ptr.clone(), CmpOp::Eq, Expr::null()),
    );
    let entry = program.entry(function);
    program.chain(&[entry, alloc, check]);
    (alloc, check)
}
