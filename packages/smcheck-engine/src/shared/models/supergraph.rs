/*
 * Supergraph
 *
 * Interprocedural control-flow graph spanning every analyzed function.
 *
 * # Representation
 * - Arena graph (petgraph `DiGraph`) addressed by stable node/edge indices
 * - One synthetic fake-entry root with fake-entry edges into every
 *   externally reachable function
 * - Calls to analyzed functions are split into a call node and a return-site
 *   node joined by call-to-start / exit-to-return-site / call-to-return-site
 *   edges; calls to functions without a body stay plain statements
 *
 * Nodes and edges are immutable once `SupergraphBuilder::build` returns.
 */

use super::expression::{Expr, FunctionId, TypeKind, Variable};
use super::location::Location;
use super::statement::Statement;
use crate::errors::{EngineError, EngineResult};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    FakeEntry,
    Entry,
    Exit,
    Stmt,
    /// Call half of a split call to an analyzed function
    Call,
    /// Return half of a split call to an analyzed function
    ReturnSite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupergraphNode {
    pub function: Option<FunctionId>,
    pub kind: NodeKind,
    pub stmt: Option<Statement>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Intraprocedural,
    /// Same-function shortcut beside an analyzed callee
    CallToReturnSite,
    CallToStart,
    ExitToReturnSite,
    FakeEntry,
}

impl EdgeKind {
    pub fn is_interprocedural(self) -> bool {
        matches!(
            self,
            EdgeKind::CallToStart | EdgeKind::ExitToReturnSite | EdgeKind::FakeEntry
        )
    }
}

/// Inclusive switch case label range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseLabel {
    pub low: i64,
    pub high: i64,
}

impl CaseLabel {
    pub fn value(value: i64) -> Self {
        Self {
            low: value,
            high: value,
        }
    }

    pub fn range(low: i64, high: i64) -> Self {
        Self { low, high }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupergraphEdge {
    pub kind: EdgeKind,
    pub true_value: bool,
    pub false_value: bool,
    /// Case labels bound to a switch edge; empty for the default edge
    pub cases: Vec<CaseLabel>,
    /// Caller's call node, for exit-to-return-site edges
    pub call_site: Option<NodeIndex>,
}

impl SupergraphEdge {
    pub fn new(kind: EdgeKind) -> Self {
        Self {
            kind,
            true_value: false,
            false_value: false,
            cases: Vec::new(),
            call_site: None,
        }
    }

    pub fn intraprocedural() -> Self {
        Self::new(EdgeKind::Intraprocedural)
    }

    pub fn branch(value: bool) -> Self {
        Self {
            true_value: value,
            false_value: !value,
            ..Self::new(EdgeKind::Intraprocedural)
        }
    }

    /// `Some(true)` / `Some(false)` on conditional edges
    pub fn branch_value(&self) -> Option<bool> {
        match (self.true_value, self.false_value) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub id: FunctionId,
    pub name: String,
    pub params: Vec<Variable>,
    pub locals: Vec<Variable>,
    pub entry: NodeIndex,
    pub exit: NodeIndex,
    pub return_value: Option<Expr>,
    pub location: Option<Location>,
    pub end_location: Option<Location>,
}

impl FunctionInfo {
    pub fn param_exprs(&self) -> Vec<Expr> {
        self.params.iter().cloned().map(Expr::Var).collect()
    }

    pub fn owns(&self, expr: &Expr) -> bool {
        expr.is_scoped_to(self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supergraph {
    graph: DiGraph<SupergraphNode, SupergraphEdge>,
    functions: Vec<FunctionInfo>,
    globals: Vec<Variable>,
    fake_entry: NodeIndex,
}

impl Supergraph {
    pub fn graph(&self) -> &DiGraph<SupergraphNode, SupergraphEdge> {
        &self.graph
    }

    pub fn node(&self, node: NodeIndex) -> &SupergraphNode {
        &self.graph[node]
    }

    pub fn edge(&self, edge: EdgeIndex) -> &SupergraphEdge {
        &self.graph[edge]
    }

    pub fn endpoints(&self, edge: EdgeIndex) -> (NodeIndex, NodeIndex) {
        let raw = &self.graph.raw_edges()[edge.index()];
        (raw.source(), raw.target())
    }

    pub fn source(&self, edge: EdgeIndex) -> NodeIndex {
        self.endpoints(edge).0
    }

    pub fn target(&self, edge: EdgeIndex) -> NodeIndex {
        self.endpoints(edge).1
    }

    pub fn out_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| edge.id())
            .collect();
        edges.sort();
        edges
    }

    pub fn in_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| edge.id())
            .collect();
        edges.sort();
        edges
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn fake_entry(&self) -> NodeIndex {
        self.fake_entry
    }

    pub fn functions(&self) -> &[FunctionInfo] {
        &self.functions
    }

    pub fn function(&self, id: FunctionId) -> &FunctionInfo {
        &self.functions[id.0 as usize]
    }

    pub fn function_of(&self, node: NodeIndex) -> Option<&FunctionInfo> {
        self.graph[node].function.map(|id| self.function(id))
    }

    pub fn function_by_name(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn globals(&self) -> &[Variable] {
        &self.globals
    }

    /// Source location of a node, falling back to the function's start/end
    /// location for entry/exit nodes
    pub fn location_of(&self, node: NodeIndex) -> Option<&Location> {
        let data = &self.graph[node];
        if let Some(location) = &data.location {
            return Some(location);
        }
        let function = self.function_of(node)?;
        match data.kind {
            NodeKind::Entry => function.location.as_ref(),
            NodeKind::Exit => function
                .end_location
                .as_ref()
                .or(function.location.as_ref()),
            _ => None,
        }
    }

    /// (result, args) of the call statement at a call node
    pub fn call_at(&self, node: NodeIndex) -> Option<(Option<&Expr>, &[Expr])> {
        match self.graph[node].stmt.as_ref()? {
            Statement::Call { lhs, args, .. } => Some((lhs.as_ref(), args.as_slice())),
            _ => None,
        }
    }

    /// First node whose statement calls `callee`, in index order
    pub fn find_call_of(&self, callee: &str) -> Option<NodeIndex> {
        self.graph.node_indices().find(|&node| {
            self.graph[node]
                .stmt
                .as_ref()
                .and_then(Statement::callee)
                .map_or(false, |name| name == callee)
        })
    }

    /// Parameter, local or global named `name` visible in `function`
    pub fn find_var(&self, function: &str, name: &str) -> Option<Expr> {
        let info = self.function_by_name(function)?;
        info.params
            .iter()
            .chain(info.locals.iter())
            .chain(self.globals.iter())
            .find(|var| var.name == name)
            .cloned()
            .map(Expr::Var)
    }
}

impl fmt::Display for Supergraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.graph.node_indices() {
            let data = &self.graph[node];
            let function = self
                .function_of(node)
                .map_or("<root>", |info| info.name.as_str());
            match &data.stmt {
                Some(stmt) => writeln!(f, "{:?} [{}] {:?}: {}", node, function, data.kind, stmt)?,
                None => writeln!(f, "{:?} [{}] {:?}", node, function, data.kind)?,
            }
        }
        Ok(())
    }
}

/// Incremental construction of a [`Supergraph`]
///
/// # Example
/// ```ignore
/// let mut builder = SupergraphBuilder::new();
/// let f = builder.add_function("main", None);
/// let p = builder.add_local(f, "p", TypeKind::Pointer);
/// let n = builder.add_stmt(f, Statement::call(Some(p), "malloc", vec![]), None);
/// builder.edge(builder.entry(f), n);
/// builder.edge(n, builder.exit(f));
/// let supergraph = builder.build()?;
/// ```
pub struct SupergraphBuilder {
    graph: DiGraph<SupergraphNode, SupergraphEdge>,
    functions: Vec<FunctionInfo>,
    globals: Vec<Variable>,
    fake_entry: NodeIndex,
    entry_points: Vec<FunctionId>,
}

impl SupergraphBuilder {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let fake_entry = graph.add_node(SupergraphNode {
            function: None,
            kind: NodeKind::FakeEntry,
            stmt: None,
            location: None,
        });
        Self {
            graph,
            functions: Vec::new(),
            globals: Vec::new(),
            fake_entry,
            entry_points: Vec::new(),
        }
    }

    pub fn add_global(&mut self, name: &str, ty: TypeKind) -> Expr {
        let var = Variable::global(name, ty);
        self.globals.push(var.clone());
        Expr::Var(var)
    }

    /// Adds a function with its (empty) entry and exit nodes
    pub fn add_function(&mut self, name: &str, location: Option<Location>) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        let entry = self.add_node(id, NodeKind::Entry, None, None);
        let exit = self.add_node(id, NodeKind::Exit, None, None);
        self.functions.push(FunctionInfo {
            id,
            name: name.to_string(),
            params: Vec::new(),
            locals: Vec::new(),
            entry,
            exit,
            return_value: None,
            location,
            end_location: None,
        });
        id
    }

    pub fn add_param(&mut self, function: FunctionId, name: &str, ty: TypeKind) -> Expr {
        let var = Variable::param(name, function, ty);
        self.functions[function.0 as usize].params.push(var.clone());
        Expr::Var(var)
    }

    pub fn add_local(&mut self, function: FunctionId, name: &str, ty: TypeKind) -> Expr {
        let var = Variable::local(name, function, ty);
        self.functions[function.0 as usize].locals.push(var.clone());
        Expr::Var(var)
    }

    pub fn add_temporary(&mut self, function: FunctionId, name: &str, ty: TypeKind) -> Expr {
        let var = Variable::temporary(name, function, ty);
        self.functions[function.0 as usize].locals.push(var.clone());
        Expr::Ssa { var, version: 1 }
    }

    pub fn set_end_location(&mut self, function: FunctionId, location: Location) {
        self.functions[function.0 as usize].end_location = Some(location);
    }

    pub fn entry(&self, function: FunctionId) -> NodeIndex {
        self.functions[function.0 as usize].entry
    }

    pub fn exit(&self, function: FunctionId) -> NodeIndex {
        self.functions[function.0 as usize].exit
    }

    pub fn add_node(
        &mut self,
        function: FunctionId,
        kind: NodeKind,
        stmt: Option<Statement>,
        location: Option<Location>,
    ) -> NodeIndex {
        self.graph.add_node(SupergraphNode {
            function: Some(function),
            kind,
            stmt,
            location,
        })
    }

    /// Adds a statement node; a `return <value>` also records the function's return value
    pub fn add_stmt(
        &mut self,
        function: FunctionId,
        stmt: Statement,
        location: Option<Location>,
    ) -> NodeIndex {
        if let Statement::Return { value: Some(value) } = &stmt {
            self.functions[function.0 as usize].return_value = Some(value.simplify());
        }
        self.add_node(function, NodeKind::Stmt, Some(stmt), location)
    }

    pub fn edge(&mut self, src: NodeIndex, dst: NodeIndex) -> EdgeIndex {
        self.graph
            .add_edge(src, dst, SupergraphEdge::intraprocedural())
    }

    /// Adds the true and false out-edges of a conditional node
    pub fn branch(
        &mut self,
        cond: NodeIndex,
        on_true: NodeIndex,
        on_false: NodeIndex,
    ) -> (EdgeIndex, EdgeIndex) {
        let t = self.graph.add_edge(cond, on_true, SupergraphEdge::branch(true));
        let f = self.graph.add_edge(cond, on_false, SupergraphEdge::branch(false));
        (t, f)
    }

    /// Switch out-edge; empty `cases` is the default edge
    pub fn switch_edge(&mut self, src: NodeIndex, dst: NodeIndex, cases: Vec<CaseLabel>) -> EdgeIndex {
        let edge = SupergraphEdge {
            cases,
            ..SupergraphEdge::intraprocedural()
        };
        self.graph.add_edge(src, dst, edge)
    }

    /// Adds a split call to an analyzed callee and returns (call node, return-site node)
    pub fn add_call(
        &mut self,
        caller: FunctionId,
        stmt: Statement,
        callee: FunctionId,
        location: Option<Location>,
    ) -> (NodeIndex, NodeIndex) {
        let call = self.add_node(caller, NodeKind::Call, Some(stmt), location.clone());
        let ret = self.add_node(caller, NodeKind::ReturnSite, None, location);
        let callee_entry = self.entry(callee);
        let callee_exit = self.exit(callee);
        self.graph
            .add_edge(call, callee_entry, SupergraphEdge::new(EdgeKind::CallToStart));
        self.graph
            .add_edge(call, ret, SupergraphEdge::new(EdgeKind::CallToReturnSite));
        let exit_edge = SupergraphEdge {
            call_site: Some(call),
            ..SupergraphEdge::new(EdgeKind::ExitToReturnSite)
        };
        self.graph.add_edge(callee_exit, ret, exit_edge);
        (call, ret)
    }

    /// Marks a function as externally reachable from the fake entry.
    /// When no function is marked, every function is.
    pub fn mark_entry_point(&mut self, function: FunctionId) {
        if !self.entry_points.contains(&function) {
            self.entry_points.push(function);
        }
    }

    pub fn build(mut self) -> EngineResult<Supergraph> {
        let entry_points: Vec<FunctionId> = if self.entry_points.is_empty() {
            self.functions.iter().map(|function| function.id).collect()
        } else {
            self.entry_points.clone()
        };
        for id in entry_points {
            let entry = self.functions[id.0 as usize].entry;
            self.graph
                .add_edge(self.fake_entry, entry, SupergraphEdge::new(EdgeKind::FakeEntry));
        }

        let supergraph = Supergraph {
            graph: self.graph,
            functions: self.functions,
            globals: self.globals,
            fake_entry: self.fake_entry,
        };
        validate_call_edges(&supergraph)?;
        Ok(supergraph)
    }
}

impl Default for SupergraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Every call node needs exactly one call-to-start edge and one matching
/// exit-to-return-site edge
fn validate_call_edges(supergraph: &Supergraph) -> EngineResult<()> {
    for node in supergraph.node_indices() {
        if supergraph.node(node).kind != NodeKind::Call {
            continue;
        }
        if supergraph.call_at(node).is_none() {
            return Err(EngineError::InvalidSupergraph(format!(
                "call node {:?} has no call statement",
                node
            )));
        }
        let starts = supergraph
            .out_edges(node)
            .into_iter()
            .filter(|&edge| supergraph.edge(edge).kind == EdgeKind::CallToStart)
            .count();
        let returns = supergraph
            .edge_indices()
            .filter(|&edge| {
                let data = supergraph.edge(edge);
                data.kind == EdgeKind::ExitToReturnSite && data.call_site == Some(node)
            })
            .count();
        if starts != 1 || returns != 1 {
            return Err(EngineError::InvalidSupergraph(format!(
                "call node {:?} has {} call-to-start and {} exit-to-return-site edges",
                node, starts, returns
            )));
        }
    }
    Ok(())
}
