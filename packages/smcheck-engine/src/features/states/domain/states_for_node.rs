/*
 * StatesForNode
 *
 * Per-node map from equivalence class to the set of automaton states the
 * class may be in.
 *
 * # Lattice
 * - Unreachable is the solver's `None`
 * - Meet: keywise union of state sets
 * - A class missing on one side reads as the full default-state set when it
 *   is in scope at the node (a global or a class of the node's function);
 *   classes of other functions travelling through a callee are kept as-is
 */

use crate::features::checker::domain::State;
use crate::shared::models::{Expr, FunctionId};
use petgraph::graph::NodeIndex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Expressions proven equal at a node
pub type EquivClass = BTreeSet<Expr>;

/// Function owning a class; `None` for a class of globals only
pub fn class_owner(class: &EquivClass) -> Option<FunctionId> {
    class.iter().find_map(Expr::owner)
}

/// Globals and classes of `function` are in scope inside `function`
pub fn class_in_scope(class: &EquivClass, function: Option<FunctionId>) -> bool {
    match class_owner(class) {
        None => true,
        owner => owner == function,
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct StatesForNode {
    node: NodeIndex,
    map: BTreeMap<EquivClass, BTreeSet<State>>,
}

impl StatesForNode {
    pub fn new(node: NodeIndex) -> Self {
        Self {
            node,
            map: BTreeMap::new(),
        }
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EquivClass, &BTreeSet<State>)> {
        self.map.iter()
    }

    pub fn classes(&self) -> impl Iterator<Item = &EquivClass> {
        self.map.keys()
    }

    pub fn states_for_class(&self, class: &EquivClass) -> Option<&BTreeSet<State>> {
        self.map.get(class)
    }

    /// The class holding `expr` (compared in canonical form)
    pub fn class_containing(&self, expr: &Expr) -> Option<&EquivClass> {
        let expr = expr.simplify();
        self.map.keys().find(|class| class.contains(&expr))
    }

    pub fn states_for_expr(&self, expr: &Expr) -> Option<&BTreeSet<State>> {
        let class = self.class_containing(expr)?;
        self.map.get(class)
    }

    pub fn set_states(&mut self, class: EquivClass, states: BTreeSet<State>) {
        self.map.insert(class, states);
    }

    pub fn add_states(&mut self, class: EquivClass, states: impl IntoIterator<Item = State>) {
        self.map.entry(class).or_default().extend(states);
    }

    pub fn remove_class(&mut self, class: &EquivClass) -> Option<BTreeSet<State>> {
        self.map.remove(class)
    }

    /// Same classes, with one class narrowed to a single state
    pub fn restricted_to(&self, class: &EquivClass, state: &State) -> Self {
        let mut restricted = self.clone();
        restricted
            .map
            .insert(class.clone(), BTreeSet::from([state.clone()]));
        restricted
    }

    /// True when every class holds exactly one state
    pub fn is_unambiguous(&self) -> bool {
        self.map.values().all(|states| states.len() <= 1)
    }

    /// Keywise union
    pub fn meet(
        &self,
        other: &StatesForNode,
        defaults: &BTreeSet<State>,
        scope: Option<FunctionId>,
    ) -> StatesForNode {
        let mut merged = self.clone();
        for (class, states) in &other.map {
            match merged.map.get_mut(class) {
                Some(existing) => existing.extend(states.iter().cloned()),
                None => {
                    let mut states = states.clone();
                    if class_in_scope(class, scope) {
                        states.extend(defaults.iter().cloned());
                    }
                    merged.map.insert(class.clone(), states);
                }
            }
        }
        for (class, states) in merged.map.iter_mut() {
            if !other.map.contains_key(class) && class_in_scope(class, scope) {
                states.extend(defaults.iter().cloned());
            }
        }
        merged
    }

    /// Dominance test used when wiring exploded-graph edges
    pub fn is_subset_of(
        &self,
        other: &StatesForNode,
        defaults: &BTreeSet<State>,
        scope: Option<FunctionId>,
    ) -> bool {
        self.map.iter().all(|(class, states)| match other.map.get(class) {
            Some(theirs) => states.is_subset(theirs),
            None if class_in_scope(class, scope) => states.is_subset(defaults),
            None => states.is_empty(),
        })
    }

    /// True when, class by class, the two values share at least one state
    pub fn is_compatible_with(&self, other: &StatesForNode) -> bool {
        self.map.iter().all(|(class, states)| match other.map.get(class) {
            Some(theirs) => !states.is_disjoint(theirs),
            None => true,
        })
    }
}

impl fmt::Debug for StatesForNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.node, self)
    }
}

impl fmt::Display for StatesForNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .map
            .iter()
            .map(|(class, states)| {
                let class: Vec<String> = class.iter().map(|expr| expr.to_string()).collect();
                let states: Vec<String> = states.iter().map(|state| state.to_string()).collect();
                format!("{{{}}}: {{{}}}", class.join(", "), states.join(", "))
            })
            .collect();
        write!(f, "{{{}}}", entries.join(", "))
    }
}
