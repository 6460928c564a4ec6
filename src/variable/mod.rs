//! Lazy variable tree over backend-issued variables references.
//!
//! The only materialized structure is a flat map from [`VarRef`] to its
//! resolved children; the visible tree is a pure function of the expanded
//! set and that map, so invalidation never has to walk anything. Cycles in
//! the debuggee's object graph are harmless here: a node is addressed by
//! reference, and re-expanding a reference reuses its cache entry.
//!
//! References die wholesale on every resume. That rule is enforced
//! centrally by [`VariableTree::invalidate_all`], which bumps the stop
//! [`Generation`]; responses tagged with an older generation must be
//! dropped by the caller before they ever reach this map.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::backend::protocol::{VarRef, Variable};

/// Stop generation counter: incremented on every invalidation, carried by
/// every outstanding request, checked on completion.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct VariableTree {
    generation: Generation,
    children: IndexMap<VarRef, Vec<Variable>>,
    expanded: IndexSet<VarRef>,
    in_flight: IndexSet<VarRef>,
}

impl VariableTree {
    /// Generation of the current stop.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Resolved children of `reference`, if a fetch completed within the
    /// current stop.
    pub fn children(&self, reference: VarRef) -> Option<&[Variable]> {
        self.children.get(&reference).map(Vec::as_slice)
    }

    pub fn is_expanded(&self, reference: VarRef) -> bool {
        self.expanded.contains(&reference)
    }

    /// Whether expanding `reference` requires a backend call: nothing
    /// cached and no fetch already on the wire.
    pub(crate) fn needs_fetch(&self, reference: VarRef) -> bool {
        !self.children.contains_key(&reference) && !self.in_flight.contains(&reference)
    }

    pub(crate) fn mark_expanded(&mut self, reference: VarRef) {
        self.expanded.insert(reference);
    }

    /// Collapsing is pure view state; the cache entry stays so re-expanding
    /// is free.
    pub(crate) fn collapse(&mut self, reference: VarRef) {
        self.expanded.shift_remove(&reference);
    }

    pub(crate) fn begin_fetch(&mut self, reference: VarRef) {
        self.in_flight.insert(reference);
    }

    pub(crate) fn resolve(&mut self, reference: VarRef, variables: Vec<Variable>) {
        self.in_flight.swap_remove(&reference);
        self.children.insert(reference, variables);
    }

    /// A fetch failed; allow a later `expand` to retry.
    pub(crate) fn abort_fetch(&mut self, reference: VarRef) {
        self.in_flight.swap_remove(&reference);
    }

    /// Drop every reference of the current stop and start a new generation.
    pub(crate) fn invalidate_all(&mut self) -> Generation {
        self.generation.0 += 1;
        self.children.clear();
        self.expanded.clear();
        self.in_flight.clear();
        self.generation
    }
}
