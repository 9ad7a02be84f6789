#![forbid(unsafe_code)]

//! Scope arena: nested reactive data objects with owned effects.
//!
//! A scope is a [`ReactiveObject`] plus a parent link. Name resolution walks
//! from a scope up to the root; the first scope that owns the name wins.
//! Effects are owned by exactly one scope and stop when it is disposed.
//!
//! # Invariants
//!
//! 1. Disposal is recursive and idempotent; a second dispose stops nothing.
//! 2. An effect handed to a disposed scope is stopped immediately.
//! 3. Data of a disposed scope stays readable, so late reads resolve instead
//!    of failing. Nothing reactive survives disposal though.

use alpen_dom::NodeId;

use crate::effect::Effect;
use crate::value::{ReactiveObject, Value};

/// Identifier of a scope inside a [`ScopeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

#[derive(Debug)]
struct ScopeSlot {
    parent: Option<ScopeId>,
    owner: Option<NodeId>,
    data: ReactiveObject,
    children: Vec<ScopeId>,
    effects: Vec<Effect>,
    alive: bool,
}

/// Owner of every scope created by a runtime.
#[derive(Debug, Default)]
pub struct ScopeArena {
    slots: Vec<ScopeSlot>,
}

impl ScopeArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope holding `data`, nested under `parent`.
    pub fn create(
        &mut self,
        parent: Option<ScopeId>,
        owner: Option<NodeId>,
        data: ReactiveObject,
    ) -> ScopeId {
        let id = ScopeId(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        self.slots.push(ScopeSlot {
            parent,
            owner,
            data,
            children: Vec::new(),
            effects: Vec::new(),
            alive: true,
        });
        if let Some(slot) = parent.and_then(|p| self.slots.get_mut(p.index())) {
            slot.children.push(id);
        }
        id
    }

    fn slot(&self, id: ScopeId) -> Option<&ScopeSlot> {
        self.slots.get(id.index())
    }

    #[must_use]
    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.slot(id).and_then(|s| s.parent)
    }

    /// Node whose directive created the scope.
    #[must_use]
    pub fn owner(&self, id: ScopeId) -> Option<NodeId> {
        self.slot(id).and_then(|s| s.owner)
    }

    #[must_use]
    pub fn data(&self, id: ScopeId) -> Option<ReactiveObject> {
        self.slot(id).map(|s| s.data.clone())
    }

    #[must_use]
    pub fn is_alive(&self, id: ScopeId) -> bool {
        self.slot(id).is_some_and(|s| s.alive)
    }

    /// Number of scopes not yet disposed.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.alive).count()
    }

    /// Number of effects currently owned by `id`.
    #[must_use]
    pub fn effect_count(&self, id: ScopeId) -> usize {
        self.slot(id).map_or(0, |s| s.effects.len())
    }

    /// Data objects from `id` outward to the root.
    #[must_use]
    pub fn chain(&self, id: ScopeId) -> Vec<ReactiveObject> {
        let mut out = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(slot) = self.slot(current) else {
                break;
            };
            out.push(slot.data.clone());
            cursor = slot.parent;
        }
        out
    }

    /// Resolve `name` against the chain. See [`resolve`].
    #[must_use]
    pub fn lookup(&self, id: ScopeId, name: &str) -> Option<Value> {
        resolve(&self.chain(id), name)
    }

    /// Write `name` into the nearest scope that owns it, or into `id` itself
    /// when no scope does. Returns `false` for an unknown scope.
    pub fn assign(&self, id: ScopeId, name: &str, value: Value) -> bool {
        write(&self.chain(id), name, value)
    }

    /// Define `name` on `id` itself, shadowing outer scopes.
    pub fn bind(&self, id: ScopeId, name: &str, value: Value) {
        if let Some(slot) = self.slot(id) {
            slot.data.set(name, value);
        }
    }

    /// Hand `effect` to `id`. A dead or unknown scope stops it at once.
    pub fn own(&mut self, id: ScopeId, effect: Effect) {
        match self.slots.get_mut(id.index()) {
            Some(slot) if slot.alive => slot.effects.push(effect),
            _ => effect.stop(),
        }
    }

    /// Dispose `id` and its descendants, stopping their effects.
    ///
    /// Returns the number of effects stopped; zero when already disposed.
    pub fn dispose(&mut self, id: ScopeId) -> usize {
        let mut stack = vec![id];
        let mut stopped = Vec::new();
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index()) else {
                continue;
            };
            if !slot.alive {
                continue;
            }
            slot.alive = false;
            stopped.append(&mut slot.effects);
            stack.extend(slot.children.iter().copied());
        }
        for effect in &stopped {
            effect.stop();
        }
        stopped.len()
    }
}

/// Resolve `name` against a chain from [`ScopeArena::chain`]. Membership
/// checks are tracked, so a name added later to a nearer scope re-triggers
/// the reader.
#[must_use]
pub fn resolve(chain: &[ReactiveObject], name: &str) -> Option<Value> {
    chain
        .iter()
        .find(|data| data.contains_key(name))
        .and_then(|data| data.get(name))
}

/// Write `name` into the first object of `chain` that owns it, falling back
/// to the innermost one. Returns `false` for an empty chain.
pub fn write(chain: &[ReactiveObject], name: &str, value: Value) -> bool {
    let Some(nearest) = chain.first() else {
        return false;
    };
    let target = chain
        .iter()
        .find(|data| data.has_own(name))
        .unwrap_or(nearest);
    target.set(name, value);
    true
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn arena_with_chain() -> (ScopeArena, ScopeId, ScopeId) {
        let mut arena = ScopeArena::new();
        let root = arena.create(
            None,
            None,
            ReactiveObject::from_entries([("shared", Value::from("outer")), ("count", Value::from(1))]),
        );
        let child = arena.create(
            Some(root),
            None,
            ReactiveObject::from_entries([("shared", Value::from("inner"))]),
        );
        (arena, root, child)
    }

    #[test]
    fn lookup_prefers_nearest_scope() {
        let (arena, root, child) = arena_with_chain();
        assert_eq!(arena.lookup(child, "shared"), Some(Value::from("inner")));
        assert_eq!(arena.lookup(root, "shared"), Some(Value::from("outer")));
        assert_eq!(arena.lookup(child, "count"), Some(Value::from(1)));
        assert_eq!(arena.lookup(child, "missing"), None);
    }

    #[test]
    fn assign_writes_through_to_owner() {
        let (arena, root, child) = arena_with_chain();
        assert!(arena.assign(child, "count", Value::from(5)));
        assert_eq!(arena.data(root).and_then(|d| d.peek("count")), Some(Value::from(5)));
        assert!(!arena.data(child).is_some_and(|d| d.has_own("count")));

        assert!(arena.assign(child, "fresh", Value::Bool(true)));
        assert!(arena.data(child).is_some_and(|d| d.has_own("fresh")));
    }

    #[test]
    fn dispose_is_recursive_and_idempotent() {
        let (mut arena, root, child) = arena_with_chain();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let data = arena.data(root).unwrap_or_default();
        let d = data.clone();
        let effect = Effect::new(move || {
            let _ = d.get("count");
            h.set(h.get() + 1);
        });
        arena.own(child, effect.clone());
        assert_eq!(arena.effect_count(child), 1);

        assert_eq!(arena.dispose(root), 1);
        assert!(!arena.is_alive(root));
        assert!(!arena.is_alive(child));
        assert!(!effect.is_active());
        assert_eq!(arena.dispose(root), 0);
        assert_eq!(arena.live_count(), 0);

        data.set("count", Value::from(9));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn owning_into_dead_scope_stops_effect() {
        let (mut arena, _root, child) = arena_with_chain();
        arena.dispose(child);
        let effect = Effect::new(|| {});
        arena.own(child, effect.clone());
        assert!(!effect.is_active());
        assert_eq!(arena.effect_count(child), 0);
    }

    #[test]
    fn late_definition_in_nearer_scope_retriggers() {
        let (arena, _root, child) = arena_with_chain();
        let arena = Rc::new(arena);
        let seen = Rc::new(std::cell::RefCell::new(None));
        let a = Rc::clone(&arena);
        let s = Rc::clone(&seen);
        let _e = Effect::new(move || *s.borrow_mut() = a.lookup(child, "count"));
        assert_eq!(*seen.borrow(), Some(Value::from(1)));

        arena.bind(child, "count", Value::from(7));
        assert_eq!(*seen.borrow(), Some(Value::from(7)));
    }
}
