#![forbid(unsafe_code)]

//! The runtime handle: document, scopes, directive registry and listeners.
//!
//! A [`Runtime`] is a cheap `Rc` handle. Closures stored inside the runtime
//! (effects, tasks, evaluations) hold a [`WeakRuntime`] so the runtime can be
//! dropped while effects are still subscribed.
//!
//! # Invariants
//!
//! 1. Every scope descends from the root scope; dropping the runtime
//!    disposes the root and stops every effect.
//! 2. No internal borrow is held while an expression is evaluated, so
//!    reactive writes made by expressions can never observe a locked table.
//! 3. Listener handlers are evaluated at fire time against the node's scope
//!    chain as it is then, never against a snapshot.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Expression fails to parse | Cached as an error; every evaluation reports it |
//! | Expression throws | Reported; the directive renders nothing for that run |
//! | Handler mutates the DOM re-entrantly | Not possible: DOM writes happen in effects, after the handler returns |

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};
use alpen_dom::{Document, MarkupError, NodeId};
use alpen_expr::{Environment, Expression, ExpressionError, LocalEnvironment};
use alpen_reactive::scope::{resolve, write};
use alpen_reactive::{Effect, ReactiveObject, ScopeArena, ScopeId, Value, untracked};
use bitflags::bitflags;

use crate::config::{ConfigError, RuntimeConfig};
use crate::diagnostics;
use crate::directive::{Directive, Evaluation};
use crate::directives;
use crate::error::RuntimeError;
use crate::lifecycle::{LifecycleEvent, LifecycleHub, LifecycleSubscription};
use crate::scheduler::{Scheduler, Task, TaskId};

bitflags! {
    /// Event listener modifiers (`@click.prevent.once`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ListenerModifiers: u8 {
        /// Mark the event's default action as prevented.
        const PREVENT = 1 << 0;
        /// Stop bubbling after this node.
        const STOP = 1 << 1;
        /// Remove the listener after its first call.
        const ONCE = 1 << 2;
        /// Only fire when the node itself is the target.
        const SELF = 1 << 3;
    }
}

impl ListenerModifiers {
    /// Parse modifier names; unknown ones are ignored.
    #[must_use]
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        names.iter().fold(Self::empty(), |acc, name| {
            acc | match name.as_ref() {
                "prevent" => Self::PREVENT,
                "stop" => Self::STOP,
                "once" => Self::ONCE,
                "self" => Self::SELF,
                _ => Self::empty(),
            }
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Listener {
    id: u64,
    event: String,
    modifiers: ListenerModifiers,
    expression: String,
}

pub(crate) type Cleanup = Box<dyn FnOnce(&Runtime)>;

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) document: RefCell<Document>,
    pub(crate) scheduler: Scheduler,
    pub(crate) directives: RefCell<AHashMap<String, Rc<dyn Directive>>>,
    pub(crate) scopes: RefCell<ScopeArena>,
    pub(crate) node_scopes: RefCell<AHashMap<NodeId, ScopeId>>,
    pub(crate) node_effects: RefCell<AHashMap<NodeId, Vec<Effect>>>,
    /// (node, raw attribute name) pairs already handed to a directive.
    pub(crate) initialized: RefCell<AHashSet<(NodeId, String)>>,
    /// Roots cloned by structural directives; live observation skips them.
    pub(crate) managed: RefCell<AHashSet<NodeId>>,
    listeners: RefCell<AHashMap<NodeId, Vec<Listener>>>,
    next_listener: Cell<u64>,
    refs: RefCell<AHashMap<ScopeId, AHashMap<String, NodeId>>>,
    /// Teardown hooks run when their node is destroyed.
    pub(crate) cleanups: RefCell<AHashMap<NodeId, Vec<Cleanup>>>,
    expressions: RefCell<AHashMap<String, Result<Expression, ExpressionError>>>,
    pub(crate) lifecycle: Rc<LifecycleHub>,
    pub(crate) root_scope: ScopeId,
    pub(crate) started: Cell<bool>,
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        let root = self.root_scope;
        self.scopes.get_mut().dispose(root);
    }
}

/// Shared handle to one page's runtime.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

/// Non-owning handle, for closures stored inside the runtime.
#[derive(Clone)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    #[must_use]
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl fmt::Debug for WeakRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRuntime")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("prefix", &self.inner.config.prefix)
            .field("started", &self.inner.started.get())
            .field("live_scopes", &self.live_scopes())
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Name resolution over a scope chain, captured at evaluation time.
struct ScopeEnv<'a> {
    scopes: &'a RefCell<ScopeArena>,
    scope: ScopeId,
}

impl ScopeEnv<'_> {
    fn chain(&self) -> Vec<ReactiveObject> {
        self.scopes.borrow().chain(self.scope)
    }
}

impl Environment for ScopeEnv<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        resolve(&self.chain(), name)
    }

    fn assign(&self, name: &str, value: Value) -> bool {
        write(&self.chain(), name, value)
    }
}

impl Runtime {
    /// A runtime with the default configuration and built-in directives.
    #[must_use]
    pub fn new() -> Self {
        Self::build(RuntimeConfig::default())
    }

    /// A runtime with `config`.
    ///
    /// Applies the scheduler and diagnostics limits to the thread's shared
    /// instances.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`RuntimeConfig::validate`].
    pub fn with_config(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RuntimeConfig) -> Self {
        let scheduler = Scheduler::global();
        scheduler.set_max_task_reruns(config.max_task_reruns);
        diagnostics::set_capacity(config.diagnostics_capacity);

        let mut scopes = ScopeArena::new();
        let root_scope = scopes.create(None, None, ReactiveObject::new());
        let runtime = Self {
            inner: Rc::new(RuntimeInner {
                config,
                document: RefCell::new(Document::new()),
                scheduler,
                directives: RefCell::new(AHashMap::new()),
                scopes: RefCell::new(scopes),
                node_scopes: RefCell::new(AHashMap::new()),
                node_effects: RefCell::new(AHashMap::new()),
                initialized: RefCell::new(AHashSet::new()),
                managed: RefCell::new(AHashSet::new()),
                listeners: RefCell::new(AHashMap::new()),
                next_listener: Cell::new(0),
                refs: RefCell::new(AHashMap::new()),
                cleanups: RefCell::new(AHashMap::new()),
                expressions: RefCell::new(AHashMap::new()),
                lifecycle: Rc::new(LifecycleHub::default()),
                root_scope,
                started: Cell::new(false),
            }),
        };
        directives::register_builtins(&runtime);
        runtime
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Borrow the document.
    ///
    /// # Panics
    ///
    /// If the document is mutably borrowed.
    #[must_use]
    pub fn document(&self) -> Ref<'_, Document> {
        self.inner.document.borrow()
    }

    /// Mutably borrow the document. Do not hold the guard across a call into
    /// the runtime.
    ///
    /// # Panics
    ///
    /// If the document is already borrowed.
    #[must_use]
    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.inner.document.borrow_mut()
    }

    /// Parse `markup` and append it to the body.
    ///
    /// # Errors
    ///
    /// [`MarkupError`] if the markup does not parse.
    pub fn mount(&self, markup: &str) -> Result<Vec<NodeId>, MarkupError> {
        let mut doc = self.document_mut();
        let body = doc.body();
        doc.append_markup(body, markup)
    }

    /// Register (or replace) the handler for directive `kind`.
    pub fn directive(&self, kind: &str, directive: impl Directive + 'static) {
        self.inner
            .directives
            .borrow_mut()
            .insert(kind.to_string(), Rc::new(directive));
    }

    #[must_use]
    pub fn has_directive(&self, kind: &str) -> bool {
        self.inner.directives.borrow().contains_key(kind)
    }

    pub(crate) fn lookup_directive(&self, kind: &str) -> Option<Rc<dyn Directive>> {
        self.inner.directives.borrow().get(kind).cloned()
    }

    /// Subscribe to [`LifecycleEvent`]s.
    pub fn on_lifecycle(&self, callback: impl Fn(LifecycleEvent) + 'static) -> LifecycleSubscription {
        self.inner.lifecycle.subscribe(callback)
    }

    // -------------------------------------------------------------------------
    // Scopes
    // -------------------------------------------------------------------------

    /// Scope that resolves names for `node`: the scope mapped to the nearest
    /// inclusive ancestor, or the root scope.
    #[must_use]
    pub fn closest_scope(&self, node: NodeId) -> ScopeId {
        let doc = self.inner.document.borrow();
        let map = self.inner.node_scopes.borrow();
        std::iter::once(node)
            .chain(doc.ancestors(node))
            .find_map(|n| map.get(&n).copied())
            .unwrap_or(self.inner.root_scope)
    }

    /// Scope mapped to exactly `node`, if any.
    #[must_use]
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.inner.node_scopes.borrow().get(&node).copied()
    }

    #[must_use]
    pub fn root_scope(&self) -> ScopeId {
        self.inner.root_scope
    }

    #[must_use]
    pub fn scope_data(&self, scope: ScopeId) -> Option<ReactiveObject> {
        self.inner.scopes.borrow().data(scope)
    }

    #[must_use]
    pub fn is_scope_alive(&self, scope: ScopeId) -> bool {
        self.inner.scopes.borrow().is_alive(scope)
    }

    /// Number of undisposed scopes, the root included.
    #[must_use]
    pub fn live_scopes(&self) -> usize {
        self.inner.scopes.borrow().live_count()
    }

    /// Create a child scope of `parent` and map `node` to it.
    pub(crate) fn create_scope(&self, parent: ScopeId, node: NodeId, data: ReactiveObject) -> ScopeId {
        let scope = self
            .inner
            .scopes
            .borrow_mut()
            .create(Some(parent), Some(node), data);
        self.inner.node_scopes.borrow_mut().insert(node, scope);
        scope
    }

    pub(crate) fn dispose_scope(&self, scope: ScopeId) -> usize {
        let stopped = self.inner.scopes.borrow_mut().dispose(scope);
        self.inner.refs.borrow_mut().remove(&scope);
        stopped
    }

    /// Mark a clone root as owned by a structural directive.
    pub(crate) fn mark_managed(&self, node: NodeId) {
        self.inner.managed.borrow_mut().insert(node);
    }

    #[must_use]
    pub fn is_managed(&self, node: NodeId) -> bool {
        self.inner.managed.borrow().contains(&node)
    }

    // -------------------------------------------------------------------------
    // Evaluation
    // -------------------------------------------------------------------------

    fn compile(&self, source: &str) -> Result<Expression, ExpressionError> {
        if let Some(cached) = self.inner.expressions.borrow().get(source) {
            return cached.clone();
        }
        let compiled = Expression::compile(source);
        self.inner
            .expressions
            .borrow_mut()
            .insert(source.to_string(), compiled.clone());
        compiled
    }

    /// Number of distinct expression strings compiled so far.
    #[must_use]
    pub fn cached_expressions(&self) -> usize {
        self.inner.expressions.borrow().len()
    }

    /// Evaluate `source` against `node`'s closest scope.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Expression`] on a parse or evaluation failure.
    pub fn evaluate(&self, node: NodeId, source: &str) -> Result<Value, RuntimeError> {
        self.evaluate_with(node, self.closest_scope(node), source, &[])
    }

    /// Evaluate `source` against `scope`, with read-only `locals` layered on
    /// top. `node` is only used for error attribution.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Expression`] on a parse or evaluation failure.
    pub fn evaluate_with(
        &self,
        node: NodeId,
        scope: ScopeId,
        source: &str,
        locals: &[(&str, Value)],
    ) -> Result<Value, RuntimeError> {
        let to_error = |source_err: ExpressionError| RuntimeError::Expression {
            node,
            expression: source.to_string(),
            source: source_err,
        };
        let expression = self.compile(source).map_err(to_error)?;
        let env = ScopeEnv {
            scopes: &self.inner.scopes,
            scope,
        };
        let result = if locals.is_empty() {
            expression.evaluate(&env)
        } else {
            let layered = locals
                .iter()
                .fold(LocalEnvironment::new(&env), |layer, (name, value)| {
                    layer.with(*name, value.clone())
                });
            expression.evaluate(&layered)
        };
        result.map_err(to_error)
    }

    /// Bind `source` to `node` for later evaluation.
    #[must_use]
    pub fn evaluate_later(&self, node: NodeId, source: &str) -> Evaluation {
        Evaluation::new(self.downgrade(), node, source.to_string())
    }

    // -------------------------------------------------------------------------
    // Effects
    // -------------------------------------------------------------------------

    /// A scheduler-bound effect for `node`, owned by its closest scope.
    ///
    /// `f` runs once now. When a dependency changes, the effect is queued
    /// under a stable [`TaskId`] and a flush is requested, so any number of
    /// triggers before the next flush re-run it once.
    pub fn effect(&self, node: NodeId, label: &str, f: impl Fn(&Runtime) + 'static) -> Effect {
        let scope = self.closest_scope(node);
        let weak = self.downgrade();
        let task_id = TaskId::next();
        let label: Rc<str> = Rc::from(format!("{label} on {node}"));
        let scheduler = self.inner.scheduler.clone();

        let effect = Effect::with_scheduler(
            move || {
                if let Some(runtime) = weak.upgrade() {
                    f(&runtime);
                }
            },
            move |effect| {
                let effect = effect.clone();
                scheduler.task(Task::with_id(task_id, Rc::clone(&label), move || {
                    effect.run();
                    Ok(())
                }));
                scheduler.ping_flush();
            },
        );

        self.inner.scopes.borrow_mut().own(scope, effect.clone());
        if effect.is_active() {
            let mut node_effects = self.inner.node_effects.borrow_mut();
            let effects = node_effects.entry(node).or_default();
            effects.retain(Effect::is_active);
            effects.push(effect.clone());
        }
        effect
    }

    /// Active effects registered for exactly `node`.
    #[must_use]
    pub fn effect_count(&self, node: NodeId) -> usize {
        self.inner
            .node_effects
            .borrow()
            .get(&node)
            .map_or(0, |effects| effects.iter().filter(|e| e.is_active()).count())
    }

    /// Call `callback` with the new value whenever `expression`, evaluated
    /// for `node`, changes. Nested fields count: the value is read deeply.
    ///
    /// The first evaluation only records the value.
    pub fn watch(&self, node: NodeId, expression: &str, callback: impl Fn(&Value) + 'static) -> Effect {
        let expression = expression.to_string();
        let previous: RefCell<Option<serde_json::Value>> = RefCell::new(None);
        self.effect(node, "$watch", move |runtime| {
            let value = match runtime.evaluate(node, &expression) {
                Ok(value) => value,
                Err(err) => {
                    diagnostics::report(err);
                    return;
                }
            };
            let snapshot = value.to_json();
            let changed = {
                let mut previous = previous.borrow_mut();
                let changed = previous.as_ref().is_some_and(|p| *p != snapshot);
                *previous = Some(snapshot);
                changed
            };
            if changed {
                untracked(|| callback(&value));
            }
        })
    }

    // -------------------------------------------------------------------------
    // Refs
    // -------------------------------------------------------------------------

    pub(crate) fn register_ref(&self, node: NodeId, name: &str) {
        let scope = self.closest_scope(node);
        self.inner
            .refs
            .borrow_mut()
            .entry(scope)
            .or_default()
            .insert(name.to_string(), node);
    }

    /// Node registered as `name` in `node`'s scope chain, nearest first.
    #[must_use]
    pub fn ref_node(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let mut cursor = Some(self.closest_scope(node));
        let scopes = self.inner.scopes.borrow();
        let refs = self.inner.refs.borrow();
        while let Some(scope) = cursor {
            if let Some(&found) = refs.get(&scope).and_then(|names| names.get(name)) {
                return Some(found);
            }
            cursor = scopes.parent(scope);
        }
        None
    }

    /// Run `f` when `node` is destroyed.
    pub(crate) fn on_cleanup(&self, node: NodeId, f: impl FnOnce(&Runtime) + 'static) {
        self.inner
            .cleanups
            .borrow_mut()
            .entry(node)
            .or_default()
            .push(Box::new(f));
    }

    pub(crate) fn forget_nodes(&self, nodes: &AHashSet<NodeId>) {
        self.inner.listeners.borrow_mut().retain(|n, _| !nodes.contains(n));
        for names in self.inner.refs.borrow_mut().values_mut() {
            names.retain(|_, n| !nodes.contains(n));
        }
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Attach a listener for `event` on `node` running `expression`.
    pub fn listen(&self, node: NodeId, event: &str, modifiers: ListenerModifiers, expression: &str) {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .entry(node)
            .or_default()
            .push(Listener {
                id,
                event: event.to_string(),
                modifiers,
                expression: expression.to_string(),
            });
    }

    #[must_use]
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.inner.listeners.borrow().get(&node).map_or(0, Vec::len)
    }

    fn remove_listener(&self, node: NodeId, id: u64) {
        if let Some(listeners) = self.inner.listeners.borrow_mut().get_mut(&node) {
            listeners.retain(|l| l.id != id);
        }
    }

    /// Deliver a bubbling `event` to `target` and its ancestors, then end the
    /// unit of work with [`Runtime::tick`].
    ///
    /// Handlers see `$event` with `type` and `target` (the target's node
    /// index). Returns `false` if a `.prevent` listener fired.
    pub fn dispatch(&self, target: NodeId, event: &str) -> bool {
        let path: Vec<NodeId> = {
            let doc = self.document();
            std::iter::once(target).chain(doc.ancestors(target)).collect()
        };
        let event_value = Value::object([
            ("type", Value::from(event)),
            ("target", Value::from(target.index())),
        ]);

        let mut default_prevented = false;
        for node in path {
            let matching: Vec<Listener> = self
                .inner
                .listeners
                .borrow()
                .get(&node)
                .map(|ls| ls.iter().filter(|l| l.event == event).cloned().collect())
                .unwrap_or_default();

            let mut stop = false;
            for listener in matching {
                if listener.modifiers.contains(ListenerModifiers::SELF) && node != target {
                    continue;
                }
                if listener.modifiers.contains(ListenerModifiers::ONCE) {
                    self.remove_listener(node, listener.id);
                }
                default_prevented |= listener.modifiers.contains(ListenerModifiers::PREVENT);
                stop |= listener.modifiers.contains(ListenerModifiers::STOP);

                tracing::trace!(node = %node, event, "listener fired");
                let scope = self.closest_scope(node);
                let result = untracked(|| {
                    self.evaluate_with(
                        node,
                        scope,
                        &listener.expression,
                        &[("$event", event_value.clone())],
                    )
                });
                if let Err(err) = result {
                    diagnostics::report(err);
                }
            }
            if stop {
                break;
            }
        }

        self.tick();
        !default_prevented
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_from_names() {
        let mods = ListenerModifiers::from_names(&["prevent", "once", "enter"]);
        assert!(mods.contains(ListenerModifiers::PREVENT | ListenerModifiers::ONCE));
        assert!(!mods.contains(ListenerModifiers::STOP));
    }

    #[test]
    fn closest_scope_falls_back_to_root() {
        let runtime = Runtime::new();
        let nodes = runtime.mount("<div><span></span></div>").unwrap();
        let span = runtime.document().first_element_child(nodes[0]).unwrap();
        assert_eq!(runtime.closest_scope(span), runtime.root_scope());

        let scope = runtime.create_scope(runtime.root_scope(), nodes[0], ReactiveObject::new());
        assert_eq!(runtime.closest_scope(span), scope);
        assert_eq!(runtime.scope_of(nodes[0]), Some(scope));
        assert_eq!(runtime.scope_of(span), None);
    }

    #[test]
    fn evaluation_caches_and_layers_locals() {
        let runtime = Runtime::new();
        let body = runtime.document().body();
        let root = runtime.root_scope();
        runtime
            .scope_data(root)
            .unwrap()
            .set("count", Value::from(2));

        assert_eq!(runtime.evaluate(body, "count * 3").unwrap(), Value::from(6));
        assert_eq!(runtime.evaluate(body, "count * 3").unwrap(), Value::from(6));
        assert_eq!(runtime.cached_expressions(), 1);

        let value = runtime
            .evaluate_with(body, root, "count + extra", &[("extra", Value::from(10))])
            .unwrap();
        assert_eq!(value, Value::from(12));

        let err = runtime.evaluate(body, "count +").unwrap_err();
        assert!(matches!(err, RuntimeError::Expression { .. }));
    }

    #[test]
    fn stopped_node_effects_are_pruned() {
        let runtime = Runtime::new();
        let body = runtime.document().body();
        for _ in 0..10 {
            runtime.effect(body, "short-lived", |_| {}).stop();
        }
        let kept = runtime.effect(body, "kept", |_| {});

        assert_eq!(runtime.effect_count(body), 1);
        let registered = runtime.inner.node_effects.borrow().get(&body).map_or(0, Vec::len);
        assert_eq!(registered, 1);
        assert!(kept.is_active());
    }

    #[test]
    fn effect_reruns_through_scheduler() {
        let runtime = Runtime::new();
        let body = runtime.document().body();
        let data = runtime.scope_data(runtime.root_scope()).unwrap();
        data.set("n", Value::from(1));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let effect = runtime.effect(body, "test", move |rt| {
            s.borrow_mut().push(rt.evaluate(body, "n").unwrap());
        });
        assert_eq!(seen.borrow().len(), 1);

        data.set("n", Value::from(2));
        data.set("n", Value::from(3));
        assert_eq!(seen.borrow().len(), 1);
        assert!(runtime.scheduler().is_flush_pending());

        runtime.tick();
        assert_eq!(*seen.borrow(), [Value::from(1), Value::from(3)]);
        assert_eq!(runtime.effect_count(body), 1);
        effect.stop();
        assert_eq!(runtime.effect_count(body), 0);
    }

    #[test]
    fn refs_resolve_through_scope_chain() {
        let runtime = Runtime::new();
        let nodes = runtime.mount("<div><input><p></p></div>").unwrap();
        let (input, p) = {
            let doc = runtime.document();
            let children = doc.element_children(nodes[0]);
            (children[0], children[1])
        };
        runtime.create_scope(runtime.root_scope(), nodes[0], ReactiveObject::new());
        runtime.register_ref(input, "field");
        assert_eq!(runtime.ref_node(p, "field"), Some(input));
        assert_eq!(runtime.ref_node(runtime.document().body(), "field"), None);
    }
}
