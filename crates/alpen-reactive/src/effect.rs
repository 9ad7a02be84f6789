#![forbid(unsafe_code)]

//! Dependency-tracking effects.
//!
//! An [`Effect`] runs its callback immediately and records every reactive
//! read made during the run. When any of those values is written, the effect
//! is triggered: it either re-runs inline or, when created with
//! [`Effect::with_scheduler`], hands itself to the scheduler hook, which
//! decides when to call [`Effect::run`].
//!
//! # Invariants
//!
//! 1. Dependencies are re-collected on every run; a value read in an earlier
//!    run but not in the latest one no longer triggers the effect.
//! 2. An effect never triggers itself while it is running.
//! 3. A stopped effect is never run or triggered again.
//! 4. Reads inside [`untracked`] are invisible to the enclosing effect.
//!
//! # Failure Modes
//!
//! - Callback panic: the tracking frame is popped during unwinding, so the
//!   tracker stays balanced and the effect can run again.
//! - All handles dropped: the effect is freed and silently stops triggering.

use std::cell::{Cell, RefCell};
use std::collections::hash_map::Entry;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

static NEXT_EFFECT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE: RefCell<Vec<Option<Rc<EffectInner>>>> = const { RefCell::new(Vec::new()) };
}

/// Unique identifier of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn next() -> Self {
        Self(NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

type Hook = Box<dyn Fn(&Effect)>;

pub(crate) struct EffectInner {
    id: EffectId,
    callback: Box<dyn Fn()>,
    hook: Option<Hook>,
    /// Keyed by `Rc::as_ptr` so repeated reads of one value track once.
    deps: RefCell<AHashMap<*const Dep, Rc<Dep>>>,
    active: Cell<bool>,
    running: Cell<bool>,
    runs: Cell<u64>,
}

/// Shared handle to a reactive effect.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("active", &self.inner.active.get())
            .field("deps", &self.inner.deps.borrow().len())
            .field("runs", &self.inner.runs.get())
            .finish()
    }
}

impl Effect {
    fn build(callback: Box<dyn Fn()>, hook: Option<Hook>) -> Self {
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: EffectId::next(),
                callback,
                hook,
                deps: RefCell::new(AHashMap::new()),
                active: Cell::new(true),
                running: Cell::new(false),
                runs: Cell::new(0),
            }),
        };
        effect.run();
        effect
    }

    /// Create an effect that re-runs synchronously whenever a dependency
    /// changes. Runs once immediately.
    pub fn new(callback: impl Fn() + 'static) -> Self {
        Self::build(Box::new(callback), None)
    }

    /// Create an effect whose re-runs are delegated to `hook`.
    ///
    /// The first run happens immediately. Afterwards a dependency change
    /// calls `hook(&effect)` instead of running; the hook is expected to
    /// arrange for [`Effect::run`] to be called later.
    pub fn with_scheduler(
        callback: impl Fn() + 'static,
        hook: impl Fn(&Effect) + 'static,
    ) -> Self {
        Self::build(Box::new(callback), Some(Box::new(hook)))
    }

    #[must_use]
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Whether the effect has not been stopped.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of completed or in-progress runs.
    #[must_use]
    pub fn run_count(&self) -> u64 {
        self.inner.runs.get()
    }

    /// Number of values read during the latest run.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Run the callback now, re-collecting dependencies.
    ///
    /// No-op when stopped or already running.
    pub fn run(&self) {
        let inner = &self.inner;
        if !inner.active.get() || inner.running.get() {
            return;
        }
        self.cleanup();
        inner.running.set(true);
        inner.runs.set(inner.runs.get() + 1);
        let _frame = Frame::push(Some(Rc::clone(inner)));
        (inner.callback)();
    }

    /// Stop the effect permanently and release its dependencies.
    pub fn stop(&self) {
        if self.inner.active.replace(false) {
            #[cfg(feature = "tracing")]
            tracing::trace!(effect = self.inner.id.get(), "effect stopped");
            self.cleanup();
        }
    }

    fn cleanup(&self) {
        let deps = self.inner.deps.take();
        for dep in deps.into_values() {
            dep.unsubscribe(self.inner.id);
        }
    }
}

/// RAII frame on the tracking stack.
struct Frame {
    effect: Option<Rc<EffectInner>>,
}

impl Frame {
    fn push(effect: Option<Rc<EffectInner>>) -> Self {
        ACTIVE.with(|stack| stack.borrow_mut().push(effect.clone()));
        Self { effect }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        ACTIVE.with(|stack| {
            stack.borrow_mut().pop();
        });
        if let Some(effect) = &self.effect {
            effect.running.set(false);
        }
    }
}

fn current() -> Option<Rc<EffectInner>> {
    ACTIVE.with(|stack| stack.borrow().last().cloned().flatten())
}

/// Run `f` without recording reads into the enclosing effect.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _frame = Frame::push(None);
    f()
}

/// Whether a read right now would be recorded by some effect.
#[must_use]
pub fn is_tracking() -> bool {
    current().is_some()
}

/// A single trackable reactive location (an object key, an array, ...).
pub(crate) struct Dep {
    subscribers: RefCell<Vec<Weak<EffectInner>>>,
}

impl Dep {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            subscribers: RefCell::new(Vec::new()),
        })
    }

    /// Record a read by the currently running effect, if any.
    pub(crate) fn track(self: &Rc<Self>) {
        let Some(effect) = current() else {
            return;
        };
        if !effect.active.get() {
            return;
        }
        {
            let mut deps = effect.deps.borrow_mut();
            let Entry::Vacant(slot) = deps.entry(Rc::as_ptr(self)) else {
                return;
            };
            slot.insert(Rc::clone(self));
        }
        self.subscribers.borrow_mut().push(Rc::downgrade(&effect));
    }

    fn unsubscribe(&self, id: EffectId) {
        self.subscribers
            .borrow_mut()
            .retain(|w| w.upgrade().is_some_and(|e| e.id != id));
    }

    /// Notify every subscribed effect of a write.
    pub(crate) fn trigger(&self) {
        let targets: Vec<Rc<EffectInner>> = {
            let mut subs = self.subscribers.borrow_mut();
            subs.retain(|w| w.strong_count() > 0);
            subs.iter().filter_map(Weak::upgrade).collect()
        };
        for inner in targets {
            if !inner.active.get() || inner.running.get() {
                continue;
            }
            let effect = Effect { inner };
            match &effect.inner.hook {
                Some(hook) => hook(&effect),
                None => effect.run(),
            }
        }
    }
}
