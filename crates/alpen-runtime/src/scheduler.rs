#![forbid(unsafe_code)]

//! Effect scheduler: a deduplicating task queue drained to a fixed point.
//!
//! Reactive triggers never re-render synchronously. A triggered effect is
//! wrapped in a [`Task`] and handed to [`Scheduler::task`], and a flush is
//! requested with [`Scheduler::ping_flush`]. The embedding layer ends each
//! synchronous unit of work by calling `Runtime::tick`, which runs at most one
//! flush for any number of pings.
//!
//! # Invariants
//!
//! 1. A task id is present in the queue at most once. Enqueueing a pending
//!    id is a no-op; once the task has started running it may be queued
//!    again.
//! 2. A flush runs tasks in enqueue order and keeps draining until the queue
//!    is empty, including tasks queued by the tasks it runs.
//! 3. Nested `flush()` calls return immediately; the outer flush drains
//!    their work.
//! 4. `task()` never runs anything.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Task returns `Err` | Reported to diagnostics, flush continues |
//! | Task panics | Caught, reported as `TaskPanicked`, flush continues |
//! | Task re-queued more than `max_task_reruns` times in one flush | Dropped for the rest of the flush, reported as `FlushLimit` |

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::{AHashMap, AHashSet};
use web_time::Instant;

use crate::diagnostics;
use crate::error::RuntimeError;

/// Default bound on re-runs of one task within a single flush.
pub const DEFAULT_MAX_TASK_RERUNS: u32 = 100;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static GLOBAL: Scheduler = Scheduler::new();
}

/// Identity of a task. Effects keep one id for their whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocate a fresh, never-reused id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

type TaskFn = Rc<dyn Fn() -> Result<(), RuntimeError>>;

/// A unit of deferred work.
#[derive(Clone)]
pub struct Task {
    id: TaskId,
    label: Rc<str>,
    run: TaskFn,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

impl Task {
    /// A one-off task with a fresh id.
    pub fn new(
        label: impl Into<Rc<str>>,
        run: impl Fn() -> Result<(), RuntimeError> + 'static,
    ) -> Self {
        Self::with_id(TaskId::next(), label, run)
    }

    /// A task with a caller-chosen identity, for deduplication across enqueues.
    pub fn with_id(
        id: TaskId,
        label: impl Into<Rc<str>>,
        run: impl Fn() -> Result<(), RuntimeError> + 'static,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            run: Rc::new(run),
        }
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Counters since the scheduler was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub flushes: u64,
    pub tasks_run: u64,
    pub tasks_failed: u64,
}

struct SchedulerInner {
    queue: RefCell<VecDeque<Task>>,
    queued: RefCell<AHashSet<TaskId>>,
    flushing: Cell<bool>,
    ping: Cell<bool>,
    max_task_reruns: Cell<u32>,
    stats: Cell<SchedulerStats>,
}

/// Shared handle to a task queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("flushing", &self.inner.flushing.get())
            .field("ping", &self.inner.ping.get())
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the flushing flag even if a flush unwinds.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Scheduler {
    /// A private scheduler. Most code wants [`Scheduler::global`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                queue: RefCell::new(VecDeque::new()),
                queued: RefCell::new(AHashSet::new()),
                flushing: Cell::new(false),
                ping: Cell::new(false),
                max_task_reruns: Cell::new(DEFAULT_MAX_TASK_RERUNS),
                stats: Cell::new(SchedulerStats::default()),
            }),
        }
    }

    /// The thread's shared scheduler.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.with(Clone::clone)
    }

    pub fn set_max_task_reruns(&self, max: u32) {
        self.inner.max_task_reruns.set(max.max(1));
    }

    /// Queue `task` unless its id is already pending.
    ///
    /// Returns `true` if the task was added.
    pub fn task(&self, task: Task) -> bool {
        if !self.inner.queued.borrow_mut().insert(task.id) {
            return false;
        }
        tracing::trace!(task = task.id.get(), label = %task.label, "task queued");
        self.inner.queue.borrow_mut().push_back(task);
        true
    }

    /// Request one flush at the next tick.
    pub fn ping_flush(&self) {
        self.inner.ping.set(true);
    }

    /// Whether a ping is outstanding.
    #[must_use]
    pub fn is_flush_pending(&self) -> bool {
        self.inner.ping.get()
    }

    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats.get()
    }

    /// Run queued tasks until the queue is empty.
    pub fn flush(&self) {
        let inner = &self.inner;
        if inner.flushing.replace(true) {
            return;
        }
        let _guard = FlushGuard(&inner.flushing);
        let span = tracing::debug_span!("flush", pending = self.pending());
        let _enter = span.enter();
        let started = Instant::now();

        let max = inner.max_task_reruns.get();
        let mut runs: AHashMap<TaskId, u32> = AHashMap::new();
        let mut ran = 0u64;
        let mut failed = 0u64;

        loop {
            let Some(task) = inner.queue.borrow_mut().pop_front() else {
                break;
            };
            inner.queued.borrow_mut().remove(&task.id);

            let count = runs.entry(task.id).or_insert(0);
            *count += 1;
            if *count > max {
                if *count == max + 1 {
                    diagnostics::report(RuntimeError::FlushLimit {
                        task: task.id,
                        label: task.label.to_string(),
                        runs: max,
                    });
                }
                continue;
            }

            ran += 1;
            let run = Rc::clone(&task.run);
            match catch_unwind(AssertUnwindSafe(|| run())) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failed += 1;
                    diagnostics::report(err);
                }
                Err(payload) => {
                    failed += 1;
                    diagnostics::report(RuntimeError::TaskPanicked {
                        task: task.id,
                        label: task.label.to_string(),
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
        }

        inner.ping.set(false);
        let mut stats = inner.stats.get();
        stats.flushes += 1;
        stats.tasks_run += ran;
        stats.tasks_failed += failed;
        inner.stats.set(stats);
        tracing::debug!(
            tasks = ran,
            failed,
            elapsed_us = started.elapsed().as_micros() as u64,
            "flush complete"
        );
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
