#![forbid(unsafe_code)]

//! Process-wide diagnostic channel.
//!
//! Every error the runtime catches ends up here: it is logged with
//! `tracing` under the `alpen::diagnostics` target, kept in a bounded ring
//! buffer for later inspection, and handed to live subscribers.
//!
//! The channel is thread-local, like the scheduler: one per embedding page.
//!
//! # Invariants
//!
//! 1. The buffer never holds more than its capacity; the oldest entry is
//!    evicted first.
//! 2. Sequence numbers increase by one per report and are never reused.
//! 3. Subscribers are called outside of any internal borrow, so a
//!    subscriber may itself report.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::RuntimeError;

/// Default ring-buffer size.
pub const DEFAULT_CAPACITY: usize = 256;

/// One reported error.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub sequence: u64,
    pub error: RuntimeError,
}

type Listener = Rc<dyn Fn(&Diagnostic)>;

struct Sink {
    buffer: VecDeque<Diagnostic>,
    capacity: usize,
    next_sequence: u64,
    listeners: Vec<(u64, Listener)>,
    next_listener: u64,
}

impl Sink {
    fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            capacity: DEFAULT_CAPACITY,
            next_sequence: 0,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }
}

thread_local! {
    static SINK: RefCell<Sink> = RefCell::new(Sink::new());
}

/// Record `error`.
pub fn report(error: RuntimeError) {
    tracing::warn!(
        target: "alpen::diagnostics",
        kind = error.kind().as_str(),
        node = ?error.node(),
        "{error}"
    );
    let (diagnostic, listeners) = SINK.with(|sink| {
        let mut sink = sink.borrow_mut();
        let diagnostic = Diagnostic {
            sequence: sink.next_sequence,
            error,
        };
        sink.next_sequence += 1;
        if sink.capacity > 0 {
            while sink.buffer.len() >= sink.capacity {
                sink.buffer.pop_front();
            }
            sink.buffer.push_back(diagnostic.clone());
        }
        let listeners: Vec<Listener> = sink.listeners.iter().map(|(_, l)| Rc::clone(l)).collect();
        (diagnostic, listeners)
    });
    for listener in listeners {
        listener(&diagnostic);
    }
}

/// Drain the buffered diagnostics, oldest first.
pub fn take() -> Vec<Diagnostic> {
    SINK.with(|sink| sink.borrow_mut().buffer.drain(..).collect())
}

/// Number of buffered diagnostics.
#[must_use]
pub fn pending() -> usize {
    SINK.with(|sink| sink.borrow().buffer.len())
}

/// Resize the ring buffer, evicting the oldest entries if it shrinks.
pub fn set_capacity(capacity: usize) {
    SINK.with(|sink| {
        let mut sink = sink.borrow_mut();
        sink.capacity = capacity;
        while sink.buffer.len() > capacity {
            sink.buffer.pop_front();
        }
    });
}

/// Call `listener` for every future report until the guard is dropped.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub fn subscribe(listener: impl Fn(&Diagnostic) + 'static) -> DiagnosticSubscription {
    let id = SINK.with(|sink| {
        let mut sink = sink.borrow_mut();
        let id = sink.next_listener;
        sink.next_listener += 1;
        sink.listeners.push((id, Rc::new(listener)));
        id
    });
    DiagnosticSubscription { id }
}

/// RAII guard returned by [`subscribe`].
#[derive(Debug)]
pub struct DiagnosticSubscription {
    id: u64,
}

impl Drop for DiagnosticSubscription {
    fn drop(&mut self) {
        let id = self.id;
        // The thread-local may already be gone during thread teardown.
        let _ = SINK.try_with(|sink| {
            if let Ok(mut sink) = sink.try_borrow_mut() {
                sink.listeners.retain(|(lid, _)| *lid != id);
            }
        });
    }
}
