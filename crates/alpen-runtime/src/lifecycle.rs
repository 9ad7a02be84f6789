#![forbid(unsafe_code)]

//! Startup lifecycle notifications.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Emitted by [`crate::Runtime::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Before the initial tree walk.
    Initializing,
    /// After the initial walk and its flush.
    Initialized,
}

type Callback = Rc<dyn Fn(LifecycleEvent)>;

#[derive(Default)]
pub(crate) struct LifecycleHub {
    callbacks: RefCell<Vec<(u64, Callback)>>,
    next_id: Cell<u64>,
}

impl LifecycleHub {
    pub(crate) fn subscribe(self: &Rc<Self>, callback: impl Fn(LifecycleEvent) + 'static) -> LifecycleSubscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.callbacks.borrow_mut().push((id, Rc::new(callback)));
        LifecycleSubscription {
            hub: Rc::downgrade(self),
            id,
        }
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        tracing::debug!(?event, "lifecycle");
        let callbacks: Vec<Callback> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.borrow().len()
    }
}

/// RAII guard returned by [`crate::Runtime::on_lifecycle`]. Dropping it
/// unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct LifecycleSubscription {
    hub: Weak<LifecycleHub>,
    id: u64,
}

impl std::fmt::Debug for LifecycleSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleSubscription")
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for LifecycleSubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade()
            && let Ok(mut callbacks) = hub.callbacks.try_borrow_mut()
        {
            callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_live_subscribers_only() {
        let hub = Rc::new(LifecycleHub::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let guard = hub.subscribe(move |event| s.borrow_mut().push(event));
        hub.emit(LifecycleEvent::Initializing);
        assert_eq!(hub.len(), 1);
        drop(guard);
        assert_eq!(hub.len(), 0);
        hub.emit(LifecycleEvent::Initialized);
        assert_eq!(*seen.borrow(), [LifecycleEvent::Initializing]);
    }
}
