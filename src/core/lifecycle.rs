use std::rc::Rc;

use log::debug;

use super::events::{EventKind, EventTarget, Listener};

type Cleanup = Box<dyn FnOnce()>;

/// Cleanup actions collected while mounting, run in reverse order.
///
/// Listener registrations go through [`Disposables::listen`] so the exact
/// `Rc` that was added is the one removed.
#[derive(Default)]
pub struct Disposables {
    actions: Vec<Cleanup>,
}

impl Disposables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&mut self, action: impl FnOnce() + 'static) {
        self.actions.push(Box::new(action));
    }

    /// Register `listener` on `target` and record its removal
    pub fn listen(&mut self, target: Rc<dyn AsEventTarget>, kind: EventKind, listener: Listener) {
        let registered = target.event_target().add_listener(kind, listener);
        self.defer(move || {
            if !target.event_target().remove_listener(kind, &registered) {
                debug!("listener for {:?} was already removed", kind);
            }
        });
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action, most recent first
    pub fn dispose(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}

/// Anything that owns an [`EventTarget`]. Lets listener cleanup keep the
/// owner (window or container) alive rather than borrowing the target.
pub trait AsEventTarget {
    fn event_target(&self) -> &EventTarget;
}

impl AsEventTarget for EventTarget {
    fn event_target(&self) -> &EventTarget {
        self
    }
}

impl AsEventTarget for super::window::HostWindow {
    fn event_target(&self) -> &EventTarget {
        self.events()
    }
}

impl AsEventTarget for super::window::Container {
    fn event_target(&self) -> &EventTarget {
        self.events()
    }
}

/// One-shot teardown handle. Runs on the first `run` or on drop, never twice.
pub struct Teardown {
    action: Option<Cleanup>,
}

impl Teardown {
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// A teardown with nothing to do
    pub fn noop() -> Self {
        Self { action: None }
    }

    pub fn is_spent(&self) -> bool {
        self.action.is_none()
    }

    pub fn run(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::HostEvent;
    use std::cell::{Cell, RefCell};

    #[test]
    fn dispose_removes_registered_listeners() {
        let target = Rc::new(EventTarget::new());
        let hits = Rc::new(Cell::new(0));
        let mut disposables = Disposables::new();

        for kind in [EventKind::Click, EventKind::PointerMove] {
            let h = hits.clone();
            disposables.listen(target.clone(), kind, Rc::new(move |_: &HostEvent| h.set(h.get() + 1)));
        }
        assert_eq!(target.listener_count(), 2);

        disposables.dispose();
        target.dispatch(&HostEvent::Click { x: 0.0, y: 0.0 });
        assert_eq!(target.listener_count(), 0);
        assert_eq!(hits.get(), 0);
        assert!(disposables.is_empty());
    }

    #[test]
    fn dispose_runs_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut disposables = Disposables::new();
        for i in 0..3 {
            let o = order.clone();
            disposables.defer(move || o.borrow_mut().push(i));
        }
        disposables.dispose();
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn teardown_runs_once() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let mut teardown = Teardown::new(move || r.set(r.get() + 1));

        teardown.run();
        teardown.run();
        drop(teardown);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn teardown_runs_on_drop() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        {
            let _teardown = Teardown::new(move || r.set(r.get() + 1));
        }
        assert_eq!(runs.get(), 1);
        assert!(Teardown::noop().is_spent());
    }
}
