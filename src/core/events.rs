use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Pointer buttons the scenes care about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Events routed from the window to containers.
/// Coordinates are window client pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    Resize { width: u32, height: u32 },
    PointerMove { x: f32, y: f32 },
    PointerDown { x: f32, y: f32, button: PointerButton },
    PointerUp { x: f32, y: f32, button: PointerButton },
    Click { x: f32, y: f32 },
    Wheel { x: f32, y: f32, delta: f32 },
    PointerLeave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Resize,
    PointerMove,
    PointerDown,
    PointerUp,
    Click,
    Wheel,
    PointerLeave,
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::Resize { .. } => EventKind::Resize,
            HostEvent::PointerMove { .. } => EventKind::PointerMove,
            HostEvent::PointerDown { .. } => EventKind::PointerDown,
            HostEvent::PointerUp { .. } => EventKind::PointerUp,
            HostEvent::Click { .. } => EventKind::Click,
            HostEvent::Wheel { .. } => EventKind::Wheel,
            HostEvent::PointerLeave => EventKind::PointerLeave,
        }
    }

    /// Client position for pointer events
    pub fn position(&self) -> Option<(f32, f32)> {
        match *self {
            HostEvent::PointerMove { x, y }
            | HostEvent::PointerDown { x, y, .. }
            | HostEvent::PointerUp { x, y, .. }
            | HostEvent::Click { x, y }
            | HostEvent::Wheel { x, y, .. } => Some((x, y)),
            HostEvent::Resize { .. } | HostEvent::PointerLeave => None,
        }
    }
}

pub type Listener = Rc<dyn Fn(&HostEvent)>;

/// A set of listeners keyed by event kind.
///
/// Listeners are identified by their `Rc` allocation: removal needs the same
/// reference that was registered.
#[derive(Default)]
pub struct EventTarget {
    listeners: RefCell<Vec<(EventKind, Listener)>>,
    dispatched: Cell<u64>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, kind: EventKind, listener: Listener) -> Listener {
        self.listeners.borrow_mut().push((kind, listener.clone()));
        listener
    }

    /// Returns true if the listener was registered for `kind`
    pub fn remove_listener(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(k, l)| !(*k == kind && same_listener(l, listener)));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn listeners_for(&self, kind: EventKind) -> usize {
        self.listeners.borrow().iter().filter(|(k, _)| *k == kind).count()
    }

    /// Events delivered so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched.get()
    }

    /// Deliver an event to every listener of its kind.
    /// The list is snapshotted first so listeners may add or remove listeners.
    pub fn dispatch(&self, event: &HostEvent) {
        let kind = event.kind();
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| l.clone())
            .collect();

        self.dispatched.set(self.dispatched.get() + 1);
        for listener in snapshot {
            listener(event);
        }
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_requires_same_reference() {
        let target = EventTarget::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let listener: Listener = Rc::new(move |_: &HostEvent| h.set(h.get() + 1));
        let registered = target.add_listener(EventKind::Click, listener);

        // A lookalike closure is a different listener
        let h2 = hits.clone();
        let lookalike: Listener = Rc::new(move |_: &HostEvent| h2.set(h2.get() + 1));
        assert!(!target.remove_listener(EventKind::Click, &lookalike));

        target.dispatch(&HostEvent::Click { x: 0.0, y: 0.0 });
        assert_eq!(hits.get(), 1);

        assert!(target.remove_listener(EventKind::Click, &registered));
        target.dispatch(&HostEvent::Click { x: 0.0, y: 0.0 });
        assert_eq!(hits.get(), 1);
        assert_eq!(target.listener_count(), 0);
    }

    #[test]
    fn dispatch_filters_by_kind() {
        let target = EventTarget::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        target.add_listener(EventKind::PointerMove, Rc::new(move |_: &HostEvent| h.set(h.get() + 1)));

        target.dispatch(&HostEvent::Click { x: 1.0, y: 1.0 });
        assert_eq!(hits.get(), 0);
        target.dispatch(&HostEvent::PointerMove { x: 1.0, y: 1.0 });
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn listener_may_remove_itself() {
        let target = Rc::new(EventTarget::new());
        let slot: Rc<RefCell<Option<Listener>>> = Rc::new(RefCell::new(None));

        let t = target.clone();
        let s = slot.clone();
        let listener: Listener = Rc::new(move |_: &HostEvent| {
            if let Some(me) = s.borrow().as_ref() {
                t.remove_listener(EventKind::Click, me);
            }
        });
        *slot.borrow_mut() = Some(target.add_listener(EventKind::Click, listener));

        target.dispatch(&HostEvent::Click { x: 0.0, y: 0.0 });
        assert_eq!(target.listener_count(), 0);
        // Break the cycle
        slot.borrow_mut().take();
    }

    #[test]
    fn position_only_for_pointer_events() {
        assert_eq!(HostEvent::Click { x: 2.0, y: 3.0 }.position(), Some((2.0, 3.0)));
        assert_eq!(HostEvent::PointerLeave.position(), None);
        assert_eq!(HostEvent::Resize { width: 1, height: 1 }.position(), None);
    }
}
