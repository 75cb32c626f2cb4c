use std::cell::Cell;
use std::ops::Deref;
use std::rc::Rc;

/// Kinds of GPU-visible resource a scene host owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Context,
    Geometry,
    Texture,
}

impl ResourceKind {
    fn index(self) -> usize {
        match self {
            ResourceKind::Context => 0,
            ResourceKind::Geometry => 1,
            ResourceKind::Texture => 2,
        }
    }
}

/// Live counts of allocated resources, shared between a backend factory and
/// every backend it creates. Unmount leaks show up as non-zero counts.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    live: [Cell<usize>; 3],
    allocated: [Cell<usize>; 3],
}

impl ResourceTracker {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn live(&self, kind: ResourceKind) -> usize {
        self.live[kind.index()].get()
    }

    /// Total ever allocated, including released
    pub fn allocated(&self, kind: ResourceKind) -> usize {
        self.allocated[kind.index()].get()
    }

    pub fn total_live(&self) -> usize {
        self.live.iter().map(Cell::get).sum()
    }

    /// Wrap `value`, counting it live until the returned guard drops
    pub fn track<T>(self: &Rc<Self>, kind: ResourceKind, value: T) -> Tracked<T> {
        let i = kind.index();
        self.live[i].set(self.live[i].get() + 1);
        self.allocated[i].set(self.allocated[i].get() + 1);
        Tracked {
            value,
            kind,
            tracker: self.clone(),
        }
    }

    fn release(&self, kind: ResourceKind) {
        let cell = &self.live[kind.index()];
        cell.set(cell.get().saturating_sub(1));
    }
}

/// A resource counted as live for as long as it exists
pub struct Tracked<T> {
    value: T,
    kind: ResourceKind,
    tracker: Rc<ResourceTracker>,
}

impl<T> Tracked<T> {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.tracker.release(self.kind);
    }
}
