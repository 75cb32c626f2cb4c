use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::events::{EventTarget, HostEvent};

/// Window dimensions in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDimensions {
    pub width: u32,
    pub height: u32,
}

impl WindowDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Placement of a container's drawing surface inside the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: u32,
    pub height: u32,
}

impl SurfaceRect {
    pub fn new(left: f32, top: f32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Half-open containment test in client pixels
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left
            && y >= self.top
            && x < self.left + self.width as f32
            && y < self.top + self.height as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

struct ContainerInner {
    id: ContainerId,
    rect: Cell<SurfaceRect>,
    attached: Cell<bool>,
    z_index: i32,
    surfaces: Cell<usize>,
    events: EventTarget,
}

/// A region of the window that a scene host draws into and receives pointer
/// events from. Cloning shares the same container.
#[derive(Clone)]
pub struct Container(Rc<ContainerInner>);

/// Non-owning container reference held by resize handlers
#[derive(Clone)]
pub struct ContainerRef(Weak<ContainerInner>);

impl Container {
    fn new(id: ContainerId, rect: SurfaceRect, z_index: i32) -> Self {
        Container(Rc::new(ContainerInner {
            id,
            rect: Cell::new(rect),
            attached: Cell::new(true),
            z_index,
            surfaces: Cell::new(0),
            events: EventTarget::new(),
        }))
    }

    /// A container not managed by any window
    pub fn standalone(rect: SurfaceRect) -> Self {
        Self::new(ContainerId(0), rect, 0)
    }

    pub fn id(&self) -> ContainerId {
        self.0.id
    }

    pub fn rect(&self) -> SurfaceRect {
        self.0.rect.get()
    }

    pub fn set_rect(&self, rect: SurfaceRect) {
        self.0.rect.set(rect);
    }

    pub fn z_index(&self) -> i32 {
        self.0.z_index
    }

    pub fn is_attached(&self) -> bool {
        self.0.attached.get()
    }

    pub fn events(&self) -> &EventTarget {
        &self.0.events
    }

    /// Number of drawing surfaces currently attached
    pub fn surface_count(&self) -> usize {
        self.0.surfaces.get()
    }

    pub fn attach_surface(&self) {
        self.0.surfaces.set(self.0.surfaces.get() + 1);
    }

    /// Returns false if no surface was attached
    pub fn detach_surface(&self) -> bool {
        match self.0.surfaces.get() {
            0 => false,
            n => {
                self.0.surfaces.set(n - 1);
                true
            }
        }
    }

    pub fn downgrade(&self) -> ContainerRef {
        ContainerRef(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Container) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl ContainerRef {
    pub fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(Container)
    }
}

/// The top-level window: owns the window-scoped event target and the
/// containers laid out inside it, and routes pointer events to them.
pub struct HostWindow {
    events: EventTarget,
    size: Cell<WindowDimensions>,
    containers: RefCell<Vec<Container>>,
    next_id: Cell<u64>,
    hovered: RefCell<Option<Container>>,
    captured: RefCell<Option<Container>>,
}

impl HostWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            events: EventTarget::new(),
            size: Cell::new(WindowDimensions::new(width, height)),
            containers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            hovered: RefCell::new(None),
            captured: RefCell::new(None),
        }
    }

    pub fn events(&self) -> &EventTarget {
        &self.events
    }

    pub fn dimensions(&self) -> WindowDimensions {
        self.size.get()
    }

    pub fn add_container(&self, rect: SurfaceRect, z_index: i32) -> Container {
        let id = ContainerId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        let container = Container::new(id, rect, z_index);
        self.containers.borrow_mut().push(container.clone());
        container
    }

    /// Detach a container from the window. Hosts still holding it keep a
    /// valid handle but stop receiving events.
    pub fn remove_container(&self, container: &Container) {
        container.0.attached.set(false);
        self.containers.borrow_mut().retain(|c| !c.ptr_eq(container));
        for slot in [&self.hovered, &self.captured] {
            let mut slot = slot.borrow_mut();
            if slot.as_ref().is_some_and(|c| c.ptr_eq(container)) {
                *slot = None;
            }
        }
    }

    pub fn containers(&self) -> Vec<Container> {
        self.containers.borrow().clone()
    }

    /// Record the new size and notify window listeners.
    /// Callers lay out containers first so handlers observe the new rects.
    pub fn resize(&self, width: u32, height: u32) {
        self.size.set(WindowDimensions::new(width, height));
        self.events.dispatch(&HostEvent::Resize { width, height });
    }

    /// Topmost attached container under the point; later additions win ties
    pub fn container_at(&self, x: f32, y: f32) -> Option<Container> {
        self.containers
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_attached() && c.rect().contains(x, y))
            .max_by_key(|(i, c)| (c.z_index(), *i))
            .map(|(_, c)| c.clone())
    }

    /// Route an event: the container under the pointer (or the one holding
    /// pointer capture) first, then window-level listeners.
    pub fn dispatch(&self, event: &HostEvent) {
        match *event {
            HostEvent::Resize { width, height } => {
                self.resize(width, height);
                return;
            }
            HostEvent::PointerLeave => {
                let previous = self.hovered.borrow_mut().take();
                if let Some(previous) = previous {
                    previous.events().dispatch(event);
                }
            }
            HostEvent::PointerMove { x, y } => {
                let target = self.captured.borrow().clone().or_else(|| self.container_at(x, y));
                self.update_hover(target.as_ref());
                if let Some(target) = target {
                    target.events().dispatch(event);
                }
            }
            HostEvent::PointerDown { x, y, .. } => {
                let target = self.container_at(x, y);
                *self.captured.borrow_mut() = target.clone();
                if let Some(target) = target {
                    target.events().dispatch(event);
                }
            }
            HostEvent::PointerUp { x, y, .. } => {
                let target = self
                    .captured
                    .borrow_mut()
                    .take()
                    .or_else(|| self.container_at(x, y));
                if let Some(target) = target {
                    target.events().dispatch(event);
                }
            }
            HostEvent::Click { x, y } | HostEvent::Wheel { x, y, .. } => {
                if let Some(target) = self.container_at(x, y) {
                    target.events().dispatch(event);
                }
            }
        }
        self.events.dispatch(event);
    }

    fn update_hover(&self, target: Option<&Container>) {
        let previous = self.hovered.borrow().clone();
        let changed = match (&previous, target) {
            (Some(p), Some(t)) => !p.ptr_eq(t),
            (None, None) => false,
            _ => true,
        };
        if !changed {
            return;
        }
        *self.hovered.borrow_mut() = target.cloned();
        if let Some(previous) = previous {
            previous.events().dispatch(&HostEvent::PointerLeave);
        }
    }
}
