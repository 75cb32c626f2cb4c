//! Scene host: owns one scene, its render backend and its render loop, and
//! wires pointer input to orbit controls and picking.

pub mod animation;
pub mod orbit;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use glam::{Vec2, Vec3};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraConfig, PerspectiveCamera};
use crate::core::backend::{BackendFactory, RenderBackend};
use crate::core::clock::FrameInfo;
use crate::core::events::{EventKind, HostEvent, Listener};
use crate::core::lifecycle::{AsEventTarget, Disposables, Teardown};
use crate::core::scheduler::{FrameHandle, FrameScheduler};
use crate::core::window::{Container, ContainerRef, HostWindow};
use crate::error::SceneError;
use crate::loaders::AssetSource;
use crate::picking::{HoverTransition, PickAction, PickHit, PointerPicker};
use crate::scene::{Background, Fog, ObjectId, RenderableObject, Scene};

pub use animation::{DollyMotion, DollyStep, GlowPulse, IdleRotation};
pub use orbit::{OrbitConfig, OrbitControls};

/// Services shared by every host on a page
#[derive(Clone)]
pub struct HostEnvironment {
    pub window: Rc<HostWindow>,
    pub scheduler: Rc<dyn FrameScheduler>,
    pub backends: Rc<dyn BackendFactory>,
    pub assets: Rc<dyn AssetSource>,
}

/// Which event target picking listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerScope {
    /// The host's own container
    #[default]
    Surface,
    /// The whole window, guarded by the container rect
    Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PickingConfig {
    pub scope: ListenerScope,
}

#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    pub camera: CameraConfig,
    pub orbit: Option<OrbitConfig>,
    pub picking: Option<PickingConfig>,
}

/// Page-facing callbacks. Invoked after the host has finished handling the
/// event, so they may read host state.
#[derive(Clone, Default)]
pub struct HostCallbacks {
    pub on_pick: Option<Rc<dyn Fn(PickAction)>>,
    pub on_hover: Option<Rc<dyn Fn(bool)>>,
}

impl HostCallbacks {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Mutable access to a host's scene for content code. Inserting or removing
/// objects goes through here so the backend stays in step with the scene.
pub struct SceneContext<'a> {
    pub scene: &'a mut Scene,
    backend: &'a mut dyn RenderBackend,
    assets: &'a dyn AssetSource,
}

impl<'a> SceneContext<'a> {
    pub fn assets(&self) -> &dyn AssetSource {
        self.assets
    }

    pub fn camera(&mut self) -> &mut PerspectiveCamera {
        &mut self.scene.camera
    }

    pub fn insert(&mut self, object: RenderableObject) -> ObjectId {
        let name = object.name.clone();
        let id = self.scene.insert(object);
        if let Some(object) = self.scene.get(id) {
            if let Err(e) = self.backend.upload(id, object) {
                warn!("upload of {} failed: {}", name, e);
            }
        }
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<RenderableObject> {
        self.backend.release_object(id);
        self.scene.remove(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut RenderableObject> {
        self.scene.get_mut(id)
    }

    /// Re-upload an object whose geometry or textures changed. Transforms and
    /// material parameters are read every frame and need no refresh.
    pub fn refresh(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.scene.get(id) else {
            return false;
        };
        match self.backend.upload(id, object) {
            Ok(()) => true,
            Err(e) => {
                warn!("re-upload of {} failed: {}", object.name, e);
                false
            }
        }
    }

    /// Move the camera and its look-at target together
    pub fn translate_view(&mut self, delta: Vec3) {
        self.scene.camera.translate(delta);
    }
}

/// What a host shows. Implementations keep their animation state and object
/// ids; the host drives them once per frame.
pub trait SceneContent: 'static {
    fn name(&self) -> &str;

    /// Populate the scene at mount
    fn build(&mut self, ctx: &mut SceneContext<'_>);

    /// Advance one frame, before orbit controls and rendering
    fn update(&mut self, ctx: &mut SceneContext<'_>, frame: &FrameInfo);

    /// The object pointer rays are tested against
    fn pick_target(&self) -> Option<ObjectId> {
        None
    }

    /// Action for a click that hit the pick target
    fn pick_action(&self, _hit: &PickHit) -> Option<PickAction> {
        None
    }

    fn set_hovered(&mut self, _ctx: &mut SceneContext<'_>, _hovered: bool) {}

    /// Release anything the scene does not own, such as in-flight loads
    fn dispose(&mut self, _ctx: &mut SceneContext<'_>) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Snapshot of a host's scene for logging and tests
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSummary {
    pub objects: usize,
    pub pickable: usize,
    pub lights: usize,
    pub background: Background,
    pub fog: Option<Fog>,
}

struct HostState {
    container: ContainerRef,
    scene: Scene,
    backend: Box<dyn RenderBackend>,
    content: Box<dyn SceneContent>,
    assets: Rc<dyn AssetSource>,
    orbit: Option<OrbitControls>,
    picker: Option<PointerPicker>,
    scope: ListenerScope,
    callbacks: HostCallbacks,
    frame: Option<FrameHandle>,
    frames_rendered: u64,
    render_failed: bool,
}

impl HostState {
    fn with_ctx<R>(&mut self, f: impl FnOnce(&mut dyn SceneContent, &mut SceneContext<'_>) -> R) -> R {
        let HostState {
            scene,
            backend,
            content,
            assets,
            ..
        } = self;
        let mut ctx = SceneContext {
            scene,
            backend: &mut **backend,
            assets: &**assets,
        };
        f(&mut **content, &mut ctx)
    }
}

/// Where a pointer event was heard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Container,
    Window,
}

/// Page notifications produced while the state is borrowed
enum Notice {
    Pick(PickAction),
    Hover(bool),
}

/// Hand notices to the page. Call only once the host state is released.
fn deliver(callbacks: &HostCallbacks, notices: Vec<Notice>) {
    for notice in notices {
        match notice {
            Notice::Pick(action) => {
                if let Some(on_pick) = &callbacks.on_pick {
                    on_pick(action);
                }
            }
            Notice::Hover(hovered) => {
                if let Some(on_hover) = &callbacks.on_hover {
                    on_hover(hovered);
                }
            }
        }
    }
}

struct HostShared {
    name: String,
    alive: Cell<bool>,
    scheduler: Rc<dyn FrameScheduler>,
    state: RefCell<HostState>,
}

impl HostShared {
    fn schedule(self: &Rc<Self>) {
        let weak: Weak<HostShared> = Rc::downgrade(self);
        let handle = self.scheduler.request_frame(Box::new(move |info| {
            if let Some(host) = weak.upgrade() {
                host.frame(&info);
            }
        }));
        self.state.borrow_mut().frame = Some(handle);
    }

    fn frame(self: &Rc<Self>, info: &FrameInfo) {
        if !self.alive.get() {
            return;
        }
        let mut notices = Vec::new();
        let callbacks = {
            let mut state = self.state.borrow_mut();
            state.frame = None;
            state.with_ctx(|content, ctx| content.update(ctx, info));
            self.drop_stale_hover(&mut state, &mut notices);

            let HostState { scene, orbit, .. } = &mut *state;
            if let Some(orbit) = orbit {
                orbit.update(&mut scene.camera);
            }

            let HostState {
                scene,
                backend,
                render_failed,
                ..
            } = &mut *state;
            match backend.render(scene) {
                Ok(()) => *render_failed = false,
                Err(e) if !*render_failed => {
                    warn!("{}: render failed: {}", self.name, e);
                    *render_failed = true;
                }
                Err(e) => debug!("{}: render failed again: {}", self.name, e),
            }
            state.frames_rendered += 1;
            state.callbacks.clone()
        };
        deliver(&callbacks, notices);
        if self.alive.get() {
            self.schedule();
        }
    }

    fn on_resize(&self) {
        if !self.alive.get() {
            return;
        }
        let mut state = self.state.borrow_mut();
        let container = match state.container.upgrade() {
            Some(container) if container.is_attached() => container,
            _ => {
                debug!("{}: {}", self.name, SceneError::ResizeOnDetachedContainer);
                return;
            }
        };
        let rect = container.rect();
        if !state.scene.camera.set_viewport(rect.width, rect.height) {
            debug!(
                "{}: ignoring resize, {}",
                self.name,
                SceneError::ZeroSizedContainer {
                    width: rect.width,
                    height: rect.height
                }
            );
            return;
        }
        state.backend.resize(rect.width, rect.height);
        if let Some(orbit) = state.orbit.as_mut() {
            orbit.set_viewport_height(rect.height);
        }
    }

    fn on_pointer(&self, event: &HostEvent, source: Source) {
        if !self.alive.get() {
            return;
        }
        let Ok(mut state) = self.state.try_borrow_mut() else {
            debug!("{}: dropping re-entrant {:?}", self.name, event.kind());
            return;
        };
        let Some(container) = state.container.upgrade() else {
            return;
        };
        let rect = container.rect();
        let picks_here = state.picker.is_some()
            && match state.scope {
                ListenerScope::Surface => source == Source::Container,
                ListenerScope::Window => source == Source::Window,
            };

        let mut notices = Vec::new();
        match *event {
            HostEvent::PointerDown { x, y, button } if source == Source::Container => {
                if let Some(orbit) = state.orbit.as_mut() {
                    orbit.pointer_down(button, Vec2::new(x, y));
                }
            }
            HostEvent::PointerUp { .. } if source == Source::Container => {
                if let Some(orbit) = state.orbit.as_mut() {
                    orbit.pointer_up();
                }
            }
            HostEvent::Wheel { delta, .. } if source == Source::Container => {
                if let Some(orbit) = state.orbit.as_mut() {
                    orbit.wheel(delta);
                }
            }
            HostEvent::PointerMove { x, y } => {
                if source == Source::Container {
                    let HostState { orbit, scene, .. } = &mut *state;
                    if let Some(orbit) = orbit {
                        orbit.pointer_move(Vec2::new(x, y), &scene.camera);
                    }
                }
                if picks_here {
                    // Window-scoped listeners only count pointers over this container
                    let hit = rect.contains(x, y) && self.hit_test(&state, Vec2::new(x, y)).is_some();
                    self.apply_hover(&mut state, hit, &mut notices);
                }
            }
            HostEvent::PointerLeave if picks_here => {
                self.apply_hover(&mut state, false, &mut notices);
            }
            HostEvent::Click { x, y } if picks_here && rect.contains(x, y) => {
                if let Some(hit) = self.hit_test(&state, Vec2::new(x, y)) {
                    if let Some(action) = state.content.pick_action(&hit) {
                        debug!("{}: click hit {:?} -> {:?}", self.name, hit.object, action);
                        notices.push(Notice::Pick(action));
                    }
                }
            }
            _ => {}
        }

        let callbacks = state.callbacks.clone();
        drop(state);
        deliver(&callbacks, notices);
    }

    fn hit_test(&self, state: &HostState, client: Vec2) -> Option<PickHit> {
        let picker = state.picker.as_ref()?;
        let container = state.container.upgrade()?;
        let Some(target) = state.content.pick_target() else {
            trace!("{}: {}", self.name, SceneError::PickTargetUnavailable);
            return None;
        };
        picker
            .pick(client, &container.rect(), &state.scene.camera, &state.scene, Some(target))
            .and_then(|pick| pick.hit)
    }

    fn apply_hover(&self, state: &mut HostState, hit: bool, notices: &mut Vec<Notice>) {
        let Some(transition) = state.picker.as_mut().and_then(|p| p.update_hover(hit)) else {
            return;
        };
        let hovered = transition == HoverTransition::Entered;
        state.with_ctx(|content, ctx| content.set_hovered(ctx, hovered));
        notices.push(Notice::Hover(hovered));
    }

    /// A hover cannot outlive its target, e.g. across a model reload
    fn drop_stale_hover(&self, state: &mut HostState, notices: &mut Vec<Notice>) {
        let hovered = state.picker.as_ref().is_some_and(PointerPicker::is_hovered);
        if hovered && state.content.pick_target().is_none() {
            debug!("{}: pick target gone, clearing hover", self.name);
            self.apply_hover(state, false, notices);
        }
    }

    fn teardown(&self, disposables: &mut Disposables) {
        self.alive.set(false);

        let mut state = self.state.borrow_mut();
        if let Some(handle) = state.frame.take() {
            self.scheduler.cancel_frame(handle);
        }
        disposables.dispose();

        let mut notices = Vec::new();
        self.apply_hover(&mut state, false, &mut notices);
        state.with_ctx(|content, ctx| {
            content.dispose(ctx);
            for id in ctx.scene.object_ids() {
                ctx.remove(id);
            }
        });
        state.backend.release();

        match state.container.upgrade() {
            Some(container) => {
                container.detach_surface();
            }
            None => debug!("{}: container already gone at teardown", self.name),
        }
        info!("{}: unmounted after {} frames", self.name, state.frames_rendered);
        let callbacks = state.callbacks.clone();
        drop(state);
        deliver(&callbacks, notices);
    }
}

/// A mounted scene and its teardown handle.
///
/// Dropping the host tears it down; `unmount` does the same explicitly.
pub struct SceneHost {
    shared: Option<Rc<HostShared>>,
    teardown: Teardown,
}

impl SceneHost {
    /// A host that renders nothing and whose teardown does nothing
    pub fn inert() -> Self {
        Self {
            shared: None,
            teardown: Teardown::noop(),
        }
    }

    pub fn mount(
        env: &HostEnvironment,
        container: &Container,
        content: Box<dyn SceneContent>,
        config: HostConfig,
        callbacks: HostCallbacks,
    ) -> SceneHost {
        let name = content.name().to_string();
        let rect = container.rect();
        if rect.is_empty() {
            warn!(
                "{}: not mounting, {}",
                name,
                SceneError::ZeroSizedContainer {
                    width: rect.width,
                    height: rect.height
                }
            );
            return SceneHost::inert();
        }

        let backend = match env.backends.create(container) {
            Ok(backend) => backend,
            Err(e) => {
                warn!("{}: no render backend, scene disabled: {}", name, e);
                return SceneHost::inert();
            }
        };

        let camera = PerspectiveCamera::new(&config.camera, rect.width as f32 / rect.height as f32);
        let orbit = config.orbit.map(|orbit_config| {
            let mut orbit = OrbitControls::new(orbit_config);
            orbit.set_viewport_height(rect.height);
            orbit
        });
        container.attach_surface();

        let shared = Rc::new(HostShared {
            name: name.clone(),
            alive: Cell::new(true),
            scheduler: env.scheduler.clone(),
            state: RefCell::new(HostState {
                container: container.downgrade(),
                scene: Scene::new(camera),
                backend,
                content,
                assets: env.assets.clone(),
                orbit,
                picker: config.picking.map(|_| PointerPicker::new()),
                scope: config.picking.map(|p| p.scope).unwrap_or_default(),
                callbacks,
                frame: None,
                frames_rendered: 0,
                render_failed: false,
            }),
        });

        shared
            .state
            .borrow_mut()
            .with_ctx(|content, ctx| content.build(ctx));

        let mut disposables = Disposables::new();
        Self::register_listeners(&shared, env, container, config.picking, &mut disposables);
        shared.schedule();

        info!(
            "{}: mounted {}x{} with {} listeners",
            name,
            rect.width,
            rect.height,
            disposables.len()
        );

        let teardown = {
            let shared = shared.clone();
            Teardown::new(move || shared.teardown(&mut disposables))
        };
        SceneHost {
            shared: Some(shared),
            teardown,
        }
    }

    fn register_listeners(
        shared: &Rc<HostShared>,
        env: &HostEnvironment,
        container: &Container,
        picking: Option<PickingConfig>,
        disposables: &mut Disposables,
    ) {
        let window: Rc<dyn AsEventTarget> = env.window.clone();
        let surface: Rc<dyn AsEventTarget> = Rc::new(container.clone());

        let weak = Rc::downgrade(shared);
        let resize: Listener = Rc::new(move |_: &HostEvent| {
            if let Some(host) = weak.upgrade() {
                host.on_resize();
            }
        });
        disposables.listen(window.clone(), EventKind::Resize, resize);

        let pointer = |source: Source| -> Listener {
            let weak = Rc::downgrade(shared);
            Rc::new(move |event: &HostEvent| {
                if let Some(host) = weak.upgrade() {
                    host.on_pointer(event, source);
                }
            })
        };

        let surface_kinds: &[EventKind] = match picking.map(|p| p.scope) {
            Some(ListenerScope::Surface) => &[
                EventKind::PointerDown,
                EventKind::PointerMove,
                EventKind::PointerUp,
                EventKind::Wheel,
                EventKind::Click,
                EventKind::PointerLeave,
            ],
            _ => &[
                EventKind::PointerDown,
                EventKind::PointerMove,
                EventKind::PointerUp,
                EventKind::Wheel,
            ],
        };
        let on_surface = pointer(Source::Container);
        for kind in surface_kinds {
            disposables.listen(surface.clone(), *kind, on_surface.clone());
        }

        if let Some(PickingConfig {
            scope: ListenerScope::Window,
        }) = picking
        {
            let on_window = pointer(Source::Window);
            for kind in [EventKind::PointerMove, EventKind::Click, EventKind::PointerLeave] {
                disposables.listen(window.clone(), kind, on_window.clone());
            }
        }
    }

    /// Tear down now. Later calls, and the eventual drop, do nothing.
    pub fn unmount(&mut self) {
        self.teardown.run();
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.as_ref().is_some_and(|s| s.alive.get())
    }

    pub fn name(&self) -> Option<String> {
        self.shared.as_ref().map(|s| s.name.clone())
    }

    pub fn camera(&self) -> Option<PerspectiveCamera> {
        self.shared
            .as_ref()
            .map(|s| s.state.borrow().scene.camera.clone())
    }

    pub fn camera_aspect(&self) -> Option<f32> {
        self.camera().map(|c| c.aspect())
    }

    pub fn is_hovered(&self) -> bool {
        self.shared.as_ref().is_some_and(|s| {
            s.state
                .borrow()
                .picker
                .as_ref()
                .is_some_and(PointerPicker::is_hovered)
        })
    }

    pub fn frames_rendered(&self) -> u64 {
        self.shared
            .as_ref()
            .map_or(0, |s| s.state.borrow().frames_rendered)
    }

    pub fn has_pending_frame(&self) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|s| s.state.borrow().frame.is_some())
    }

    pub fn pick_target(&self) -> Option<ObjectId> {
        let shared = self.shared.as_ref()?;
        let state = shared.state.borrow();
        state.content.pick_target()
    }

    pub fn summary(&self) -> Option<SceneSummary> {
        let shared = self.shared.as_ref()?;
        let state = shared.state.borrow();
        let scene = &state.scene;
        Some(SceneSummary {
            objects: scene.len(),
            pickable: scene.objects().filter(|(_, o)| o.pickable).count(),
            lights: scene.lights.len(),
            background: scene.background,
            fog: scene.fog,
        })
    }

    /// Run `f` against the mounted content if it is a `C`
    pub fn with_content<C: SceneContent, R>(
        &self,
        f: impl FnOnce(&mut C, &mut SceneContext<'_>) -> R,
    ) -> Option<R> {
        let shared = self.shared.as_ref()?;
        if !shared.alive.get() {
            return None;
        }
        let mut notices = Vec::new();
        let (result, callbacks) = {
            let mut state = shared.state.borrow_mut();
            let result =
                state.with_ctx(|content, ctx| content.as_any_mut().downcast_mut::<C>().map(|c| f(c, ctx)));
            shared.drop_stale_hover(&mut state, &mut notices);
            (result, state.callbacks.clone())
        };
        deliver(&callbacks, notices);
        result
    }
}

impl Drop for SceneHost {
    fn drop(&mut self) {
        self.teardown.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::HeadlessBackendFactory;
    use crate::core::scheduler::FrameQueue;
    use crate::core::window::SurfaceRect;
    use crate::loaders::Pending;
    use crate::scene::{ModelData, TextureData};

    struct Empty {
        updates: Rc<Cell<u32>>,
    }

    impl SceneContent for Empty {
        fn name(&self) -> &str {
            "empty"
        }

        fn build(&mut self, _ctx: &mut SceneContext<'_>) {}

        fn update(&mut self, _ctx: &mut SceneContext<'_>, _frame: &FrameInfo) {
            self.updates.set(self.updates.get() + 1);
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct NoAssets;

    impl AssetSource for NoAssets {
        fn load_model(&self, path: &str) -> Pending<ModelData> {
            Pending::ready(path, Err(SceneError::asset(path, "no assets in tests")))
        }

        fn load_texture(&self, path: &str) -> Pending<TextureData> {
            Pending::ready(path, Err(SceneError::asset(path, "no assets in tests")))
        }
    }

    fn env(queue: &Rc<FrameQueue>) -> HostEnvironment {
        HostEnvironment {
            window: Rc::new(HostWindow::new(800, 600)),
            scheduler: queue.clone(),
            backends: Rc::new(HeadlessBackendFactory::new()),
            assets: Rc::new(NoAssets),
        }
    }

    #[test]
    fn zero_sized_container_gives_inert_host() {
        let queue = Rc::new(FrameQueue::new());
        let env = env(&queue);
        let container = env.window.add_container(SurfaceRect::new(0.0, 0.0, 0, 400), 0);
        let updates = Rc::new(Cell::new(0));
        let mut host = SceneHost::mount(
            &env,
            &container,
            Box::new(Empty { updates }),
            HostConfig::default(),
            HostCallbacks::none(),
        );
        assert!(!host.is_mounted());
        assert_eq!(queue.pending(), 0);
        assert_eq!(container.surface_count(), 0);
        host.unmount();
    }

    #[test]
    fn render_loop_runs_once_per_frame() {
        let queue = Rc::new(FrameQueue::new());
        let env = env(&queue);
        let container = env.window.add_container(SurfaceRect::new(0.0, 0.0, 400, 200), 0);
        let updates = Rc::new(Cell::new(0));
        let host = SceneHost::mount(
            &env,
            &container,
            Box::new(Empty {
                updates: updates.clone(),
            }),
            HostConfig::default(),
            HostCallbacks::none(),
        );

        queue.run_frames(5);
        assert_eq!(updates.get(), 5);
        assert_eq!(host.frames_rendered(), 5);
        assert!(host.has_pending_frame());
        assert_eq!(container.surface_count(), 1);
    }

    #[test]
    fn drop_tears_down() {
        let queue = Rc::new(FrameQueue::new());
        let env = env(&queue);
        let container = env.window.add_container(SurfaceRect::new(0.0, 0.0, 400, 200), 0);
        {
            let _host = SceneHost::mount(
                &env,
                &container,
                Box::new(Empty {
                    updates: Rc::new(Cell::new(0)),
                }),
                HostConfig::default(),
                HostCallbacks::none(),
            );
            assert!(env.window.events().listener_count() > 0);
        }
        assert_eq!(queue.pending(), 0);
        assert_eq!(env.window.events().listener_count(), 0);
        assert_eq!(container.events().listener_count(), 0);
        assert_eq!(container.surface_count(), 0);
    }
}
