use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use super::resources::{ResourceKind, ResourceTracker, Tracked};
use super::window::Container;
use crate::error::{Result, SceneError};
use crate::scene::{ObjectId, RenderableObject, Scene};

/// Draws one host's scene into its container.
///
/// Objects are uploaded once when inserted and released when removed; their
/// transforms and materials are read from the scene on every `render`.
pub trait RenderBackend {
    fn upload(&mut self, id: ObjectId, object: &RenderableObject) -> Result<()>;

    /// Returns false if nothing was uploaded under `id`
    fn release_object(&mut self, id: ObjectId) -> bool;

    fn resize(&mut self, width: u32, height: u32);

    fn render(&mut self, scene: &Scene) -> Result<()>;

    /// Free everything, including the context. Idempotent.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// Creates a backend bound to a container's surface
pub trait BackendFactory {
    fn create(&self, container: &Container) -> Result<Box<dyn RenderBackend>>;
}

/// Backend that draws nothing but accounts for every resource it would
/// allocate. Used by tests and `--headless` runs.
pub struct HeadlessBackend {
    tracker: Rc<ResourceTracker>,
    context: Option<Tracked<()>>,
    objects: HashMap<ObjectId, Vec<Tracked<()>>>,
    size: (u32, u32),
    frames: u64,
}

impl HeadlessBackend {
    pub fn new(tracker: Rc<ResourceTracker>, width: u32, height: u32) -> Self {
        let context = tracker.track(ResourceKind::Context, ());
        Self {
            tracker,
            context: Some(context),
            objects: HashMap::new(),
            size: (width, height),
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl RenderBackend for HeadlessBackend {
    fn upload(&mut self, id: ObjectId, object: &RenderableObject) -> Result<()> {
        if self.context.is_none() {
            return Err(SceneError::Gpu("upload after release".into()));
        }
        let footprint = object.footprint();
        let resources = std::iter::repeat(ResourceKind::Geometry)
            .take(footprint.geometries)
            .chain(std::iter::repeat(ResourceKind::Texture).take(footprint.textures))
            .map(|kind| self.tracker.track(kind, ()))
            .collect();
        // Re-uploading replaces (and frees) the previous resources
        self.objects.insert(id, resources);
        Ok(())
    }

    fn release_object(&mut self, id: ObjectId) -> bool {
        self.objects.remove(&id).is_some()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn render(&mut self, scene: &Scene) -> Result<()> {
        if self.context.is_none() {
            return Err(SceneError::Surface("backend released".into()));
        }
        let drawn = scene.objects().filter(|(id, _)| self.objects.contains_key(id)).count();
        self.frames += 1;
        if self.frames == 1 {
            debug!("headless backend first frame: {} objects", drawn);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.objects.clear();
        self.context.take();
    }

    fn is_released(&self) -> bool {
        self.context.is_none()
    }
}

/// Factory for [`HeadlessBackend`]s sharing one tracker
pub struct HeadlessBackendFactory {
    tracker: Rc<ResourceTracker>,
    fail: Cell<bool>,
    created: Cell<usize>,
}

impl HeadlessBackendFactory {
    pub fn new() -> Self {
        Self::with_tracker(ResourceTracker::new())
    }

    pub fn with_tracker(tracker: Rc<ResourceTracker>) -> Self {
        Self {
            tracker,
            fail: Cell::new(false),
            created: Cell::new(0),
        }
    }

    pub fn tracker(&self) -> Rc<ResourceTracker> {
        self.tracker.clone()
    }

    /// Make subsequent `create` calls fail, as a lost GPU context would
    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn created(&self) -> usize {
        self.created.get()
    }
}

impl Default for HeadlessBackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendFactory for HeadlessBackendFactory {
    fn create(&self, container: &Container) -> Result<Box<dyn RenderBackend>> {
        if self.fail.get() {
            return Err(SceneError::Gpu("no adapter available".into()));
        }
        self.created.set(self.created.get() + 1);
        let rect = container.rect();
        Ok(Box::new(HeadlessBackend::new(self.tracker.clone(), rect.width, rect.height)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, Renderable, TexturedCube};

    fn dice() -> RenderableObject {
        let textures = vec![crate::scene::TextureData::solid([255; 4]); 6];
        RenderableObject::new(
            "dice",
            Renderable::Cube(TexturedCube::new(4.0, vec![Material::default(); 6], textures)),
        )
    }

    #[test]
    fn upload_and_release_balance() {
        let tracker = ResourceTracker::new();
        let mut backend = HeadlessBackend::new(tracker.clone(), 100, 100);
        let mut scene = Scene::new(crate::camera::PerspectiveCamera::new(&Default::default(), 1.0));
        let id = scene.insert(dice());

        backend.upload(id, scene.get(id).unwrap()).unwrap();
        assert_eq!(tracker.live(ResourceKind::Context), 1);
        assert_eq!(tracker.live(ResourceKind::Geometry), 1);
        assert_eq!(tracker.live(ResourceKind::Texture), 6);

        assert!(backend.release_object(id));
        assert!(!backend.release_object(id));
        assert_eq!(tracker.live(ResourceKind::Texture), 0);

        backend.release();
        backend.release();
        assert_eq!(tracker.total_live(), 0);
        assert!(backend.render(&scene).is_err());
    }

    #[test]
    fn failing_factory_reports_gpu_error() {
        let factory = HeadlessBackendFactory::new();
        factory.set_failing(true);
        let container = Container::standalone(crate::core::window::SurfaceRect::new(0.0, 0.0, 10, 10));
        assert!(matches!(factory.create(&container), Err(SceneError::Gpu(_))));
        assert_eq!(factory.created(), 0);
    }
}
