#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use scene_host::core::backend::HeadlessBackendFactory;
use scene_host::core::resources::ResourceTracker;
use scene_host::core::scheduler::FrameQueue;
use scene_host::core::window::HostWindow;
use scene_host::error::Result;
use scene_host::host::HostEnvironment;
use scene_host::loaders::{channel, AssetSource, Completer, Pending};
use scene_host::scene::{cube_model, Material, ModelData, TextureData};

/// Asset source whose loads stay in flight until a test resolves them
#[derive(Default)]
pub struct ManualAssets {
    models: RefCell<Vec<(String, Completer<ModelData>)>>,
    textures: RefCell<Vec<(String, Completer<TextureData>)>>,
}

impl ManualAssets {
    pub fn in_flight(&self) -> usize {
        self.models.borrow().len() + self.textures.borrow().len()
    }

    /// Deliver the oldest outstanding load of `path`. Returns whether anyone
    /// was still waiting for it.
    pub fn resolve_model(&self, path: &str, result: Result<ModelData>) -> bool {
        let mut models = self.models.borrow_mut();
        let Some(index) = models.iter().position(|(p, _)| p == path) else {
            panic!("no model load for {}", path);
        };
        let (_, completer) = models.remove(index);
        drop(models);
        completer.complete(result)
    }

    pub fn resolve_texture(&self, path: &str, result: Result<TextureData>) -> bool {
        let mut textures = self.textures.borrow_mut();
        let Some(index) = textures.iter().position(|(p, _)| p == path) else {
            panic!("no texture load for {}", path);
        };
        let (_, completer) = textures.remove(index);
        drop(textures);
        completer.complete(result)
    }
}

impl AssetSource for ManualAssets {
    fn load_model(&self, path: &str) -> Pending<ModelData> {
        let (completer, pending) = channel(path);
        self.models.borrow_mut().push((path.to_string(), completer));
        pending
    }

    fn load_texture(&self, path: &str) -> Pending<TextureData> {
        let (completer, pending) = channel(path);
        self.textures.borrow_mut().push((path.to_string(), completer));
        pending
    }
}

pub struct Harness {
    pub queue: Rc<FrameQueue>,
    pub tracker: Rc<ResourceTracker>,
    pub assets: Rc<ManualAssets>,
    pub env: HostEnvironment,
}

impl Harness {
    pub fn new(width: u32, height: u32) -> Self {
        let queue = Rc::new(FrameQueue::new());
        let tracker = ResourceTracker::new();
        let assets = Rc::new(ManualAssets::default());
        let env = HostEnvironment {
            window: Rc::new(HostWindow::new(width, height)),
            scheduler: queue.clone(),
            backends: Rc::new(HeadlessBackendFactory::with_tracker(tracker.clone())),
            assets: assets.clone(),
        };
        Self {
            queue,
            tracker,
            assets,
            env,
        }
    }
}

/// A one-mesh, one-texture model
pub fn cube_data() -> ModelData {
    cube_model(2.0, vec![Material::default(); 6], vec![TextureData::solid([200, 200, 200, 255])])
}
