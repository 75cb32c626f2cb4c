use std::any::Any;
use std::f32::consts::FRAC_PI_4;
use std::rc::Rc;

use glam::Vec3;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::camera::CameraConfig;
use crate::core::clock::FrameInfo;
use crate::core::window::Container;
use crate::error::SceneError;
use crate::host::{
    HostCallbacks, HostConfig, HostEnvironment, IdleRotation, OrbitConfig, PickingConfig,
    SceneContent, SceneContext, SceneHost,
};
use crate::loaders::{AssetSource, Pending};
use crate::math::hex_rgb;
use crate::picking::{PickAction, PickHit};
use crate::scene::{
    Background, Light, ModelData, ModelInstance, ObjectId, Renderable, RenderableObject, Transform,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowcaseConfig {
    pub model_path: String,
    pub scale: f32,
    /// Route a click on the model navigates to
    pub redirect: String,
    /// Idle spin about +Y, radians per frame
    pub rotation_speed: f32,
    pub camera: CameraConfig,
    pub orbit: OrbitConfig,
}

impl Default for ShowcaseConfig {
    fn default() -> Self {
        Self {
            model_path: "assets/models/scene33.gltf".into(),
            scale: 0.7,
            redirect: "/servicess".into(),
            rotation_speed: 0.005,
            camera: CameraConfig::at(50.0, [0.0, 0.0, 5.0]),
            orbit: OrbitConfig {
                enable_damping: true,
                ..OrbitConfig::default()
            },
        }
    }
}

/// A model that arrives asynchronously and idles in place once it has.
///
/// Until the load resolves there is nothing to pick. A failed load is logged
/// and leaves the rest of the scene untouched.
pub struct AssetLoadedObject {
    path: String,
    scale: f32,
    pending: Option<Pending<ModelData>>,
    instance: Option<ObjectId>,
    rotation: IdleRotation,
    last_error: Option<SceneError>,
}

impl AssetLoadedObject {
    pub fn new(path: impl Into<String>, scale: f32, rotation_speed: f32) -> Self {
        Self {
            path: path.into(),
            scale,
            pending: None,
            instance: None,
            rotation: IdleRotation::about_y(rotation_speed),
            last_error: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn instance(&self) -> Option<ObjectId> {
        self.instance
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_error(&self) -> Option<&SceneError> {
        self.last_error.as_ref()
    }

    pub fn is_rotating(&self) -> bool {
        !self.rotation.is_suspended()
    }

    pub fn set_hovered(&mut self, hovered: bool) {
        self.rotation.set_suspended(hovered);
    }

    /// Request the model; any earlier request is abandoned
    pub fn start(&mut self, assets: &dyn AssetSource) {
        debug!("requesting model {}", self.path);
        self.last_error = None;
        self.pending = Some(assets.load_model(&self.path));
    }

    /// Apply a finished load. Returns true when an instance was inserted.
    pub fn poll(&mut self, ctx: &mut SceneContext<'_>) -> bool {
        let Some(result) = self.pending.as_mut().and_then(Pending::poll) else {
            return false;
        };
        self.pending = None;

        match result {
            Ok(data) => {
                info!(
                    "model {} ready: {} meshes, {} triangles",
                    self.path,
                    data.meshes.len(),
                    data.triangle_count()
                );
                let object = RenderableObject::new(
                    self.path.clone(),
                    Renderable::Model(ModelInstance {
                        source: self.path.clone(),
                        data,
                    }),
                )
                .with_transform(Transform::uniform_scale(self.scale))
                .pickable();
                self.instance = Some(ctx.insert(object));
                true
            }
            Err(e) => {
                warn!("{}", e);
                self.last_error = Some(e);
                false
            }
        }
    }

    /// Poll the load, then advance the idle spin
    pub fn update(&mut self, ctx: &mut SceneContext<'_>) {
        self.poll(ctx);
        if let Some(object) = self.instance.and_then(|id| ctx.object_mut(id)) {
            self.rotation.step(&mut object.transform.rotation);
        }
    }

    /// Swap in another model. The current instance and any in-flight load
    /// are released before the new request goes out.
    pub fn reload(&mut self, ctx: &mut SceneContext<'_>, path: impl Into<String>, scale: f32) {
        self.dispose(ctx);
        self.path = path.into();
        self.scale = scale;
        self.start(ctx.assets());
    }

    pub fn dispose(&mut self, ctx: &mut SceneContext<'_>) {
        if let Some(pending) = self.pending.take() {
            debug!("abandoning load of {}", pending.label());
        }
        if let Some(id) = self.instance.take() {
            ctx.remove(id);
        }
    }
}

/// The clickable model band: a loaded model lit from the camera's side
pub struct ModelShowcase {
    object: AssetLoadedObject,
    redirect: String,
}

impl ModelShowcase {
    pub fn new(config: &ShowcaseConfig) -> Self {
        Self {
            object: AssetLoadedObject::new(config.model_path.clone(), config.scale, config.rotation_speed),
            redirect: config.redirect.clone(),
        }
    }

    pub fn object(&self) -> &AssetLoadedObject {
        &self.object
    }

    pub fn reload(&mut self, ctx: &mut SceneContext<'_>, path: &str, scale: f32) {
        info!("showcase: reloading {} at scale {}", path, scale);
        self.object.reload(ctx, path, scale);
    }
}

/// Lights that ride along with the camera so the model is lit from
/// whichever side it is viewed
fn camera_rig() -> [Light; 4] {
    let white = hex_rgb(0xffffff);
    let side = Vec3::new(FRAC_PI_4.cos() * 5.0, 0.0, -FRAC_PI_4.sin() * 5.0);
    [
        Light::ambient(white, 1.0),
        Light::point(white, 0.7, Vec3::ZERO, 0.0).attached_to_camera(),
        Light::point(white, 0.5, Vec3::new(-side.x, side.y, side.z), 0.0).attached_to_camera(),
        Light::point(white, 0.5, side, 0.0).attached_to_camera(),
    ]
}

impl SceneContent for ModelShowcase {
    fn name(&self) -> &str {
        "showcase"
    }

    fn build(&mut self, ctx: &mut SceneContext<'_>) {
        ctx.scene.background = Background::Transparent;
        for light in camera_rig() {
            ctx.scene.lights.add(light);
        }
        self.object.start(ctx.assets());
    }

    fn update(&mut self, ctx: &mut SceneContext<'_>, _frame: &FrameInfo) {
        self.object.update(ctx);
    }

    fn pick_target(&self) -> Option<ObjectId> {
        self.object.instance()
    }

    fn pick_action(&self, _hit: &PickHit) -> Option<PickAction> {
        Some(PickAction::Navigate(self.redirect.clone()))
    }

    fn set_hovered(&mut self, _ctx: &mut SceneContext<'_>, hovered: bool) {
        self.object.set_hovered(hovered);
    }

    fn dispose(&mut self, ctx: &mut SceneContext<'_>) {
        self.object.dispose(ctx);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Mount the model band. `on_pick` receives the redirect when the model is
/// clicked; `on_hover` reports pointer enter and leave.
pub fn mount_showcase(
    env: &HostEnvironment,
    container: &Container,
    config: &ShowcaseConfig,
    on_pick: impl Fn(PickAction) + 'static,
    on_hover: impl Fn(bool) + 'static,
) -> SceneHost {
    let host_config = HostConfig {
        camera: config.camera,
        orbit: Some(config.orbit),
        picking: Some(PickingConfig::default()),
    };
    let callbacks = HostCallbacks {
        on_pick: Some(Rc::new(on_pick)),
        on_hover: Some(Rc::new(on_hover)),
    };
    SceneHost::mount(env, container, Box::new(ModelShowcase::new(config)), host_config, callbacks)
}

/// Replace the model of a mounted showcase. Returns false if `host` is not
/// a mounted showcase.
pub fn reload_showcase(host: &SceneHost, path: &str, scale: f32) -> bool {
    host.with_content::<ModelShowcase, _>(|showcase, ctx| showcase.reload(ctx, path, scale))
        .is_some()
}
