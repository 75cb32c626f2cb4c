use std::any::Any;
use std::f32::consts::FRAC_PI_4;
use std::rc::Rc;

use glam::Vec3;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::camera::CameraConfig;
use crate::core::clock::FrameInfo;
use crate::core::window::Container;
use crate::host::{
    GlowPulse, HostCallbacks, HostConfig, HostEnvironment, IdleRotation, ListenerScope,
    OrbitConfig, PickingConfig, SceneContent, SceneContext, SceneHost,
};
use crate::loaders::Pending;
use crate::math::hex_rgb;
use crate::picking::{PickAction, PickHit};
use crate::scene::{
    Background, Fog, Light, LightId, Material, ObjectId, Renderable, RenderableObject,
    TextureData, TexturedCube, CUBE_FACES,
};

const MAINTENANCE_NOTICE: &str = "This part of the site is under maintenance. \
For details on our services please call 09015528576.\n\nThanks for your patience.";

/// Flat colours used until (or instead of) the face images
const FACE_COLORS: [u32; 6] = [0x3f7fbf, 0xbf3f3f, 0x3fbf5f, 0xbfaf3f, 0x8f3fbf, 0x3fafbf];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiceConfig {
    pub size: f32,
    /// One image per face, +X, -X, +Y, -Y, +Z, -Z
    pub face_images: Vec<String>,
    /// Per-face click messages; faces without one use `message`
    pub face_messages: Vec<String>,
    pub message: String,
    /// Rolling speed on every axis, radians per frame
    pub rotation_speed: f32,
    pub glow: GlowPulse,
    /// Emissive intensity as a fraction of the glow
    pub emissive_scale: f32,
    pub emissive_color: u32,
    pub camera: CameraConfig,
    pub orbit: OrbitConfig,
}

impl Default for DiceConfig {
    fn default() -> Self {
        Self {
            size: 4.0,
            face_images: [
                "banneranalytics.png",
                "bannercontent.png",
                "bannerSEO.png",
                "bannersuport.png",
                "bannerwebdesign.png",
                "T.png",
            ]
            .iter()
            .map(|name| format!("assets/images/{}", name))
            .collect(),
            face_messages: Vec::new(),
            message: MAINTENANCE_NOTICE.into(),
            rotation_speed: 0.01,
            glow: GlowPulse::default(),
            emissive_scale: 0.5,
            emissive_color: 0x333333,
            camera: CameraConfig::at(75.0, [0.0, 0.0, 8.0]),
            orbit: OrbitConfig {
                enable_damping: true,
                damping_factor: 0.05,
                enable_zoom: false,
                ..OrbitConfig::default()
            },
        }
    }
}

/// Rolling, glowing cube with a message behind every face
pub struct GlowDice {
    config: DiceConfig,
    dice: Option<ObjectId>,
    glow_light: Option<LightId>,
    rolling: IdleRotation,
    pulse: GlowPulse,
    textures: Vec<(usize, Pending<TextureData>)>,
}

impl GlowDice {
    pub fn new(config: DiceConfig) -> Self {
        Self {
            rolling: IdleRotation::tumbling(config.rotation_speed),
            pulse: config.glow,
            config,
            dice: None,
            glow_light: None,
            textures: Vec::new(),
        }
    }

    pub fn dice(&self) -> Option<ObjectId> {
        self.dice
    }

    pub fn is_rolling(&self) -> bool {
        !self.rolling.is_suspended()
    }

    pub fn glow(&self) -> f32 {
        self.pulse.intensity()
    }

    pub fn pending_textures(&self) -> usize {
        self.textures.len()
    }

    /// Click message for a cube face
    pub fn message_for(&self, face: Option<usize>) -> &str {
        face.and_then(|f| self.config.face_messages.get(f))
            .unwrap_or(&self.config.message)
    }

    fn face_materials(&self) -> Vec<Material> {
        FACE_COLORS
            .iter()
            .zip(CUBE_FACES)
            .map(|(&color, face)| {
                let [r, g, b] = hex_rgb(color);
                Material {
                    name: format!("dice {}", face),
                    base_color: [r, g, b, 1.0],
                    texture: None,
                    emissive: hex_rgb(self.config.emissive_color),
                    emissive_intensity: self.config.emissive_scale,
                }
            })
            .collect()
    }

    /// Attach finished face images. Each arrival re-uploads the cube.
    fn poll_textures(&mut self, ctx: &mut SceneContext<'_>) {
        let Some(id) = self.dice else {
            return;
        };
        let mut attached = false;
        let mut still_pending = Vec::new();
        for (face, mut pending) in self.textures.drain(..) {
            match pending.poll() {
                None => still_pending.push((face, pending)),
                Some(Ok(texture)) => {
                    if let Some(RenderableObject {
                        renderable: Renderable::Cube(cube),
                        ..
                    }) = ctx.object_mut(id)
                    {
                        let index = cube.data.textures.len();
                        cube.data.textures.push(texture);
                        if let Some(material) = cube.face_materials_mut().get_mut(face) {
                            material.texture = Some(index);
                            material.base_color = [1.0, 1.0, 1.0, 1.0];
                        }
                        attached = true;
                    }
                }
                Some(Err(e)) => warn!("dice face {}: {}", CUBE_FACES[face], e),
            }
        }
        self.textures = still_pending;
        if attached {
            ctx.refresh(id);
        }
    }
}

fn dice_lights() -> Vec<Light> {
    let white = hex_rgb(0xffffff);
    vec![
        Light::ambient(hex_rgb(0xaaaaaa), 2.5),
        Light::point(white, 2.0, Vec3::new(5.0, 5.0, 5.0), 100.0),
        Light::spot(hex_rgb(0xffa500), 3.0, Vec3::new(10.0, 10.0, 10.0), 20.0, FRAC_PI_4),
        Light::point(white, 1.0, Vec3::new(-5.0, -5.0, -5.0), 100.0),
        Light::hemisphere(hex_rgb(0xffffbb), hex_rgb(0x080820), 1.0),
        Light::directional(white, 1.0, Vec3::new(5.0, 10.0, 7.0)),
    ]
}

impl SceneContent for GlowDice {
    fn name(&self) -> &str {
        "dice"
    }

    fn build(&mut self, ctx: &mut SceneContext<'_>) {
        ctx.scene.background = Background::Transparent;
        ctx.scene.fog = Some(Fog {
            color: [0.0, 0.0, 0.0],
            near: 1.0,
            far: 20.0,
        });

        for light in dice_lights() {
            ctx.scene.lights.add(light);
        }
        let glow = Light::point(hex_rgb(0xffff99), self.pulse.intensity(), Vec3::new(0.0, 0.0, 8.0), 50.0);
        self.glow_light = Some(ctx.scene.lights.add(glow));

        let cube = TexturedCube::new(self.config.size, self.face_materials(), Vec::new());
        let object = RenderableObject::new("dice", Renderable::Cube(cube)).pickable();
        self.dice = Some(ctx.insert(object));

        if !self.config.face_images.is_empty() && self.config.face_images.len() != CUBE_FACES.len() {
            warn!(
                "dice: {} face images for {} faces, extra faces stay flat",
                self.config.face_images.len(),
                CUBE_FACES.len()
            );
        }
        for (face, path) in self.config.face_images.iter().take(CUBE_FACES.len()).enumerate() {
            self.textures.push((face, ctx.assets().load_texture(path)));
        }
        info!("dice: requested {} face images", self.textures.len());
    }

    fn update(&mut self, ctx: &mut SceneContext<'_>, _frame: &FrameInfo) {
        self.poll_textures(ctx);

        let glow = self.pulse.tick();
        if let Some(light) = self.glow_light.and_then(|id| ctx.scene.lights.get_mut(id)) {
            light.intensity = glow;
        }

        let Some(object) = self.dice.and_then(|id| ctx.object_mut(id)) else {
            return;
        };
        self.rolling.step(&mut object.transform.rotation);
        if let Renderable::Cube(cube) = &mut object.renderable {
            cube.set_emissive_intensity(glow * self.config.emissive_scale);
        }
    }

    fn pick_target(&self) -> Option<ObjectId> {
        self.dice
    }

    fn pick_action(&self, hit: &PickHit) -> Option<PickAction> {
        Some(PickAction::ShowMessage(self.message_for(hit.group).to_string()))
    }

    fn set_hovered(&mut self, _ctx: &mut SceneContext<'_>, hovered: bool) {
        self.rolling.set_suspended(hovered);
    }

    fn dispose(&mut self, _ctx: &mut SceneContext<'_>) {
        if !self.textures.is_empty() {
            debug!("dice: abandoning {} face image loads", self.textures.len());
        }
        self.textures.clear();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Mount the dice. Picking listens on the whole window and is guarded by the
/// container rect, so several dice on one page never answer each other's
/// pointer.
pub fn mount_dice(
    env: &HostEnvironment,
    container: &Container,
    config: &DiceConfig,
    on_pick: impl Fn(PickAction) + 'static,
    on_hover: impl Fn(bool) + 'static,
) -> SceneHost {
    let host_config = HostConfig {
        camera: config.camera,
        orbit: Some(config.orbit),
        picking: Some(PickingConfig {
            scope: ListenerScope::Window,
        }),
    };
    let callbacks = HostCallbacks {
        on_pick: Some(Rc::new(on_pick)),
        on_hover: Some(Rc::new(on_hover)),
    };
    SceneHost::mount(env, container, Box::new(GlowDice::new(config.clone())), host_config, callbacks)
}
