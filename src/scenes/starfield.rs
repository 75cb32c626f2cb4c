use std::any::Any;

use glam::Vec3;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::camera::CameraConfig;
use crate::core::clock::FrameInfo;
use crate::core::window::Container;
use crate::host::{
    DollyMotion, DollyStep, HostCallbacks, HostConfig, HostEnvironment, IdleRotation, OrbitConfig,
    SceneContent, SceneContext, SceneHost,
};
use crate::scene::{
    Background, ObjectId, PointsMaterial, ProceduralPointCloud, Renderable, RenderableObject,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarfieldConfig {
    pub count: usize,
    /// Edge of the cube the points are scattered in
    pub spread: f32,
    pub point_size: f32,
    pub opacity: f32,
    /// Camera travel per frame along its forward axis
    pub dolly_speed: f32,
    /// Travel after which the camera jumps back to its start
    pub travel_limit: f32,
    /// Field spin about +Y, radians per frame
    pub rotation_speed: f32,
    pub camera: CameraConfig,
    pub orbit: OrbitConfig,
    /// Fixed seed for reproducible fields; fresh entropy otherwise
    pub seed: Option<u64>,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            count: 10_000,
            spread: 200.0,
            point_size: 0.5,
            opacity: 0.8,
            dolly_speed: 0.05,
            travel_limit: 210.0,
            rotation_speed: 0.0001,
            camera: CameraConfig::at(75.0, [0.0, 0.0, 10.0]),
            orbit: OrbitConfig {
                enable_damping: true,
                damping_factor: 0.01,
                enable_zoom: false,
                enable_pan: false,
                auto_rotate: true,
                auto_rotate_speed: 0.05,
                ..OrbitConfig::default()
            },
            seed: None,
        }
    }
}

/// Scatter `count` points uniformly in a cube of edge `spread` centred on the
/// origin, each with an independent random colour.
pub fn generate_point_cloud<R: Rng>(
    rng: &mut R,
    count: usize,
    spread: f32,
    material: PointsMaterial,
) -> ProceduralPointCloud {
    let half = spread * 0.5;
    let mut positions = Vec::with_capacity(count);
    let mut colors = Vec::with_capacity(count);
    for _ in 0..count {
        positions.push([
            rng.gen_range(-half..=half),
            rng.gen_range(-half..=half),
            rng.gen_range(-half..=half),
        ]);
        colors.push([rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()]);
    }
    ProceduralPointCloud {
        positions,
        colors,
        material,
    }
}

/// Background field of coloured stars the camera drifts through
pub struct ProceduralField {
    config: StarfieldConfig,
    field: Option<ObjectId>,
    dolly: DollyMotion,
    spin: IdleRotation,
    /// Camera displacement since the last reset
    offset: Vec3,
}

impl StarfieldConfig {
    /// Scatter edge usable as a sampling range. Negative values are taken by
    /// magnitude; non-finite ones fall back to the default.
    pub fn usable_spread(&self) -> f32 {
        if self.spread.is_finite() && self.spread >= 0.0 {
            return self.spread;
        }
        let fallback = if self.spread.is_finite() {
            self.spread.abs()
        } else {
            StarfieldConfig::default().spread
        };
        warn!("starfield: spread {} is unusable, using {}", self.spread, fallback);
        fallback
    }
}

impl ProceduralField {
    pub fn new(mut config: StarfieldConfig) -> Self {
        config.spread = config.usable_spread();
        Self {
            dolly: DollyMotion::new(config.dolly_speed, config.travel_limit),
            spin: IdleRotation::about_y(config.rotation_speed),
            config,
            field: None,
            offset: Vec3::ZERO,
        }
    }

    pub fn field(&self) -> Option<ObjectId> {
        self.field
    }

    pub fn travelled(&self) -> f32 {
        self.dolly.travelled()
    }
}

impl SceneContent for ProceduralField {
    fn name(&self) -> &str {
        "starfield"
    }

    fn build(&mut self, ctx: &mut SceneContext<'_>) {
        ctx.scene.background = Background::Color([0.0, 0.0, 0.0]);

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let material = PointsMaterial {
            size: self.config.point_size,
            opacity: self.config.opacity,
            additive: true,
        };
        let cloud = generate_point_cloud(&mut rng, self.config.count, self.config.spread, material);
        info!("starfield: {} points in a {} cube", cloud.len(), self.config.spread);
        self.field = Some(ctx.insert(RenderableObject::new("stars", Renderable::PointCloud(cloud))));
    }

    fn update(&mut self, ctx: &mut SceneContext<'_>, _frame: &FrameInfo) {
        match self.dolly.tick() {
            DollyStep::Advance(distance) => {
                let step = ctx.scene.camera.forward() * distance;
                ctx.translate_view(step);
                self.offset += step;
            }
            DollyStep::Reset(_) => {
                ctx.translate_view(-self.offset);
                self.offset = Vec3::ZERO;
            }
        }

        if let Some(object) = self.field.and_then(|id| ctx.object_mut(id)) {
            self.spin.step(&mut object.transform.rotation);
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Mount the star field. It has no pick target and registers no picker.
pub fn mount_starfield(env: &HostEnvironment, container: &Container, config: &StarfieldConfig) -> SceneHost {
    let host_config = HostConfig {
        camera: config.camera,
        orbit: Some(config.orbit),
        picking: None,
    };
    SceneHost::mount(
        env,
        container,
        Box::new(ProceduralField::new(config.clone())),
        host_config,
        HostCallbacks::none(),
    )
}
