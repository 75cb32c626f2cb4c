use glam::Vec3;

use crate::camera::PerspectiveCamera;

/// Light shapes. Positions are in the space named by the light's anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    /// Parallel rays shining from `position` toward the origin
    Directional { position: Vec3 },
    /// Radiates from a point; zero `range` means no cutoff
    Point { position: Vec3, range: f32 },
    /// Cone from `position` toward `target`, half-angle `angle` in radians
    Spot { position: Vec3, target: Vec3, range: f32, angle: f32 },
    /// Sky colour is the light colour, blended to `ground` by normal.y
    Hemisphere { ground: [f32; 3] },
}

/// Where a light's coordinates are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightAnchor {
    #[default]
    World,
    /// Relative to the camera; follows it as it orbits
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    pub anchor: LightAnchor,
}

impl Light {
    fn world(kind: LightKind, color: [f32; 3], intensity: f32) -> Self {
        Self {
            kind,
            color,
            intensity,
            anchor: LightAnchor::World,
        }
    }

    pub fn ambient(color: [f32; 3], intensity: f32) -> Self {
        Self::world(LightKind::Ambient, color, intensity)
    }

    pub fn directional(color: [f32; 3], intensity: f32, position: Vec3) -> Self {
        Self::world(LightKind::Directional { position }, color, intensity)
    }

    pub fn point(color: [f32; 3], intensity: f32, position: Vec3, range: f32) -> Self {
        Self::world(LightKind::Point { position, range }, color, intensity)
    }

    pub fn spot(color: [f32; 3], intensity: f32, position: Vec3, range: f32, angle: f32) -> Self {
        Self::world(
            LightKind::Spot {
                position,
                target: Vec3::ZERO,
                range,
                angle,
            },
            color,
            intensity,
        )
    }

    pub fn hemisphere(sky: [f32; 3], ground: [f32; 3], intensity: f32) -> Self {
        Self::world(LightKind::Hemisphere { ground }, sky, intensity)
    }

    pub fn attached_to_camera(mut self) -> Self {
        self.anchor = LightAnchor::Camera;
        self
    }

    /// This light expressed in world space for the given camera
    pub fn resolve(&self, camera: &PerspectiveCamera) -> Light {
        if self.anchor == LightAnchor::World {
            return *self;
        }
        let to_world = camera.world_matrix();
        let kind = match self.kind {
            LightKind::Directional { position } => LightKind::Directional {
                position: to_world.transform_point3(position),
            },
            LightKind::Point { position, range } => LightKind::Point {
                position: to_world.transform_point3(position),
                range,
            },
            LightKind::Spot { position, target, range, angle } => LightKind::Spot {
                position: to_world.transform_point3(position),
                target: to_world.transform_point3(target),
                range,
                angle,
            },
            other => other,
        };
        Light {
            kind,
            anchor: LightAnchor::World,
            ..*self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightId(usize);

#[derive(Debug, Clone, Default)]
pub struct LightRig {
    lights: Vec<Light>,
}

impl LightRig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, light: Light) -> LightId {
        self.lights.push(light);
        LightId(self.lights.len() - 1)
    }

    pub fn get(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id.0)
    }

    pub fn get_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    /// Every light in world space for this frame
    pub fn resolve(&self, camera: &PerspectiveCamera) -> Vec<Light> {
        self.lights.iter().map(|l| l.resolve(camera)).collect()
    }
}
