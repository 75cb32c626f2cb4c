use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::Ray;

/// Serializable camera parameters. Arrays instead of glam types keep the
/// config file format plain JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 0.0, 5.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

impl CameraConfig {
    pub fn at(fov_y: f32, position: [f32; 3]) -> Self {
        Self {
            fov_y,
            position,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    aspect: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            fov_y: config.fov_y,
            near: config.near,
            far: config.far,
            aspect,
            position: Vec3::from_array(config.position),
            target: Vec3::from_array(config.target),
            up: Vec3::Y,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Recompute the aspect ratio from a viewport size.
    /// Returns false (and leaves the camera untouched) for a zero-sized viewport.
    pub fn set_viewport(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.aspect = width as f32 / height as f32;
        true
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or(Vec3::X)
    }

    /// Move position and target together
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.target += delta;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Camera-to-world transform, used to anchor lights to the camera
    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    /// Ray through a point in normalized device coordinates.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inverse = self.view_projection().inverse();
        // wgpu clip space depth runs 0..1
        let near = inverse.project_point3(ndc.extend(0.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray::new(near, (far - near).normalize_or(self.forward()))
    }
}
