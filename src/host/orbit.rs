use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::camera::PerspectiveCamera;
use crate::core::events::PointerButton;

/// Orbit control settings. Speeds follow the usual web orbit-control
/// conventions: `auto_rotate_speed` 2.0 is one turn per 30 s at 60 fps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub enable_rotate: bool,
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            enable_rotate: true,
            enable_zoom: true,
            enable_pan: true,
            enable_damping: false,
            damping_factor: 0.05,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: 1.0e6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Rotate(Vec2),
    Pan(Vec2),
}

const MIN_POLAR: f32 = 1.0e-6;

/// Spherical orbit around a target point.
///
/// Pointer input accumulates deltas; `update` applies them to the camera once
/// per frame, decaying them when damping is on.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub config: OrbitConfig,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pan_offset: Vec3,
    drag: Option<Drag>,
    viewport_height: f32,
}

impl OrbitControls {
    pub fn new(mut config: OrbitConfig) -> Self {
        config.min_distance = config.min_distance.max(f32::EPSILON);
        if config.max_distance.is_nan() {
            config.max_distance = f32::INFINITY;
        }
        if config.min_distance > config.max_distance {
            warn!(
                "orbit distance bounds reversed ({} > {}), swapping",
                config.min_distance, config.max_distance
            );
            std::mem::swap(&mut config.min_distance, &mut config.max_distance);
        }
        Self {
            config,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
            drag: None,
            viewport_height: 1.0,
        }
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn pointer_down(&mut self, button: PointerButton, position: Vec2) {
        self.drag = match button {
            PointerButton::Primary if self.config.enable_rotate => Some(Drag::Rotate(position)),
            PointerButton::Secondary if self.config.enable_pan => Some(Drag::Pan(position)),
            _ => None,
        };
    }

    /// Pan needs the camera to know which way is screen-right
    pub fn pointer_move(&mut self, position: Vec2, camera: &PerspectiveCamera) {
        match self.drag {
            Some(Drag::Rotate(last)) => {
                let delta = position - last;
                self.rotate_left(TAU * delta.x / self.viewport_height * self.config.rotate_speed);
                self.rotate_up(TAU * delta.y / self.viewport_height * self.config.rotate_speed);
                self.drag = Some(Drag::Rotate(position));
            }
            Some(Drag::Pan(last)) => {
                let delta = position - last;
                self.pan(delta, camera);
                self.drag = Some(Drag::Pan(position));
            }
            None => {}
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Positive delta zooms out
    pub fn wheel(&mut self, delta: f32) {
        if !self.config.enable_zoom || delta == 0.0 {
            return;
        }
        let zoom = 0.95f32.powf(self.config.zoom_speed);
        if delta > 0.0 {
            self.scale /= zoom;
        } else {
            self.scale *= zoom;
        }
    }

    fn rotate_left(&mut self, angle: f32) {
        self.theta_delta -= angle;
    }

    fn rotate_up(&mut self, angle: f32) {
        self.phi_delta -= angle;
    }

    fn pan(&mut self, delta: Vec2, camera: &PerspectiveCamera) {
        let distance = (camera.position - camera.target).length()
            * (camera.fov_y.to_radians() * 0.5).tan();
        let right = camera.right();
        let up = right.cross(camera.forward());
        let dx = 2.0 * delta.x * distance / self.viewport_height;
        let dy = 2.0 * delta.y * distance / self.viewport_height;
        self.pan_offset += -right * dx + up * dy;
    }

    /// Apply pending motion to the camera. Returns true if it moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        if self.config.auto_rotate && self.drag.is_none() {
            self.rotate_left(TAU / 60.0 / 60.0 * self.config.auto_rotate_speed);
        }

        let offset = camera.position - camera.target;
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return false;
        }
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        let factor = if self.config.enable_damping {
            self.config.damping_factor
        } else {
            1.0
        };
        theta += self.theta_delta * factor;
        phi = (phi + self.phi_delta * factor).clamp(MIN_POLAR, PI - MIN_POLAR);
        let new_radius = (radius * self.scale).clamp(self.config.min_distance, self.config.max_distance);

        let before = camera.position;
        camera.target += self.pan_offset * factor;
        camera.position = camera.target
            + Vec3::new(
                new_radius * phi.sin() * theta.sin(),
                new_radius * phi.cos(),
                new_radius * phi.sin() * theta.cos(),
            );

        if self.config.enable_damping {
            let keep = 1.0 - self.config.damping_factor;
            self.theta_delta *= keep;
            self.phi_delta *= keep;
            self.pan_offset *= keep;
        } else {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        (camera.position - before).length_squared() > 1.0e-12
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraConfig;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(&CameraConfig::at(50.0, [0.0, 0.0, 5.0]), 1.0)
    }

    #[test]
    fn idle_controls_leave_camera_still() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(OrbitConfig::default());
        assert!(!controls.update(&mut cam));
        assert!((cam.position - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn auto_rotate_keeps_distance() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(OrbitConfig {
            auto_rotate: true,
            ..OrbitConfig::default()
        });
        for _ in 0..100 {
            controls.update(&mut cam);
        }
        assert!(cam.position.x.abs() > 0.1);
        assert!(((cam.position - cam.target).length() - 5.0).abs() < 1e-3);
    }

    #[test]
    fn auto_rotate_pauses_during_drag() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(OrbitConfig {
            auto_rotate: true,
            ..OrbitConfig::default()
        });
        controls.pointer_down(PointerButton::Primary, Vec2::ZERO);
        assert!(!controls.update(&mut cam));
    }

    #[test]
    fn drag_rotates_around_target() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(OrbitConfig::default());
        controls.set_viewport_height(400);
        controls.pointer_down(PointerButton::Primary, Vec2::new(100.0, 100.0));
        controls.pointer_move(Vec2::new(150.0, 100.0), &cam);
        controls.pointer_up();
        assert!(controls.update(&mut cam));
        assert!(cam.position.x < 0.0, "dragging right swings the camera left");
        assert!(((cam.position - cam.target).length() - 5.0).abs() < 1e-3);
    }

    #[test]
    fn disabled_zoom_ignores_wheel() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(OrbitConfig {
            enable_zoom: false,
            ..OrbitConfig::default()
        });
        controls.wheel(1.0);
        controls.update(&mut cam);
        assert!((cam.position.z - 5.0).abs() < 1e-5);
    }

    #[test]
    fn wheel_zooms_out() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(OrbitConfig::default());
        controls.wheel(1.0);
        controls.update(&mut cam);
        assert!(cam.position.z > 5.0);
    }

    #[test]
    fn reversed_distance_bounds_are_swapped() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(OrbitConfig {
            min_distance: 8.0,
            max_distance: 2.0,
            ..OrbitConfig::default()
        });
        assert_eq!(controls.config.min_distance, 2.0);
        assert_eq!(controls.config.max_distance, 8.0);
        controls.wheel(1.0);
        controls.update(&mut cam);
        let distance = (cam.position - cam.target).length();
        assert!((2.0..=8.0).contains(&distance));
    }

    #[test]
    fn damping_eases_motion() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(OrbitConfig {
            enable_damping: true,
            damping_factor: 0.1,
            ..OrbitConfig::default()
        });
        controls.set_viewport_height(100);
        controls.pointer_down(PointerButton::Primary, Vec2::ZERO);
        controls.pointer_move(Vec2::new(10.0, 0.0), &cam);
        controls.pointer_up();

        controls.update(&mut cam);
        let first = cam.position;
        controls.update(&mut cam);
        assert!((cam.position - first).length() > 0.0, "motion continues after release");
    }
}
