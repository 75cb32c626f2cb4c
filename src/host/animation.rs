//! Per-frame animation records. Each one advances by a fixed amount per
//! frame and is owned by the scene content it animates.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Constant angular velocity in radians per frame, paused while suspended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleRotation {
    pub rate: Vec3,
    suspended: bool,
}

impl IdleRotation {
    pub fn new(rate: Vec3) -> Self {
        Self {
            rate,
            suspended: false,
        }
    }

    pub fn about_y(rate: f32) -> Self {
        Self::new(Vec3::new(0.0, rate, 0.0))
    }

    /// Same rate on every axis
    pub fn tumbling(rate: f32) -> Self {
        Self::new(Vec3::splat(rate))
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn set_suspended(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Advance `rotation` by one frame; returns false while suspended
    pub fn step(&self, rotation: &mut Vec3) -> bool {
        if self.suspended {
            return false;
        }
        *rotation += self.rate;
        true
    }
}

/// Triangle-wave intensity: climbs by `step` until it passes `max`, then
/// falls until it passes `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlowPulse {
    pub step: f32,
    pub min: f32,
    pub max: f32,
    #[serde(skip)]
    intensity: f32,
    #[serde(skip)]
    increasing: bool,
}

impl Default for GlowPulse {
    fn default() -> Self {
        Self::new(0.02, 0.0, 1.5)
    }
}

impl GlowPulse {
    pub fn new(step: f32, min: f32, max: f32) -> Self {
        Self {
            step,
            min,
            max,
            intensity: min,
            increasing: true,
        }
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn is_increasing(&self) -> bool {
        self.increasing
    }

    pub fn tick(&mut self) -> f32 {
        if self.increasing {
            self.intensity += self.step;
            if self.intensity > self.max {
                self.increasing = false;
            }
        } else {
            self.intensity -= self.step;
            if self.intensity < self.min {
                self.increasing = true;
            }
        }
        self.intensity
    }
}

/// Result of one dolly frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DollyStep {
    /// Move forward by this distance
    Advance(f32),
    /// Travel limit crossed: move back by this distance to the start
    Reset(f32),
}

/// Scripted forward camera motion that loops once `travel_limit` is crossed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DollyMotion {
    pub speed: f32,
    pub travel_limit: f32,
    travelled: f32,
}

impl DollyMotion {
    pub fn new(speed: f32, travel_limit: f32) -> Self {
        Self {
            speed,
            travel_limit,
            travelled: 0.0,
        }
    }

    pub fn travelled(&self) -> f32 {
        self.travelled
    }

    pub fn tick(&mut self) -> DollyStep {
        let next = self.travelled + self.speed;
        if next > self.travel_limit {
            let back = self.travelled;
            self.travelled = 0.0;
            DollyStep::Reset(back)
        } else {
            self.travelled = next;
            DollyStep::Advance(self.speed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_rotation_pauses_when_suspended() {
        let mut idle = IdleRotation::about_y(0.005);
        let mut rotation = Vec3::ZERO;
        assert!(idle.step(&mut rotation));
        idle.suspend();
        assert!(!idle.step(&mut rotation));
        idle.resume();
        idle.step(&mut rotation);
        assert!((rotation.y - 0.01).abs() < 1e-7);
        assert_eq!(rotation.x, 0.0);
    }

    #[test]
    fn glow_pulse_turns_around_past_max() {
        let mut pulse = GlowPulse::default();
        let mut peak: f32 = 0.0;
        for _ in 0..200 {
            peak = peak.max(pulse.tick());
        }
        assert!(peak > 1.5 && peak < 1.55, "peak {peak}");
        assert!(pulse.intensity() >= -0.05);
    }

    #[test]
    fn glow_pulse_climbs_back_after_min() {
        let mut pulse = GlowPulse::new(0.5, 0.0, 1.0);
        let values: Vec<f32> = (0..8).map(|_| pulse.tick()).collect();
        assert_eq!(values, vec![0.5, 1.0, 1.5, 1.0, 0.5, 0.0, -0.5, 0.0]);
    }

    #[test]
    fn dolly_resets_past_travel_limit() {
        let mut dolly = DollyMotion::new(1.0, 3.0);
        assert_eq!(dolly.tick(), DollyStep::Advance(1.0));
        assert_eq!(dolly.tick(), DollyStep::Advance(1.0));
        assert_eq!(dolly.tick(), DollyStep::Advance(1.0));
        assert_eq!(dolly.tick(), DollyStep::Reset(3.0));
        assert_eq!(dolly.travelled(), 0.0);
        assert_eq!(dolly.tick(), DollyStep::Advance(1.0));
    }
}
