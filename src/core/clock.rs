use std::time::Instant;

/// Per-frame timing handed to every frame callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Monotonic frame counter, starting at 1
    pub number: u64,
    /// Seconds since the clock started
    pub time: f32,
    /// Seconds since the previous frame
    pub delta: f32,
}

/// Tracks delta time between frames.
/// Scene animation is frame-counted, so delta is informational only.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_tick: Instant,
    frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frame: 0,
        }
    }

    /// Advance to the next frame
    pub fn tick(&mut self) -> FrameInfo {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.frame += 1;
        FrameInfo {
            number: self.frame,
            time: now.duration_since(self.start).as_secs_f32(),
            delta,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
