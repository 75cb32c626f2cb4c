use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use super::events::{HostEvent, PointerButton};

/// Press/release pairs further apart than this are drags, not clicks
pub const CLICK_SLOP: f32 = 5.0;

/// Adapter that turns winit window events into [`HostEvent`]s.
///
/// winit has no click event, so one is synthesized when the primary button
/// is released close to where it was pressed.
#[derive(Debug, Clone, Default)]
pub struct WinitInputAdapter {
    /// Current cursor position (relative to window)
    cursor: Option<Vec2>,
    /// Where and with which button the current press started
    press: Option<(Vec2, PointerButton)>,
}

impl WinitInputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    /// Translate one window event. Most produce zero or one host event; a
    /// primary release inside the slop produces `PointerUp` then `Click`.
    pub fn process_event(&mut self, event: &WindowEvent) -> Vec<HostEvent> {
        match event {
            WindowEvent::Resized(size) => vec![HostEvent::Resize {
                width: size.width,
                height: size.height,
            }],
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = (position.x as f32, position.y as f32);
                self.cursor = Some(Vec2::new(x, y));
                vec![HostEvent::PointerMove { x, y }]
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                vec![HostEvent::PointerLeave]
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let (Some(button), Some(at)) = (Self::pointer_button(*button), self.cursor) else {
                    return Vec::new();
                };
                match state {
                    ElementState::Pressed => {
                        self.press = Some((at, button));
                        vec![HostEvent::PointerDown { x: at.x, y: at.y, button }]
                    }
                    ElementState::Released => self.release(at, button),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let Some(at) = self.cursor else {
                    return Vec::new();
                };
                // Positive means scrolling toward the user, as on the web
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y,
                    MouseScrollDelta::PixelDelta(p) => -(p.y as f32),
                };
                vec![HostEvent::Wheel { x: at.x, y: at.y, delta }]
            }
            _ => Vec::new(),
        }
    }

    fn release(&mut self, at: Vec2, button: PointerButton) -> Vec<HostEvent> {
        let mut events = vec![HostEvent::PointerUp { x: at.x, y: at.y, button }];
        if let Some((start, pressed)) = self.press.take() {
            if pressed == button && button == PointerButton::Primary && start.distance(at) <= CLICK_SLOP {
                events.push(HostEvent::Click { x: at.x, y: at.y });
            }
        }
        events
    }

    fn pointer_button(button: MouseButton) -> Option<PointerButton> {
        match button {
            MouseButton::Left => Some(PointerButton::Primary),
            MouseButton::Right => Some(PointerButton::Secondary),
            MouseButton::Middle => Some(PointerButton::Middle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // winit events carry device ids that tests cannot build, so the
    // press/release logic is exercised directly

    #[test]
    fn release_near_press_is_a_click() {
        let mut adapter = WinitInputAdapter::new();
        adapter.press = Some((Vec2::new(10.0, 10.0), PointerButton::Primary));
        let events = adapter.release(Vec2::new(13.0, 12.0), PointerButton::Primary);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], HostEvent::Click { x: 13.0, y: 12.0 });
    }

    #[test]
    fn drag_is_not_a_click() {
        let mut adapter = WinitInputAdapter::new();
        adapter.press = Some((Vec2::new(10.0, 10.0), PointerButton::Primary));
        let events = adapter.release(Vec2::new(60.0, 10.0), PointerButton::Primary);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], HostEvent::PointerUp { .. }));
    }

    #[test]
    fn secondary_release_never_clicks() {
        let mut adapter = WinitInputAdapter::new();
        adapter.press = Some((Vec2::ZERO, PointerButton::Secondary));
        assert_eq!(adapter.release(Vec2::ZERO, PointerButton::Secondary).len(), 1);
    }

    #[test]
    fn new_adapter_has_no_cursor() {
        assert_eq!(WinitInputAdapter::new().cursor(), None);
    }
}
