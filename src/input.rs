//! Per-frame keyboard and mouse state.
//!
//! The window layer feeds raw events in; the camera controller and the
//! playback shortcuts poll the state once per frame; [`InputState::end_frame`]
//! then advances every key and button to its next phase.

use std::collections::HashMap;

use glam::Vec2;

/// Keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
    C,
    R,
    L,
    G,
    F,
    Space,
    Home,
    End,
    Plus,
    Minus,
    Left,
    Right,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Lifecycle of a key or button between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Known and idle.
    #[default]
    Registered,
    /// Went down this frame.
    Triggered,
    /// Held down for more than one frame.
    Pressed,
    /// Went up this frame.
    Released,
}

impl Phase {
    pub fn is_down(self) -> bool {
        matches!(self, Phase::Triggered | Phase::Pressed)
    }

    fn advance(self) -> Self {
        match self {
            Phase::Triggered => Phase::Pressed,
            Phase::Released => Phase::Registered,
            other => other,
        }
    }

    fn on_press(self) -> Self {
        // Key repeat arrives as another press while held.
        if self.is_down() {
            self
        } else {
            Phase::Triggered
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputState {
    keys: HashMap<Key, Phase>,
    buttons: HashMap<MouseButton, Phase>,
    cursor: Option<Vec2>,
    mouse_delta: Vec2,
    scroll_delta: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_event(&mut self, key: Key, pressed: bool) {
        let phase = self.keys.entry(key).or_default();
        *phase = if pressed { phase.on_press() } else { Phase::Released };
    }

    pub fn mouse_button_event(&mut self, button: MouseButton, pressed: bool) {
        let phase = self.buttons.entry(button).or_default();
        *phase = if pressed { phase.on_press() } else { Phase::Released };
    }

    /// Record an absolute cursor position; the delta accumulates until `end_frame`.
    pub fn cursor_moved(&mut self, position: Vec2) {
        if let Some(last) = self.cursor {
            self.mouse_delta += position - last;
        }
        self.cursor = Some(position);
    }

    /// Forget the cursor so re-entering the window does not produce a jump.
    pub fn cursor_left(&mut self) {
        self.cursor = None;
    }

    /// Positive values scroll towards the user (zoom in).
    pub fn scroll(&mut self, lines: f32) {
        self.scroll_delta += lines;
    }

    pub fn key_phase(&self, key: Key) -> Phase {
        self.keys.get(&key).copied().unwrap_or_default()
    }

    pub fn button_phase(&self, button: MouseButton) -> Phase {
        self.buttons.get(&button).copied().unwrap_or_default()
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.key_phase(key).is_down()
    }

    pub fn was_triggered(&self, key: Key) -> bool {
        self.key_phase(key) == Phase::Triggered
    }

    pub fn was_released(&self, key: Key) -> bool {
        self.key_phase(key) == Phase::Released
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.button_phase(button).is_down()
    }

    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    pub fn scroll_delta(&self) -> f32 {
        self.scroll_delta
    }

    pub fn end_frame(&mut self) {
        for phase in self.keys.values_mut().chain(self.buttons.values_mut()) {
            *phase = phase.advance();
        }
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = 0.0;
    }

    /// Feed a winit window event. Returns `true` if it was an input event.
    pub fn handle_window_event(&mut self, event: &winit::event::WindowEvent) -> bool {
        use winit::event::{ElementState, MouseScrollDelta, WindowEvent};

        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let winit::keyboard::PhysicalKey::Code(code) = event.physical_key {
                    if let Some(key) = Key::from_winit(code) {
                        self.key_event(key, event.state == ElementState::Pressed);
                    }
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = MouseButton::from_winit(*button) {
                    self.mouse_button_event(button, *state == ElementState::Pressed);
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(Vec2::new(position.x as f32, position.y as f32));
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor_left();
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / 40.0) as f32,
                };
                self.scroll(lines);
                true
            }
            _ => false,
        }
    }
}

impl Key {
    pub fn from_winit(code: winit::keyboard::KeyCode) -> Option<Self> {
        use winit::keyboard::KeyCode;

        Some(match code {
            KeyCode::KeyW => Key::W,
            KeyCode::KeyA => Key::A,
            KeyCode::KeyS => Key::S,
            KeyCode::KeyD => Key::D,
            KeyCode::KeyQ => Key::Q,
            KeyCode::KeyE => Key::E,
            KeyCode::KeyC => Key::C,
            KeyCode::KeyR => Key::R,
            KeyCode::KeyL => Key::L,
            KeyCode::KeyG => Key::G,
            KeyCode::KeyF => Key::F,
            KeyCode::Space => Key::Space,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            KeyCode::Equal | KeyCode::NumpadAdd => Key::Plus,
            KeyCode::Minus | KeyCode::NumpadSubtract => Key::Minus,
            KeyCode::ArrowLeft => Key::Left,
            KeyCode::ArrowRight => Key::Right,
            KeyCode::Escape => Key::Escape,
            _ => return None,
        })
    }
}

impl MouseButton {
    pub fn from_winit(button: winit::event::MouseButton) -> Option<Self> {
        match button {
            winit::event::MouseButton::Left => Some(MouseButton::Left),
            winit::event::MouseButton::Right => Some(MouseButton::Right),
            winit::event::MouseButton::Middle => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_phases() {
        let mut input = InputState::new();
        assert_eq!(input.key_phase(Key::W), Phase::Registered);

        input.key_event(Key::W, true);
        assert!(input.was_triggered(Key::W));
        assert!(input.is_down(Key::W));

        input.end_frame();
        assert_eq!(input.key_phase(Key::W), Phase::Pressed);
        assert!(!input.was_triggered(Key::W));

        // Repeat while held does not re-trigger.
        input.key_event(Key::W, true);
        assert_eq!(input.key_phase(Key::W), Phase::Pressed);

        input.key_event(Key::W, false);
        assert!(input.was_released(Key::W));
        assert!(!input.is_down(Key::W));

        input.end_frame();
        assert_eq!(input.key_phase(Key::W), Phase::Registered);
    }

    #[test]
    fn test_press_and_release_within_frame() {
        let mut input = InputState::new();
        input.key_event(Key::Space, true);
        input.key_event(Key::Space, false);
        assert!(input.was_released(Key::Space));
        input.end_frame();
        assert_eq!(input.key_phase(Key::Space), Phase::Registered);
    }

    #[test]
    fn test_mouse_deltas_reset_each_frame() {
        let mut input = InputState::new();
        input.cursor_moved(Vec2::new(10.0, 10.0));
        assert_eq!(input.mouse_delta(), Vec2::ZERO);

        input.cursor_moved(Vec2::new(13.0, 8.0));
        input.cursor_moved(Vec2::new(15.0, 8.0));
        input.scroll(1.0);
        input.scroll(0.5);
        assert_eq!(input.mouse_delta(), Vec2::new(5.0, -2.0));
        assert_eq!(input.scroll_delta(), 1.5);

        input.end_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        assert_eq!(input.scroll_delta(), 0.0);

        input.cursor_left();
        input.cursor_moved(Vec2::new(100.0, 100.0));
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn test_mouse_buttons() {
        let mut input = InputState::new();
        input.mouse_button_event(MouseButton::Left, true);
        input.end_frame();
        assert!(input.is_button_down(MouseButton::Left));
        assert!(!input.is_button_down(MouseButton::Right));
        input.mouse_button_event(MouseButton::Left, false);
        input.end_frame();
        assert_eq!(input.button_phase(MouseButton::Left), Phase::Registered);
    }
}
