//! Camera controller system
//!
//! Controllers translate polled input into camera operations once per frame.

use super::camera::{Camera, CameraMovement};
use crate::input::{InputState, Key, MouseButton};

/// Abstract camera controller trait
pub trait CameraController {
    /// Update the camera based on input and delta time
    fn update(&mut self, camera: &mut Camera, input: &InputState, dt: f32);

    /// Get the controller name for debugging
    fn name(&self) -> &'static str;

    /// Reset the controller to default state
    fn reset(&mut self, camera: &mut Camera);
}

/// Follow camera controller
///
/// - Left mouse drag: rotate around the tracked vehicle
/// - Scroll: zoom
/// - W/S, D/A, E/Q: move the target forward/back, right/left, up/down
/// - C: reset all offsets
#[derive(Debug, Clone)]
pub struct FollowController {
    pub rotate_button: MouseButton,
    bindings: [(Key, CameraMovement); 6],
}

impl Default for FollowController {
    fn default() -> Self {
        Self {
            rotate_button: MouseButton::Left,
            bindings: [
                (Key::W, CameraMovement::Forward),
                (Key::S, CameraMovement::Backward),
                (Key::D, CameraMovement::Right),
                (Key::A, CameraMovement::Left),
                (Key::E, CameraMovement::Up),
                (Key::Q, CameraMovement::Down),
            ],
        }
    }
}

impl FollowController {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CameraController for FollowController {
    fn update(&mut self, camera: &mut Camera, input: &InputState, dt: f32) {
        if input.is_button_down(self.rotate_button) {
            let delta = input.mouse_delta();
            if delta.x != 0.0 || delta.y != 0.0 {
                camera.process_mouse_movement(delta.x, delta.y);
            }
        }

        if input.scroll_delta() != 0.0 {
            camera.process_scroll(input.scroll_delta());
        }

        for (key, movement) in self.bindings {
            if input.is_down(key) {
                camera.process_keyboard(movement, dt);
            }
        }

        if input.was_triggered(Key::C) {
            self.reset(camera);
        }
    }

    fn name(&self) -> &'static str {
        "Follow"
    }

    fn reset(&mut self, camera: &mut Camera) {
        camera.reset_offsets();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_rotate_only_while_button_held() {
        let mut camera = Camera::default();
        let mut controller = FollowController::new();
        let mut input = InputState::new();

        input.cursor_moved(Vec2::ZERO);
        input.cursor_moved(Vec2::new(50.0, 0.0));
        controller.update(&mut camera, &input, 0.016);
        assert_eq!(camera.yaw_offset(), 0.0);

        input.end_frame();
        input.mouse_button_event(MouseButton::Left, true);
        input.cursor_moved(Vec2::new(100.0, 0.0));
        controller.update(&mut camera, &input, 0.016);
        assert!(camera.yaw_offset() > 0.0);
    }

    #[test]
    fn test_keys_move_and_reset() {
        let mut camera = Camera::default();
        let mut controller = FollowController::new();
        let mut input = InputState::new();

        input.key_event(Key::E, true);
        controller.update(&mut camera, &input, 0.5);
        assert!(camera.is_offset());

        input.key_event(Key::E, false);
        input.end_frame();
        input.key_event(Key::C, true);
        controller.update(&mut camera, &input, 0.5);
        assert!(!camera.is_offset());
    }

    #[test]
    fn test_scroll_zooms() {
        let mut camera = Camera::default();
        let before = camera.distance();
        let mut input = InputState::new();
        input.scroll(2.0);
        FollowController::new().update(&mut camera, &input, 0.016);
        assert!(camera.distance() < before);
    }
}
