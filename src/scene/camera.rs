//! Third-person follow camera
//!
//! The camera orbits a tracked object. Its orientation is the tracked
//! object's yaw/pitch plus user offsets, and its target is the tracked
//! position plus an offset expressed in the tracked object's frame, so
//! user adjustments stay fixed relative to the vehicle as it turns.

use glam::{Mat3, Mat4, Vec3};

use crate::trajectory::Position;

/// Mouse sensitivity in degrees per pixel.
pub const MOUSE_SENSITIVITY: f32 = 0.1;
/// Target offset speed in world units per second.
pub const MOVE_SPEED: f32 = 2.5;
/// Distance change per scroll line.
pub const ZOOM_STEP: f32 = 0.5;

const DEFAULT_PITCH_OFFSET: f32 = -15.0;
const PITCH_LIMIT: f32 = 89.0;

/// Direction for [`Camera::process_keyboard`], relative to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Right,
    Left,
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct Camera {
    tracked_position: Vec3,
    /// Negated yaw of the tracked object (radians).
    tracked_yaw: f32,
    /// Negated pitch of the tracked object (radians).
    tracked_pitch: f32,

    /// User yaw offset in degrees, kept in [0, 360).
    yaw_offset: f32,
    /// User pitch offset in degrees, kept in [-89, 89].
    pitch_offset: f32,
    /// Target offset in the tracked object's frame.
    target_offset: Vec3,

    distance: f32,
    min_distance: f32,
    max_distance: f32,

    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            tracked_position: Vec3::ZERO,
            tracked_yaw: 0.0,
            tracked_pitch: 0.0,
            yaw_offset: 0.0,
            pitch_offset: DEFAULT_PITCH_OFFSET,
            target_offset: Vec3::ZERO,
            distance: 8.0,
            min_distance: 2.0,
            max_distance: 50.0,
            fov_y: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 500.0,
        }
    }
}

impl Camera {
    pub fn new(fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            ..Default::default()
        }
    }

    /// Set the zoom distance and its bounds. The distance is clamped into
    /// the bounds.
    pub fn with_distance(mut self, distance: f32, min_distance: f32, max_distance: f32) -> Self {
        self.min_distance = min_distance.min(max_distance);
        self.max_distance = max_distance.max(min_distance);
        self.distance = distance.clamp(self.min_distance, self.max_distance);
        self
    }

    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Follow an object's translation and heading. Roll is ignored.
    pub fn track_object(&mut self, position: &Position) {
        self.tracked_position = position.translation();
        self.tracked_yaw = -position.yaw;
        self.tracked_pitch = -position.pitch;
    }

    /// Rotation from the tracked object's frame to world space.
    fn tracked_rotation(&self) -> Mat3 {
        Mat3::from_rotation_z(-self.tracked_yaw) * Mat3::from_rotation_y(-self.tracked_pitch)
    }

    fn yaw(&self) -> f32 {
        self.tracked_yaw + self.yaw_offset.to_radians()
    }

    fn pitch(&self) -> f32 {
        let limit = PITCH_LIMIT.to_radians();
        (self.tracked_pitch + self.pitch_offset.to_radians()).clamp(-limit, limit)
    }

    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw(), self.pitch());
        Vec3::new(
            pitch.cos() * yaw.cos(),
            -pitch.cos() * yaw.sin(),
            pitch.sin(),
        )
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Z).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.front())
    }

    /// Point the camera looks at.
    pub fn target(&self) -> Vec3 {
        self.tracked_position + self.tracked_rotation() * self.target_offset
    }

    pub fn eye_position(&self) -> Vec3 {
        self.target() - self.front() * self.distance
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target(), self.up())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn process_mouse_movement(&mut self, dx: f32, dy: f32) {
        self.yaw_offset = (self.yaw_offset + dx * MOUSE_SENSITIVITY).rem_euclid(360.0);
        self.pitch_offset = (self.pitch_offset - dy * MOUSE_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Positive deltas zoom in.
    pub fn process_scroll(&mut self, delta: f32) {
        self.distance = (self.distance - delta * ZOOM_STEP).clamp(self.min_distance, self.max_distance);
    }

    pub fn process_keyboard(&mut self, movement: CameraMovement, dt: f32) {
        let axis = match movement {
            CameraMovement::Forward => self.front(),
            CameraMovement::Backward => -self.front(),
            CameraMovement::Right => self.right(),
            CameraMovement::Left => -self.right(),
            CameraMovement::Up => self.up(),
            CameraMovement::Down => -self.up(),
        };
        let world_step = axis * MOVE_SPEED * dt;
        self.target_offset += self.tracked_rotation().transpose() * world_step;
    }

    pub fn reset_offsets(&mut self) {
        self.yaw_offset = 0.0;
        self.pitch_offset = DEFAULT_PITCH_OFFSET;
        self.target_offset = Vec3::ZERO;
    }

    /// Whether the user has moved the camera away from its default framing.
    pub fn is_offset(&self) -> bool {
        self.yaw_offset != 0.0
            || self.pitch_offset != DEFAULT_PITCH_OFFSET
            || self.target_offset != Vec3::ZERO
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn distance_limits(&self) -> (f32, f32) {
        (self.min_distance, self.max_distance)
    }

    pub fn yaw_offset(&self) -> f32 {
        self.yaw_offset
    }

    pub fn pitch_offset(&self) -> f32 {
        self.pitch_offset
    }

    pub fn target_offset(&self) -> Vec3 {
        self.target_offset
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    pub fn tan_half_fov_y(&self) -> f32 {
        (self.fov_y * 0.5).tan()
    }

    pub fn tan_half_fov_x(&self) -> f32 {
        self.tan_half_fov_y() * self.aspect
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Update the aspect ratio. Degenerate sizes (minimized windows) are ignored.
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }
}
