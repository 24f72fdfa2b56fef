//! Directional caster light and cascaded shadow fitting

use glam::{Mat4, Vec3};

use super::camera::Camera;

/// Number of shadow cascades. Shaders and binding slots assume this value.
pub const CASCADE_COUNT: usize = 3;

/// Default cascade split distances (view-space depth, world units).
pub const DEFAULT_CASCADE_DISTANCES: [f32; CASCADE_COUNT + 1] = [0.1, 10.0, 35.0, 120.0];

/// Directional light that casts shadows (like the sun).
#[derive(Debug, Clone)]
pub struct CasterLight {
    /// Direction the light travels, normalized.
    pub direction: Vec3,
    /// RGB intensity.
    pub intensity: Vec3,
}

impl Default for CasterLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.4, 0.3, -1.0).normalize(),
            intensity: Vec3::ONE,
        }
    }
}

impl CasterLight {
    pub fn new(direction: Vec3, intensity: Vec3) -> Self {
        Self {
            direction: direction.try_normalize().unwrap_or(Vec3::NEG_Z),
            intensity,
        }
    }

    /// World to light space: looking along the light direction from a dummy
    /// origin. Only orientation matters for a directional light; the
    /// cascade projections absorb the translation.
    pub fn view_matrix(&self) -> Mat4 {
        let up = if self.direction.cross(Vec3::Z).length_squared() < 1e-6 {
            Vec3::Y
        } else {
            Vec3::Z
        };
        Mat4::look_at_rh(Vec3::ZERO, self.direction, up)
    }

    /// The 8 corners of the camera frustum slice between `near` and `far`,
    /// in camera view space.
    pub fn frustum_slice_corners(camera: &Camera, near: f32, far: f32) -> [Vec3; 8] {
        let (tx, ty) = (camera.tan_half_fov_x(), camera.tan_half_fov_y());
        let mut corners = [Vec3::ZERO; 8];
        for (i, d) in [near, far].into_iter().enumerate() {
            let (x, y) = (d * tx, d * ty);
            corners[i * 4] = Vec3::new(-x, -y, -d);
            corners[i * 4 + 1] = Vec3::new(x, -y, -d);
            corners[i * 4 + 2] = Vec3::new(-x, y, -d);
            corners[i * 4 + 3] = Vec3::new(x, y, -d);
        }
        corners
    }

    /// Light-space axis-aligned box around one cascade's frustum slice.
    pub fn cascade_box(&self, camera: &Camera, near: f32, far: f32) -> (Vec3, Vec3) {
        let to_light = self.view_matrix() * camera.view_matrix().inverse();
        Self::frustum_slice_corners(camera, near, far)
            .iter()
            .map(|&corner| to_light.transform_point3(corner))
            .fold(
                (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
                |(min, max), p| (min.min(p), max.max(p)),
            )
    }

    /// Orthographic projection tightly bounding a light-space box. Light
    /// space looks down -Z, so the depth range is [-max.z, -min.z].
    pub fn cascade_projection(min: Vec3, max: Vec3) -> Mat4 {
        Mat4::orthographic_rh(min.x, max.x, min.y, max.y, -max.z, -min.z)
    }

    /// One light view-projection per cascade band `[d[i], d[i+1])`.
    pub fn light_space_matrices(
        &self,
        camera: &Camera,
        cascade_distances: &[f32; CASCADE_COUNT + 1],
    ) -> [Mat4; CASCADE_COUNT] {
        let view = self.view_matrix();
        std::array::from_fn(|i| {
            let (min, max) = self.cascade_box(camera, cascade_distances[i], cascade_distances[i + 1]);
            Self::cascade_projection(min, max) * view
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::Position;

    fn tracking_camera() -> Camera {
        let mut camera = Camera::new(45.0, 16.0 / 9.0);
        camera.track_object(&Position::new(12.0, -3.0, 0.5, 0.8, 0.02, 0.0));
        camera
    }

    #[test]
    fn test_cascade_corners_inside_box() {
        let camera = tracking_camera();
        let light = CasterLight::default();
        let to_light = light.view_matrix() * camera.view_matrix().inverse();
        let d = DEFAULT_CASCADE_DISTANCES;

        for i in 0..CASCADE_COUNT {
            let (min, max) = light.cascade_box(&camera, d[i], d[i + 1]);
            for corner in CasterLight::frustum_slice_corners(&camera, d[i], d[i + 1]) {
                let p = to_light.transform_point3(corner);
                assert!(p.cmpge(min).all() && p.cmple(max).all(), "{:?} outside {:?}..{:?}", p, min, max);
            }
        }
    }

    #[test]
    fn test_cascade_corners_inside_clip_volume() {
        let camera = tracking_camera();
        let light = CasterLight::new(Vec3::new(0.3, -0.2, -1.0), Vec3::ONE);
        let d = DEFAULT_CASCADE_DISTANCES;
        let matrices = light.light_space_matrices(&camera, &d);
        let camera_to_world = camera.view_matrix().inverse();

        for (i, matrix) in matrices.iter().enumerate() {
            for corner in CasterLight::frustum_slice_corners(&camera, d[i], d[i + 1]) {
                let clip = matrix.project_point3(camera_to_world.transform_point3(corner));
                let eps = 1e-3;
                assert!(clip.x.abs() <= 1.0 + eps && clip.y.abs() <= 1.0 + eps);
                assert!(clip.z >= -eps && clip.z <= 1.0 + eps, "depth {}", clip.z);
            }
        }
    }

    #[test]
    fn test_vertical_light_uses_fallback_up() {
        let light = CasterLight::new(Vec3::NEG_Z, Vec3::ONE);
        let view = light.view_matrix();
        assert!(view.is_finite());
        let forward = view.transform_vector3(Vec3::NEG_Z);
        assert!(forward.abs_diff_eq(Vec3::NEG_Z, 1e-5));
    }

    #[test]
    fn test_slice_corners_scale_with_depth() {
        let camera = Camera::new(90.0, 1.0);
        let corners = CasterLight::frustum_slice_corners(&camera, 1.0, 4.0);
        assert!(corners[0].abs_diff_eq(Vec3::new(-1.0, -1.0, -1.0), 1e-5));
        assert!(corners[7].abs_diff_eq(Vec3::new(4.0, 4.0, -4.0), 1e-5));
    }
}
