//! World-axis gizmo: red X, green Y, blue Z arrows at the origin

use glam::{Mat4, Quat, Vec3};

use super::Renderable;
use crate::backend::traits::*;
use crate::renderer::{DrawContext, ShadowContext};
use crate::resources::{GeometryBuilder, Material, MaterialData, Object, TextureRegistry};

pub struct FrameGizmo {
    axes: [Object; 3],
    length: f32,
}

impl FrameGizmo {
    pub fn new(length: f32, textures: &mut TextureRegistry) -> Self {
        let axis = |name: &str, color: Vec3, textures: &mut TextureRegistry| {
            let arrow = GeometryBuilder::arrow(0.02, 0.06, 0.15)
                .into_model(name, MaterialData::from_material(&Material::flat(name, color), None));
            Object::from_model(name, arrow, textures)
        };
        Self {
            axes: [
                axis("gizmo_x", Vec3::X, textures),
                axis("gizmo_y", Vec3::Y, textures),
                axis("gizmo_z", Vec3::Z, textures),
            ],
            length,
        }
    }

    /// Placement of the +Z arrow model for each world axis.
    fn axis_matrices(&self) -> [Mat4; 3] {
        let scale = Vec3::splat(self.length);
        [Vec3::X, Vec3::Y, Vec3::Z].map(|axis| {
            Mat4::from_scale_rotation_translation(scale, Quat::from_rotation_arc(Vec3::Z, axis), Vec3::ZERO)
        })
    }
}

impl Renderable for FrameGizmo {
    fn initialize(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        for axis in &mut self.axes {
            axis.initialize(backend)?;
        }
        Ok(())
    }

    fn render(&self, ctx: &mut DrawContext) {
        for (axis, model) in self.axes.iter().zip(self.axis_matrices()) {
            axis.render_with(ctx, model);
        }
    }

    /// Overlay geometry; it casts no shadows.
    fn render_shadow(&self, _ctx: &mut ShadowContext) {}

    fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        for axis in &mut self.axes {
            axis.cleanup(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axes_point_along_world_axes() {
        let mut textures = TextureRegistry::new();
        let gizmo = FrameGizmo::new(2.0, &mut textures);
        let tips: Vec<Vec3> = gizmo
            .axis_matrices()
            .iter()
            .map(|m| m.transform_point3(Vec3::Z))
            .collect();
        assert!(tips[0].abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
        assert!(tips[1].abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
        assert!(tips[2].abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-5));
    }
}
