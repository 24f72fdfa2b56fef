//! A replayed vehicle: chassis, four wheels and optional tire-force arrows

use glam::{Mat4, Quat, Vec3};

use super::Renderable;
use crate::backend::traits::*;
use crate::renderer::{DrawContext, ShadowContext};
use crate::resources::{GeometryBuilder, Material, MaterialData, Object, TextureRegistry};
use crate::trajectory::{SamplingMode, Trajectory, VehiclePosition, Wheel};

/// Arrow length per newton of tire force.
pub const FORCE_SCALE: f32 = 1.0 / 2000.0;

/// Forces shorter than this are not drawn.
const MIN_FORCE: f32 = 1e-3;

const WHEEL_RADIUS: f32 = 0.33;
const WHEEL_WIDTH: f32 = 0.22;

pub struct Vehicle {
    name: String,
    trajectory: Trajectory,
    sampling: SamplingMode,
    position: VehiclePosition,
    chassis: Object,
    /// One wheel model drawn at each of the four wheel poses.
    wheel: Object,
    arrow: Object,
    show_forces: bool,
}

impl Vehicle {
    pub fn new(
        name: &str,
        trajectory: Trajectory,
        chassis: Object,
        wheel: Object,
        textures: &mut TextureRegistry,
    ) -> Self {
        let arrow = GeometryBuilder::arrow(0.03, 0.08, 0.2).into_model(
            "force_arrow",
            MaterialData::from_material(&Material::flat("force", Vec3::new(0.9, 0.2, 0.1)), None),
        );
        let position = trajectory
            .first_time()
            .map(|t| trajectory.query_at(t))
            .unwrap_or(VehiclePosition::ZERO);

        Self {
            name: name.to_string(),
            trajectory,
            sampling: SamplingMode::default(),
            position,
            chassis,
            wheel,
            arrow: Object::from_model("force_arrow", arrow, textures),
            show_forces: false,
        }
    }

    /// Box chassis used when no chassis model is configured.
    pub fn stand_in_chassis(textures: &mut TextureRegistry) -> Object {
        let body = GeometryBuilder::cuboid(Vec3::new(4.2, 1.8, 0.7)).into_model(
            "chassis",
            MaterialData::from_material(&Material::paint(Vec3::new(0.1, 0.3, 0.7)), None),
        );
        Object::from_model("chassis", body, textures)
    }

    /// Cylinder wheel used when no wheel model is configured.
    pub fn stand_in_wheel(textures: &mut TextureRegistry) -> Object {
        let tire = GeometryBuilder::cylinder(WHEEL_RADIUS, WHEEL_WIDTH, 24)
            .into_model("wheel", MaterialData::from_material(&Material::rubber(), None));
        Object::from_model("wheel", tire, textures)
    }

    pub fn with_sampling(mut self, sampling: SamplingMode) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn position(&self) -> &VehiclePosition {
        &self.position
    }

    pub fn show_forces(&self) -> bool {
        self.show_forces
    }

    pub fn set_show_forces(&mut self, show: bool) {
        self.show_forces = show;
    }

    pub fn chassis(&self) -> &Object {
        &self.chassis
    }

    pub fn wheel(&self) -> &Object {
        &self.wheel
    }

    /// Pose the vehicle at playback time `t`.
    pub fn update(&mut self, t: f64) {
        self.position = self.trajectory.sample(t, self.sampling);
        self.chassis.set_model_matrix(self.position.chassis.to_matrix());
    }

    /// Arrow placement for a force applied at `origin`: the unit +Z arrow
    /// rotated onto the force and stretched to its scaled magnitude.
    pub fn force_arrow_matrix(origin: Vec3, force: Vec3) -> Option<Mat4> {
        let magnitude = force.length();
        if magnitude < MIN_FORCE {
            return None;
        }
        let rotation = Quat::from_rotation_arc(Vec3::Z, force / magnitude);
        let length = magnitude * FORCE_SCALE;
        Some(Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 1.0, length),
            rotation,
            origin,
        ))
    }
}

impl Renderable for Vehicle {
    fn initialize(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        self.chassis.initialize(backend)?;
        self.wheel.initialize(backend)?;
        self.arrow.initialize(backend)?;
        Ok(())
    }

    fn render(&self, ctx: &mut DrawContext) {
        self.chassis.render(ctx);
        for wheel in Wheel::ALL {
            self.wheel.render_with(ctx, self.position.wheel_matrix(wheel));
        }
        if self.show_forces {
            for wheel in Wheel::ALL {
                let i = wheel.index();
                let origin = self.position.wheels[i].translation();
                if let Some(model) = Self::force_arrow_matrix(origin, self.position.forces[i]) {
                    self.arrow.render_with(ctx, model);
                }
            }
        }
    }

    fn render_shadow(&self, ctx: &mut ShadowContext) {
        self.chassis.render_shadow(ctx);
        for wheel in Wheel::ALL {
            self.wheel.render_shadow_with(ctx, self.position.wheel_matrix(wheel));
        }
    }

    fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        self.chassis.cleanup(backend);
        self.wheel.cleanup(backend);
        self.arrow.cleanup(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::Position;
    use approx::assert_relative_eq;

    fn two_sample_trajectory() -> Trajectory {
        let mut first = VehiclePosition::ZERO;
        first.chassis = Position::new(0.0, 0.0, 0.5, 0.0, 0.0, 0.0);
        let mut second = first;
        second.chassis.x = 10.0;
        second.forces[0] = Vec3::new(0.0, 0.0, 4000.0);
        Trajectory::from_samples(vec![(0.0, first), (1.0, second)])
    }

    #[test]
    fn test_update_moves_chassis() {
        let mut textures = TextureRegistry::new();
        let chassis = Vehicle::stand_in_chassis(&mut textures);
        let wheel = Vehicle::stand_in_wheel(&mut textures);
        let mut vehicle = Vehicle::new("car", two_sample_trajectory(), chassis, wheel, &mut textures);

        vehicle.update(0.5);
        assert_eq!(vehicle.position().chassis.x, 0.0);
        vehicle.update(1.5);
        assert_eq!(vehicle.position().chassis.x, 10.0);
        let origin = vehicle.chassis().model_matrix().transform_point3(Vec3::ZERO);
        assert_relative_eq!(origin.x, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_force_arrow_points_along_force() {
        let origin = Vec3::new(1.0, 2.0, 0.0);
        let model = Vehicle::force_arrow_matrix(origin, Vec3::new(2000.0, 0.0, 0.0)).unwrap();
        let tip = model.transform_point3(Vec3::Z);
        assert_relative_eq!(tip.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(tip.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(tip.z, 0.0, epsilon = 1e-5);

        assert!(Vehicle::force_arrow_matrix(origin, Vec3::ZERO).is_none());
    }
}
