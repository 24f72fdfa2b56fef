//! Scene management and per-frame orchestration
//!
//! A [`Scene`] owns everything drawn in a frame plus the playback state.
//! Each frame is: update poses from the trajectory, one depth-only pass per
//! shadow cascade, one color pass, then advance the timestep.

pub mod camera;
pub mod camera_controller;
pub mod gizmo;
pub mod light;
pub mod playback;
pub mod skybox;
pub mod vehicle;

pub use camera::*;
pub use camera_controller::*;
pub use gizmo::FrameGizmo;
pub use light::*;
pub use playback::*;
pub use skybox::Skybox;
pub use vehicle::Vehicle;

use glam::{Mat4, Vec3};

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::config::EnvironmentConfig;
use crate::renderer::{
    DepthBuffer, DrawContext, FrameResources, FrameUniform, RenderTarget, ShadowContext,
    ShadowStrategy, ViewParams,
};
use crate::resources::{GeometryBuilder, Material, MaterialData, ModelLoader, Object, TextureRegistry};
use crate::trajectory::Trajectory;

/// Something with GPU resources that draws itself into both pass kinds.
pub trait Renderable {
    /// Create GPU resources. Called once, before the first frame.
    fn initialize(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()>;

    /// Record color-pass draws.
    fn render(&self, ctx: &mut DrawContext);

    /// Record depth-only draws into the active cascade.
    fn render_shadow(&self, ctx: &mut ShadowContext);

    fn cleanup(&mut self, backend: &mut dyn GraphicsBackend);
}

/// Scene lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    Uninitialized,
    /// GPU resources exist but no frame has run yet.
    Initialized,
    Running,
    Paused,
    CleanedUp,
}

impl SceneState {
    pub fn is_live(self) -> bool {
        matches!(self, SceneState::Initialized | SceneState::Running | SceneState::Paused)
    }
}

pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.05, 0.05, 0.08, 1.0];

pub struct Scene {
    state: SceneState,
    camera: Camera,
    light: CasterLight,
    cascade_distances: [f32; CASCADE_COUNT + 1],
    shadow_resolution: u32,
    ground: Object,
    skybox: Skybox,
    gizmo: FrameGizmo,
    show_gizmo: bool,
    vehicles: Vec<Vehicle>,
    textures: TextureRegistry,
    playback: PlaybackController,
    frame: Option<FrameResources>,
    depth: DepthBuffer,
    clear_color: [f32; 4],
}

impl Scene {
    /// Build a scene from an environment description. The first vehicle
    /// replays `trajectory`; models come from `loader` or built-in stand-ins.
    pub fn from_environment(env: &EnvironmentConfig, trajectory: Trajectory, loader: &dyn ModelLoader) -> Self {
        let mut textures = TextureRegistry::new();

        let ground_material = MaterialData::from_material(
            &Material::flat("ground", Vec3::new(0.45, 0.5, 0.42)),
            env.ground.texture.clone(),
        );
        let ground = GeometryBuilder::plane(env.ground.size, env.ground.size, env.ground.uv_repeat)
            .into_model("ground", ground_material);
        let ground = Object::from_model("ground", ground, &mut textures);

        let skybox = match &env.skybox.faces {
            Some(paths) => Skybox::from_files(paths, &mut textures),
            None => Skybox::gradient(&mut textures),
        };

        let chassis = match &env.vehicle.chassis_model {
            Some(path) => Object::load(loader, path, &mut textures),
            None => Vehicle::stand_in_chassis(&mut textures),
        };
        let wheel = match &env.vehicle.wheel_model {
            Some(path) => Object::load(loader, path, &mut textures),
            None => Vehicle::stand_in_wheel(&mut textures),
        };
        let mut vehicle = Vehicle::new("vehicle", trajectory, chassis, wheel, &mut textures)
            .with_sampling(env.playback.sampling);
        vehicle.set_show_forces(env.display.show_forces);

        let camera = Camera::new(env.camera.fov_y_degrees, 16.0 / 9.0).with_distance(
            env.camera.distance,
            env.camera.min_distance,
            env.camera.max_distance,
        );

        let mut playback = PlaybackController::new(env.playback.refresh_rate);
        playback.set_time_rate(env.playback.time_rate);
        playback.set_loop(env.playback.loop_enabled);

        let mut scene = Self {
            state: SceneState::Uninitialized,
            camera,
            light: CasterLight::new(env.light_direction(), env.light_intensity()),
            cascade_distances: env.cascade_distances(),
            shadow_resolution: env.shadows.resolution,
            ground,
            gizmo: FrameGizmo::new(1.5, &mut textures),
            show_gizmo: env.display.show_gizmo,
            skybox,
            vehicles: Vec::new(),
            textures,
            playback,
            frame: None,
            depth: DepthBuffer::new(),
            clear_color: DEFAULT_CLEAR_COLOR,
        };
        scene.add_vehicle(vehicle);
        scene
    }

    /// Add a vehicle before initialization. Playback spans the union of
    /// every trajectory's time range.
    pub fn add_vehicle(&mut self, vehicle: Vehicle) {
        if self.state != SceneState::Uninitialized {
            log::warn!("Vehicle '{}' added after initialization; ignored", vehicle.name());
            return;
        }
        self.vehicles.push(vehicle);

        let times = self
            .vehicles
            .iter()
            .filter_map(|v| Some((v.trajectory().first_time()?, v.trajectory().last_time()?)));
        let range = times.fold(None, |acc: Option<(f64, f64)>, (b, e)| {
            Some(acc.map_or((b, e), |(lo, hi)| (lo.min(b), hi.max(e))))
        });
        if let Some((begin, end)) = range {
            self.playback.set_range(begin, end);
        }
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn light(&self) -> &CasterLight {
        &self.light
    }

    pub fn cascade_distances(&self) -> &[f32; CASCADE_COUNT + 1] {
        &self.cascade_distances
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackController {
        &mut self.playback
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn ground(&self) -> &Object {
        &self.ground
    }

    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    pub fn shadow_strategy(&self) -> Option<ShadowStrategy> {
        self.frame.as_ref().map(FrameResources::shadow_strategy)
    }

    pub fn show_gizmo(&self) -> bool {
        self.show_gizmo
    }

    pub fn toggle_gizmo(&mut self) {
        self.show_gizmo = !self.show_gizmo;
    }

    pub fn toggle_forces(&mut self) {
        for vehicle in &mut self.vehicles {
            let show = !vehicle.show_forces();
            vehicle.set_show_forces(show);
        }
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Allocate every GPU resource the scene needs.
    pub fn initialize(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        if self.state != SceneState::Uninitialized {
            log::warn!("Scene already initialized ({:?})", self.state);
            return Ok(());
        }

        self.skybox.initialize(backend)?;
        let sky = self
            .skybox
            .binding()
            .ok_or_else(|| BackendError::TextureCreationFailed("skybox cube map missing".into()))?;

        let strategy = ShadowStrategy::for_capability(backend.capability(), self.shadow_resolution);
        let color_format = backend.swapchain_format();
        let frame = FrameResources::new(backend, color_format, strategy, sky)?;

        self.textures.initialize(backend, frame.layouts().material)?;
        self.ground.initialize(backend)?;
        self.gizmo.initialize(backend)?;
        for vehicle in &mut self.vehicles {
            vehicle.initialize(backend)?;
        }
        self.frame = Some(frame);

        self.state = SceneState::Initialized;
        log::info!(
            "Scene initialized: {} vehicle(s), {} textures, shadows {:?}",
            self.vehicles.len(),
            self.textures.len(),
            strategy
        );
        Ok(())
    }

    /// Pose every vehicle at the current timestep and follow the first one.
    pub fn update(&mut self) {
        let t = self.playback.timestep();
        for vehicle in &mut self.vehicles {
            vehicle.update(t);
        }
        if let Some(first) = self.vehicles.first() {
            self.camera.track_object(&first.position().chassis);
        }
    }

    /// Record the shadow passes and the color pass into `color`.
    pub fn render(&mut self, backend: &mut dyn GraphicsBackend, color: TextureViewHandle, width: u32, height: u32) {
        if !self.state.is_live() {
            log::warn!("Render skipped: scene is {:?}", self.state);
            return;
        }
        let depth = match self.depth.ensure(backend, width, height) {
            Ok(depth) => depth,
            Err(e) => {
                log::warn!("Render skipped: {}", e);
                return;
            }
        };
        let Some(frame) = self.frame.as_mut() else {
            return;
        };

        let light_space = self.light.light_space_matrices(&self.camera, &self.cascade_distances);
        let casts = frame.shadow_strategy().draws_casters();
        let eye = self.camera.eye_position();
        frame.begin_frame(
            backend,
            &FrameUniform::new(
                self.camera.view_matrix(),
                self.camera.projection_matrix(),
                self.light.direction,
                self.light.intensity,
                eye,
                &self.cascade_distances,
                casts,
            ),
        );

        for cascade in 0..CASCADE_COUNT {
            let Some(mut ctx) = frame.begin_shadow_pass(backend, light_space, cascade) else {
                continue;
            };
            if casts {
                self.ground.render_shadow(&mut ctx);
                for vehicle in &self.vehicles {
                    vehicle.render_shadow(&mut ctx);
                }
            }
            ctx.finish();
        }

        let target = RenderTarget {
            color,
            depth,
            width,
            height,
        };
        let view = ViewParams {
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(),
            light_space,
            eye,
        };
        let mut ctx = frame.begin_color_pass(backend, &self.textures, &target, self.clear_color, view);
        self.skybox.render(&mut ctx);
        if self.show_gizmo {
            self.gizmo.render(&mut ctx);
        }
        self.ground.render(&mut ctx);
        for vehicle in &self.vehicles {
            vehicle.render(&mut ctx);
        }
        ctx.finish();
    }

    pub fn advance(&mut self) {
        self.playback.advance();
    }

    /// One interactive frame: update, render, advance, then report any GPU
    /// errors the frame produced.
    pub fn frame(&mut self, backend: &mut dyn GraphicsBackend, color: TextureViewHandle, width: u32, height: u32) {
        if !self.state.is_live() {
            log::warn!("Frame skipped: scene is {:?}", self.state);
            return;
        }
        self.state = if self.playback.is_paused() {
            SceneState::Paused
        } else {
            SceneState::Running
        };

        self.update();
        self.render(backend, color, width, height);
        self.advance();

        for error in backend.poll_errors() {
            log::warn!("GPU error: {}", error);
        }
    }

    /// Release every GPU resource. The scene cannot be rendered afterwards.
    pub fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        if !self.state.is_live() {
            return;
        }
        for vehicle in &mut self.vehicles {
            vehicle.cleanup(backend);
        }
        self.gizmo.cleanup(backend);
        self.ground.cleanup(backend);
        self.skybox.cleanup(backend);
        self.textures.cleanup(backend);
        self.depth.cleanup(backend);
        if let Some(mut frame) = self.frame.take() {
            frame.cleanup(backend);
        }
        self.state = SceneState::CleanedUp;
        log::info!("Scene cleaned up");
    }

    /// World matrix of the first vehicle's chassis.
    pub fn chassis_matrix(&self) -> Mat4 {
        self.vehicles
            .first()
            .map(|v| v.chassis().model_matrix())
            .unwrap_or(Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::resources::ObjLoader;
    use crate::trajectory::VehiclePosition;

    fn scene() -> Scene {
        let mut a = VehiclePosition::ZERO;
        a.chassis.z = 0.5;
        let mut b = a;
        b.chassis.x = 10.0;
        let trajectory = Trajectory::from_samples(vec![(0.0, a), (2.0, b)]);
        Scene::from_environment(&EnvironmentConfig::default(), trajectory, &ObjLoader::new())
    }

    #[test]
    fn test_playback_spans_trajectory() {
        let scene = scene();
        assert_eq!(scene.playback().begin(), 0.0);
        assert_eq!(scene.playback().end(), 2.0);
    }

    #[test]
    fn test_lifecycle_states() {
        let mut backend = DummyBackend::new(32, 32);
        let mut scene = scene();
        assert_eq!(scene.state(), SceneState::Uninitialized);

        scene.initialize(&mut backend).unwrap();
        assert_eq!(scene.state(), SceneState::Initialized);

        let frame = backend.begin_frame().unwrap();
        scene.frame(&mut backend, frame.swapchain_view, frame.width, frame.height);
        assert_eq!(scene.state(), SceneState::Running);

        scene.playback_mut().play_pause();
        scene.frame(&mut backend, frame.swapchain_view, frame.width, frame.height);
        assert_eq!(scene.state(), SceneState::Paused);

        scene.cleanup(&mut backend);
        assert_eq!(scene.state(), SceneState::CleanedUp);
        assert_eq!(backend.live_buffer_count(), 0);
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_render_before_initialize_is_noop() {
        let mut backend = DummyBackend::new(32, 32);
        let mut scene = scene();
        let frame = backend.begin_frame().unwrap();
        scene.render(&mut backend, frame.swapchain_view, 32, 32);
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_camera_follows_chassis() {
        let mut backend = DummyBackend::new(32, 32);
        let mut scene = scene();
        scene.initialize(&mut backend).unwrap();
        scene.playback_mut().seek(2.0);
        scene.update();
        assert_eq!(scene.camera().target().x, 10.0);
        assert_eq!(scene.chassis_matrix().w_axis.x, 10.0);
    }
}
