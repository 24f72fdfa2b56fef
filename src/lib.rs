//! Vehicle Replay - animated 3D replay of recorded vehicle trajectories
//!
//! A recorded trajectory (chassis and wheel poses plus tire forces per
//! timestep) is replayed as a shadowed scene rendered through wgpu.
//!
//! # Features
//! - Step-hold or shortest-arc sampling of recorded poses
//! - Follow camera with user orbit, zoom and target offsets
//! - Directional light with three-cascade shadow maps
//! - Deferred far-to-near transparency
//! - Frame-by-frame video export with cancellation
//!
//! The rendering core is written against [`backend::GraphicsBackend`], so it
//! runs unchanged on the recording [`backend::DummyBackend`] used in tests.

pub mod app;
pub mod backend;
pub mod config;
pub mod export;
pub mod input;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod trajectory;

pub use app::{AppError, ViewerConfig};
pub use backend::{DummyBackend, GraphicsBackend, WgpuBackend};
pub use config::{Cli, EnvironmentConfig};
pub use export::{export, CancellationToken, ExportSettings, FrameSink};
pub use scene::{Scene, SceneState};
pub use trajectory::{SamplingMode, Trajectory};
