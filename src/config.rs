//! Command line and environment file configuration
//!
//! The environment file is TOML. Every section and field is optional;
//! relative paths are resolved against the directory holding the file.
//!
//! ```toml
//! [light]
//! direction = [-0.4, 0.3, -1.0]
//!
//! [shadows]
//! cascade_distances = [0.1, 10.0, 35.0, 120.0]
//!
//! [vehicle]
//! trajectory = "runs/lap.csv"
//! chassis_model = "models/chassis.obj"
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

use crate::renderer::DEFAULT_SHADOW_RESOLUTION;
use crate::scene::light::{CASCADE_COUNT, DEFAULT_CASCADE_DISTANCES};
use crate::trajectory::SamplingMode;

/// Accepted `playback.refresh_rate` range, in ticks per second.
pub const REFRESH_RATE_RANGE: std::ops::RangeInclusive<f64> = 1.0..=1000.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("cascade_distances must be {expected} strictly increasing positive values, got {found:?}")]
    CascadeDistances { expected: usize, found: Vec<f32> },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("no trajectory given: pass -v/--vehicle or set [vehicle] trajectory in the environment file")]
    MissingTrajectory,
}

/// Replays a recorded vehicle trajectory in 3D.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "vehicle-replay",
    about = "Replay a recorded vehicle trajectory with cascaded shadows",
    long_about = "Replay a recorded vehicle trajectory with cascaded shadows.\n\n\
        KEYS:\n  \
        Space      play / pause\n  \
        R          restart\n  \
        Home/End   jump to start / end\n  \
        +/-        faster / slower\n  \
        Left/Right seek 1 s\n  \
        L          toggle looping\n  \
        G          toggle axis gizmo\n  \
        F          toggle tire-force arrows\n  \
        W/A/S/D/Q/E  move camera target, C resets\n  \
        Left mouse drag   orbit, wheel zoom\n  \
        Esc        quit",
    version
)]
pub struct Cli {
    /// Vehicle trajectory file (CSV). Overrides the environment file.
    #[arg(short = 'v', long = "vehicle", value_name = "FILE")]
    pub vehicle: Option<PathBuf>,

    /// Environment description (TOML).
    #[arg(short = 'e', long = "env", value_name = "FILE")]
    pub env: Option<PathBuf>,

    /// Render the whole trajectory to a video file and exit.
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Exported video width in pixels.
    #[arg(long, default_value = "1280")]
    pub export_width: u32,

    /// Exported video height in pixels.
    #[arg(long, default_value = "720")]
    pub export_height: u32,

    /// Exported video frame rate.
    #[arg(long, default_value = "30")]
    pub export_fps: u32,

    /// Initial window width in pixels.
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Initial window height in pixels.
    #[arg(long, default_value = "720")]
    pub height: u32,

    /// Disable vertical sync.
    #[arg(long)]
    pub no_vsync: bool,
}

impl Cli {
    /// Load the environment file, if any, and apply command-line overrides.
    pub fn environment(&self) -> Result<EnvironmentConfig, ConfigError> {
        let mut env = match &self.env {
            Some(path) => EnvironmentConfig::load(path)?,
            None => EnvironmentConfig::default(),
        };
        if let Some(vehicle) = &self.vehicle {
            env.vehicle.trajectory = Some(vehicle.clone());
        }
        Ok(env)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightConfig {
    /// Direction the light travels.
    pub direction: [f32; 3],
    pub intensity: [f32; 3],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: [-0.4, 0.3, -1.0],
            intensity: [1.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShadowConfig {
    pub cascade_distances: Vec<f32>,
    /// Edge length of each cascade's depth map.
    pub resolution: u32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            cascade_distances: DEFAULT_CASCADE_DISTANCES.to_vec(),
            resolution: DEFAULT_SHADOW_RESOLUTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroundConfig {
    pub texture: Option<PathBuf>,
    /// Edge length of the square ground plane.
    pub size: f32,
    pub uv_repeat: f32,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            texture: None,
            size: 400.0,
            uv_repeat: 100.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkyboxConfig {
    /// Face images in the order +X, -X, +Y, -Y, +Z, -Z.
    pub faces: Option<[PathBuf; 6]>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VehicleConfig {
    pub trajectory: Option<PathBuf>,
    pub chassis_model: Option<PathBuf>,
    pub wheel_model: Option<PathBuf>,
    /// Models are authored Y-up and need rotating into the Z-up world.
    pub y_up: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    /// Ticks per second of the playback timer.
    pub refresh_rate: f64,
    pub time_rate: f64,
    pub loop_enabled: bool,
    pub sampling: SamplingMode,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            refresh_rate: 60.0,
            time_rate: 1.0,
            loop_enabled: true,
            sampling: SamplingMode::StepHold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub fov_y_degrees: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 8.0,
            min_distance: 2.0,
            max_distance: 50.0,
            fov_y_degrees: 45.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub show_gizmo: bool,
    pub show_forces: bool,
}

/// Contents of the environment file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub light: LightConfig,
    pub shadows: ShadowConfig,
    pub ground: GroundConfig,
    pub skybox: SkyboxConfig,
    pub vehicle: VehicleConfig,
    pub playback: PlaybackConfig,
    pub camera: CameraConfig,
    pub display: DisplayConfig,
}

impl EnvironmentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        log::info!("Loaded environment {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text. Paths are left as written.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.shadows.cascade_distances;
        let increasing = d.windows(2).all(|w| w[0] < w[1]);
        if d.len() != CASCADE_COUNT + 1 || !increasing || d.iter().any(|&v| v <= 0.0) {
            return Err(ConfigError::CascadeDistances {
                expected: CASCADE_COUNT + 1,
                found: d.clone(),
            });
        }
        if !REFRESH_RATE_RANGE.contains(&self.playback.refresh_rate) {
            return Err(ConfigError::Invalid {
                field: "playback.refresh_rate",
                reason: format!(
                    "must be between {} and {}",
                    REFRESH_RATE_RANGE.start(),
                    REFRESH_RATE_RANGE.end()
                ),
            });
        }
        if self.camera.min_distance <= 0.0 || self.camera.min_distance > self.camera.max_distance {
            return Err(ConfigError::Invalid {
                field: "camera.min_distance",
                reason: "must be positive and not above max_distance".into(),
            });
        }
        if self.ground.size <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "ground.size",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Make every relative path absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        for path in [
            self.ground.texture.as_mut(),
            self.vehicle.trajectory.as_mut(),
            self.vehicle.chassis_model.as_mut(),
            self.vehicle.wheel_model.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
        if let Some(faces) = self.skybox.faces.as_mut() {
            faces.iter_mut().for_each(resolve);
        }
    }

    /// Validated cascade split distances.
    pub fn cascade_distances(&self) -> [f32; CASCADE_COUNT + 1] {
        self.shadows
            .cascade_distances
            .as_slice()
            .try_into()
            .unwrap_or(DEFAULT_CASCADE_DISTANCES)
    }

    pub fn light_direction(&self) -> Vec3 {
        Vec3::from(self.light.direction)
    }

    pub fn light_intensity(&self) -> Vec3 {
        Vec3::from(self.light.intensity)
    }

    pub fn trajectory_path(&self) -> Result<&Path, ConfigError> {
        self.vehicle.trajectory.as_deref().ok_or(ConfigError::MissingTrajectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = EnvironmentConfig::parse("").unwrap();
        assert_eq!(config, EnvironmentConfig::default());
        assert_eq!(config.cascade_distances(), DEFAULT_CASCADE_DISTANCES);
        assert_eq!(config.playback.sampling, SamplingMode::StepHold);
    }

    #[test]
    fn test_partial_sections() {
        let config = EnvironmentConfig::parse(
            r#"
            [playback]
            time_rate = 0.5
            sampling = "shortest_arc"

            [display]
            show_forces = true
            "#,
        )
        .unwrap();
        assert_eq!(config.playback.time_rate, 0.5);
        assert_eq!(config.playback.refresh_rate, 60.0);
        assert_eq!(config.playback.sampling, SamplingMode::ShortestArc);
        assert!(config.display.show_forces);
        assert!(!config.display.show_gizmo);
    }

    #[test]
    fn test_cascade_distances_validated() {
        for bad in [
            "cascade_distances = [0.1, 10.0, 35.0]",
            "cascade_distances = [0.1, 35.0, 10.0, 120.0]",
            "cascade_distances = [0.0, 10.0, 35.0, 120.0]",
        ] {
            let err = EnvironmentConfig::parse(&format!("[shadows]\n{}", bad)).unwrap_err();
            assert!(matches!(err, ConfigError::CascadeDistances { .. }), "{}", bad);
        }
    }

    #[test]
    fn test_refresh_rate_range() {
        for bad in ["0.0", "-30.0", "1e-300", "nan", "inf", "5000.0"] {
            let err = EnvironmentConfig::parse(&format!("[playback]\nrefresh_rate = {}", bad)).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { field: "playback.refresh_rate", .. }),
                "{}",
                bad
            );
        }
        let config = EnvironmentConfig::parse("[playback]\nrefresh_rate = 1.0").unwrap();
        assert_eq!(config.playback.refresh_rate, 1.0);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            EnvironmentConfig::parse("[light]\ncolour = [1, 1, 1]"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_relative_paths_resolve_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[vehicle]\ntrajectory = \"runs/lap.csv\"\nchassis_model = \"/abs/car.obj\"").unwrap();

        let config = EnvironmentConfig::load(&path).unwrap();
        assert_eq!(config.vehicle.trajectory, Some(dir.path().join("runs/lap.csv")));
        assert_eq!(config.vehicle.chassis_model, Some(PathBuf::from("/abs/car.obj")));
    }

    #[test]
    fn test_cli_vehicle_overrides_environment() {
        let cli = Cli::parse_from(["vehicle-replay", "-v", "other.csv"]);
        let env = cli.environment().unwrap();
        assert_eq!(env.trajectory_path().unwrap(), Path::new("other.csv"));

        let cli = Cli::parse_from(["vehicle-replay"]);
        assert!(matches!(
            cli.environment().unwrap().trajectory_path(),
            Err(ConfigError::MissingTrajectory)
        ));
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["vehicle-replay", "--export-fps", "fast"]).is_err());
        assert!(Cli::try_parse_from(["vehicle-replay", "-v"]).is_err());
    }
}
