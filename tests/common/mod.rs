//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use vehicle_replay::config::EnvironmentConfig;
use vehicle_replay::export::{ExportError, FrameSink};
use vehicle_replay::resources::ObjLoader;
use vehicle_replay::scene::Scene;
use vehicle_replay::trajectory::{Trajectory, VehiclePosition, FIELD_COUNT};

/// Straight run along +X: `count` samples one second apart, 5 m per second.
pub fn straight_run(count: usize) -> Trajectory {
    let samples = (0..count)
        .map(|i| {
            let mut pose = VehiclePosition::ZERO;
            pose.chassis.x = 5.0 * i as f32;
            pose.chassis.z = 0.5;
            (i as f64, pose)
        })
        .collect();
    Trajectory::from_samples(samples)
}

pub fn scene_with(env: &EnvironmentConfig, trajectory: Trajectory) -> Scene {
    Scene::from_environment(env, trajectory, &ObjLoader::new())
}

pub fn scene(trajectory: Trajectory) -> Scene {
    scene_with(&EnvironmentConfig::default(), trajectory)
}

/// One CSV data line with every field zero except time and chassis x.
pub fn csv_line(time: f64, x: f64) -> String {
    let mut fields = vec!["0".to_string(); FIELD_COUNT];
    fields[0] = time.to_string();
    fields[1] = x.to_string();
    fields.join(",")
}

/// Collects frames in memory; optionally fails after a number of frames.
#[derive(Default)]
pub struct MemorySink {
    pub frames: Vec<Vec<u8>>,
    pub finished: bool,
    pub fail_after: Option<usize>,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), ExportError> {
        if self.fail_after == Some(self.frames.len()) {
            return Err(ExportError::Write(std::io::ErrorKind::BrokenPipe.into()));
        }
        self.frames.push(rgba.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        self.finished = true;
        Ok(())
    }
}
