//! Time-indexed vehicle poses loaded from a recorded simulation.
//!
//! Files are comma separated. The first line is a header and is skipped.
//! Every data line holds [`FIELD_COUNT`] numbers:
//!
//! ```text
//! time, chassis x, y, z, yaw, pitch, roll,
//! then for FL, FR, RL, RR: x, y, z, spin, steer, fx, fy, fz
//! ```

use std::f32::consts::{PI, TAU};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use glam::Vec3;
use thiserror::Error;

use super::position::{Position, VehiclePosition, Wheel, WHEEL_COUNT};

/// Fields on every data line.
pub const FIELD_COUNT: usize = 1 + 6 + WHEEL_COUNT * FIELDS_PER_WHEEL;

const FIELDS_PER_WHEEL: usize = 8;

/// Errors raised while reading a trajectory. Line numbers are 1-based and
/// count the header.
#[derive(Error, Debug)]
pub enum TrajectoryError {
    #[error("Failed to read trajectory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Line {line}, column {column}: '{value}' is not a number")]
    InvalidNumber {
        line: usize,
        column: usize,
        value: String,
    },
    #[error("Line {line}: time {time} does not increase")]
    NonIncreasingTime { line: usize, time: f64 },
}

/// How poses between recorded samples are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Hold the latest sample at or before the query time.
    #[default]
    StepHold,
    /// Blend the bracketing samples, taking angles the short way round.
    ShortestArc,
}

/// Outcome of loading a trajectory: whatever parsed cleanly, plus the error
/// that stopped parsing, if any.
#[derive(Debug)]
pub struct TrajectoryLoad {
    pub trajectory: Trajectory,
    pub error: Option<TrajectoryError>,
}

impl TrajectoryLoad {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Samples ordered by strictly increasing time.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    samples: Vec<(f64, VehiclePosition)>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from samples already sorted by strictly increasing time.
    pub fn from_samples(samples: Vec<(f64, VehiclePosition)>) -> Self {
        debug_assert!(samples.windows(2).all(|w| w[0].0 < w[1].0));
        Self { samples }
    }

    /// Read a trajectory file.
    ///
    /// A file that cannot be opened gives an empty trajectory and the I/O
    /// error. A malformed line ends parsing; earlier samples are kept.
    pub fn load(path: impl AsRef<Path>) -> TrajectoryLoad {
        let path = path.as_ref();
        match std::fs::File::open(path) {
            Ok(file) => {
                let result = Self::parse(std::io::BufReader::new(file));
                log::info!(
                    "Loaded {} trajectory samples from {}",
                    result.trajectory.len(),
                    path.display()
                );
                result
            }
            Err(source) => TrajectoryLoad {
                trajectory: Self::new(),
                error: Some(TrajectoryError::Io {
                    path: path.to_path_buf(),
                    source,
                }),
            },
        }
    }

    /// Parse trajectory text from any buffered reader.
    pub fn parse<R: BufRead>(reader: R) -> TrajectoryLoad {
        let mut trajectory = Self::new();

        for (index, line) in reader.lines().enumerate().skip(1) {
            let line_number = index + 1;
            let line = match line {
                Ok(line) => line,
                Err(source) => {
                    return TrajectoryLoad {
                        trajectory,
                        error: Some(TrajectoryError::Io {
                            path: PathBuf::new(),
                            source,
                        }),
                    }
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line, line_number) {
                Ok((time, pose)) => {
                    if let Some(last) = trajectory.last_time() {
                        if time <= last {
                            return TrajectoryLoad {
                                trajectory,
                                error: Some(TrajectoryError::NonIncreasingTime {
                                    line: line_number,
                                    time,
                                }),
                            };
                        }
                    }
                    trajectory.samples.push((time, pose));
                }
                Err(error) => {
                    log::warn!("Trajectory parsing stopped: {}", error);
                    return TrajectoryLoad {
                        trajectory,
                        error: Some(error),
                    };
                }
            }
        }

        TrajectoryLoad {
            trajectory,
            error: None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first_time(&self) -> Option<f64> {
        self.samples.first().map(|(t, _)| *t)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.samples.last().map(|(t, _)| *t)
    }

    pub fn samples(&self) -> impl Iterator<Item = &(f64, VehiclePosition)> {
        self.samples.iter()
    }

    /// Index of the greatest sample time <= `t`.
    fn index_at(&self, t: f64) -> Option<usize> {
        self.samples.partition_point(|(time, _)| *time <= t).checked_sub(1)
    }

    /// Pose at the greatest sample time <= `t`; the zero pose before the
    /// first sample or when empty.
    pub fn query_at(&self, t: f64) -> VehiclePosition {
        self.index_at(t)
            .map(|i| self.samples[i].1)
            .unwrap_or(VehiclePosition::ZERO)
    }

    pub fn sample(&self, t: f64, mode: SamplingMode) -> VehiclePosition {
        match mode {
            SamplingMode::StepHold => self.query_at(t),
            SamplingMode::ShortestArc => self.interpolate(t),
        }
    }

    fn interpolate(&self, t: f64) -> VehiclePosition {
        let Some(i) = self.index_at(t) else {
            return VehiclePosition::ZERO;
        };
        let Some((t1, next)) = self.samples.get(i + 1) else {
            return self.samples[i].1;
        };
        let (t0, prev) = &self.samples[i];
        let s = ((t - t0) / (t1 - t0)) as f32;
        blend(prev, next, s)
    }
}

fn parse_line(line: &str, line_number: usize) -> Result<(f64, VehiclePosition), TrajectoryError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != FIELD_COUNT {
        return Err(TrajectoryError::FieldCount {
            line: line_number,
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let mut values = [0.0_f64; FIELD_COUNT];
    for (column, (slot, text)) in values.iter_mut().zip(&fields).enumerate() {
        *slot = text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| TrajectoryError::InvalidNumber {
                line: line_number,
                column: column + 1,
                value: (*text).to_string(),
            })?;
    }

    let time = values[0];
    let v = |i: usize| values[i] as f32;
    let chassis = Position::new(v(1), v(2), v(3), v(4), v(5), v(6));

    let mut pose = VehiclePosition {
        chassis,
        ..VehiclePosition::ZERO
    };
    for wheel in Wheel::ALL {
        let base = 7 + wheel.index() * FIELDS_PER_WHEEL;
        let center = Vec3::new(v(base), v(base + 1), v(base + 2));
        let spin = v(base + 3);
        let steer = v(base + 4);
        let force = Vec3::new(v(base + 5), v(base + 6), v(base + 7));

        pose.wheels[wheel.index()] = VehiclePosition::wheel_pose(wheel, &chassis, center, steer);
        pose.wheel_spin[wheel.index()] = spin;
        pose.forces[wheel.index()] = force;
    }

    Ok((time, pose))
}

/// Signed difference `to - from` wrapped into [-pi, pi).
fn shortest_delta(from: f32, to: f32) -> f32 {
    (to - from + PI).rem_euclid(TAU) - PI
}

fn lerp_angle(from: f32, to: f32, s: f32) -> f32 {
    from + shortest_delta(from, to) * s
}

fn blend_position(a: &Position, b: &Position, s: f32) -> Position {
    let mut p = *a + (*b - *a) * s;
    p.yaw = lerp_angle(a.yaw, b.yaw, s);
    p.pitch = lerp_angle(a.pitch, b.pitch, s);
    p.roll = lerp_angle(a.roll, b.roll, s);
    p
}

fn blend(a: &VehiclePosition, b: &VehiclePosition, s: f32) -> VehiclePosition {
    VehiclePosition {
        chassis: blend_position(&a.chassis, &b.chassis, s),
        wheels: std::array::from_fn(|i| blend_position(&a.wheels[i], &b.wheels[i], s)),
        wheel_spin: std::array::from_fn(|i| lerp_angle(a.wheel_spin[i], b.wheel_spin[i], s)),
        forces: std::array::from_fn(|i| a.forces[i].lerp(b.forces[i], s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(time: f64, chassis_x: f64) -> String {
        let mut fields = vec![time, chassis_x, 0.0, 0.0, 0.0, 0.0, 0.0];
        fields.extend(std::iter::repeat(0.0).take(WHEEL_COUNT * FIELDS_PER_WHEEL));
        fields
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn parse(text: &str) -> TrajectoryLoad {
        Trajectory::parse(std::io::Cursor::new(text))
    }

    #[test]
    fn test_field_count() {
        assert_eq!(FIELD_COUNT, 39);
    }

    #[test]
    fn test_two_sample_step_hold() {
        let text = format!("header\n{}\n{}\n", line(0.0, 0.0), line(1.0, 10.0));
        let load = parse(&text);
        assert!(load.is_complete());
        let trajectory = load.trajectory;

        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.query_at(0.5).chassis.x, 0.0);
        assert_eq!(trajectory.query_at(1.5).chassis.x, 10.0);
        assert_eq!(trajectory.query_at(1.0).chassis.x, 10.0);
        assert_eq!(trajectory.first_time(), Some(0.0));
        assert_eq!(trajectory.last_time(), Some(1.0));
    }

    #[test]
    fn test_query_before_first_sample_is_zero() {
        let text = format!("header\n{}\n", line(2.0, 5.0));
        let trajectory = parse(&text).trajectory;
        assert_eq!(trajectory.query_at(1.0), VehiclePosition::ZERO);
        assert_eq!(Trajectory::new().query_at(3.0), VehiclePosition::ZERO);
    }

    #[test]
    fn test_step_hold_between_samples() {
        let text = format!(
            "header\n{}\n{}\n{}\n",
            line(0.0, 1.0),
            line(0.5, 2.0),
            line(2.0, 3.0)
        );
        let trajectory = parse(&text).trajectory;
        let times = [0.5, 0.75, 1.0, 1.5, 1.999];
        for pair in times.windows(2) {
            assert_eq!(trajectory.query_at(pair[0]), trajectory.query_at(pair[1]));
        }
    }

    #[test]
    fn test_short_line_keeps_partial_trajectory() {
        let short: String = line(1.0, 4.0).rsplitn(2, ',').nth(1).unwrap_or_default().to_string();
        let text = format!("header\n{}\n{}\n{}\n", line(0.0, 1.0), short, line(2.0, 9.0));
        let load = parse(&text);

        assert_eq!(load.trajectory.len(), 1);
        match load.error {
            Some(TrajectoryError::FieldCount { line, expected, found }) => {
                assert_eq!(line, 3);
                assert_eq!(expected, 39);
                assert_eq!(found, 38);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let bad = line(1.0, 4.0).replacen("4", "four", 1);
        let text = format!("header\n{}\n{}\n", line(0.0, 1.0), bad);
        let load = parse(&text);
        assert_eq!(load.trajectory.len(), 1);
        assert!(matches!(
            load.error,
            Some(TrajectoryError::InvalidNumber { line: 3, column: 2, .. })
        ));
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let nan_time = line(1.0, 4.0).replacen("1", "nan", 1);
        let text = format!("header\n{}\n{}\n{}\n", line(0.0, 1.0), nan_time, line(2.0, 9.0));
        let load = parse(&text);
        assert_eq!(load.trajectory.len(), 1);
        assert!(matches!(
            load.error,
            Some(TrajectoryError::InvalidNumber { line: 3, column: 1, .. })
        ));

        let inf_x = line(1.0, 4.0).replacen("4", "inf", 1);
        let load = parse(&format!("header\n{}\n{}\n", line(0.0, 1.0), inf_x));
        assert_eq!(load.trajectory.len(), 1);
        assert!(matches!(load.error, Some(TrajectoryError::InvalidNumber { column: 2, .. })));
    }

    #[test]
    fn test_time_must_increase() {
        let text = format!("header\n{}\n{}\n", line(1.0, 1.0), line(1.0, 2.0));
        let load = parse(&text);
        assert_eq!(load.trajectory.len(), 1);
        assert!(matches!(
            load.error,
            Some(TrajectoryError::NonIncreasingTime { line: 3, .. })
        ));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let load = parse("time,x,y\n");
        assert!(load.is_complete());
        assert!(load.trajectory.is_empty());
        assert_eq!(load.trajectory.first_time(), None);
    }

    #[test]
    fn test_wheel_fields_are_decoded() {
        let mut fields = vec![0.0_f64; FIELD_COUNT];
        fields[4] = 0.25; // chassis yaw
        fields[6] = 0.1; // chassis roll
        let fr = 7 + FIELDS_PER_WHEEL;
        fields[fr] = 1.5;
        fields[fr + 3] = 2.0; // spin
        fields[fr + 4] = 0.05; // steer
        fields[fr + 7] = 300.0; // fz
        let text = format!(
            "header\n{}\n",
            fields.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(",")
        );
        let pose = parse(&text).trajectory.query_at(0.0);

        let wheel = pose.wheels[Wheel::FrontRight.index()];
        assert_relative_eq!(wheel.x, 1.5);
        assert_relative_eq!(wheel.yaw, 0.3, epsilon = 1e-6);
        assert_relative_eq!(wheel.roll, 0.1, epsilon = 1e-6);
        assert_relative_eq!(pose.wheel_spin[Wheel::FrontRight.index()], 2.0);
        assert_relative_eq!(pose.forces[Wheel::FrontRight.index()].z, 300.0);
        assert_relative_eq!(pose.wheels[Wheel::RearLeft.index()].roll, 0.1 + PI, epsilon = 1e-6);
    }

    #[test]
    fn test_shortest_arc_crosses_wrap() {
        let mut a = VehiclePosition::ZERO;
        a.chassis.yaw = 350.0_f32.to_radians();
        let mut b = VehiclePosition::ZERO;
        b.chassis.yaw = 10.0_f32.to_radians();
        b.chassis.x = 2.0;
        let trajectory = Trajectory::from_samples(vec![(0.0, a), (1.0, b)]);

        let mid = trajectory.sample(0.5, SamplingMode::ShortestArc);
        let yaw = mid.chassis.yaw.rem_euclid(TAU).to_degrees();
        assert!(yaw > 359.9 || yaw < 0.1, "yaw was {}", yaw);
        assert_relative_eq!(mid.chassis.x, 1.0, epsilon = 1e-6);

        let held = trajectory.sample(0.5, SamplingMode::StepHold);
        assert_eq!(held, a);
    }

    #[test]
    fn test_shortest_arc_outside_range() {
        let mut a = VehiclePosition::ZERO;
        a.chassis.x = 1.0;
        let trajectory = Trajectory::from_samples(vec![(1.0, a)]);
        assert_eq!(trajectory.sample(0.0, SamplingMode::ShortestArc), VehiclePosition::ZERO);
        assert_eq!(trajectory.sample(4.0, SamplingMode::ShortestArc), a);
    }
}
