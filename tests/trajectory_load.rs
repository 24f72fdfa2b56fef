//! Reading trajectory files from disk.

mod common;

use std::io::Write;

use vehicle_replay::trajectory::{SamplingMode, Trajectory, TrajectoryError, FIELD_COUNT};

const HEADER: &str = "time,x,y,z,yaw,pitch,roll,...";

fn write_file(lines: &[String]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_load_complete_file() {
    let file = write_file(&[common::csv_line(0.0, 0.0), common::csv_line(1.0, 10.0)]);
    let load = Trajectory::load(file.path());
    assert!(load.is_complete());

    let trajectory = load.trajectory;
    assert_eq!(trajectory.len(), 2);
    assert_eq!(trajectory.first_time(), Some(0.0));
    assert_eq!(trajectory.last_time(), Some(1.0));
    assert_eq!(trajectory.query_at(0.5).chassis.x, 0.0);
    assert_eq!(trajectory.query_at(1.5).chassis.x, 10.0);
}

#[test]
fn test_short_line_stops_loading() {
    let mut short: Vec<String> = common::csv_line(1.0, 10.0).split(',').map(str::to_string).collect();
    short.pop();
    assert_eq!(short.len(), FIELD_COUNT - 1);

    let file = write_file(&[common::csv_line(0.0, 0.0), short.join(","), common::csv_line(2.0, 20.0)]);
    let load = Trajectory::load(file.path());

    assert_eq!(load.trajectory.len(), 1);
    match load.error {
        Some(TrajectoryError::FieldCount { line, expected, found }) => {
            assert_eq!(line, 3);
            assert_eq!(expected, FIELD_COUNT);
            assert_eq!(found, FIELD_COUNT - 1);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_missing_file_gives_empty_trajectory() {
    let dir = tempfile::tempdir().unwrap();
    let load = Trajectory::load(dir.path().join("absent.csv"));
    assert!(load.trajectory.is_empty());
    assert!(matches!(load.error, Some(TrajectoryError::Io { .. })));
    assert_eq!(load.trajectory.sample(3.0, SamplingMode::StepHold).chassis.x, 0.0);
}

#[test]
fn test_interpolated_sampling_from_file() {
    let file = write_file(&[common::csv_line(0.0, 0.0), common::csv_line(2.0, 10.0)]);
    let trajectory = Trajectory::load(file.path()).trajectory;
    let pose = trajectory.sample(1.0, SamplingMode::ShortestArc);
    assert!((pose.chassis.x - 5.0).abs() < 1e-5);
}
