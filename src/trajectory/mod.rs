//! Recorded vehicle motion: poses and the time-indexed store.

mod position;
mod store;

pub use position::{Position, VehiclePosition, Wheel, WHEEL_COUNT};
pub use store::{SamplingMode, Trajectory, TrajectoryError, TrajectoryLoad, FIELD_COUNT};
