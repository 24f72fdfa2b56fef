//! Rigid-body poses sampled from a trajectory.

use glam::{Mat4, Vec3};
use std::f32::consts::PI;
use std::ops::{Add, Mul, Sub};

/// Number of wheels on a replayed vehicle, in the order FL, FR, RL, RR.
pub const WHEEL_COUNT: usize = 4;

/// Wheel slot in trajectory files and [`VehiclePosition`] arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    FrontLeft = 0,
    FrontRight = 1,
    RearLeft = 2,
    RearRight = 3,
}

impl Wheel {
    pub const ALL: [Wheel; WHEEL_COUNT] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::RearLeft,
        Wheel::RearRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Left wheels use a model rotated half a turn about the forward axis.
    pub fn is_left(self) -> bool {
        matches!(self, Wheel::FrontLeft | Wheel::RearLeft)
    }
}

/// Translation plus Cardan angles (radians).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Position {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        yaw: 0.0,
        pitch: 0.0,
        roll: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32, yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { x, y, z, yaw, pitch, roll }
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Translate, then rotate yaw (Z), pitch (Y), roll (X).
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation())
            * Mat4::from_rotation_z(self.yaw)
            * Mat4::from_rotation_y(self.pitch)
            * Mat4::from_rotation_x(self.roll)
    }

    /// Rotation part only, used to carry offsets into this pose's frame.
    pub fn rotation_matrix(&self) -> Mat4 {
        Mat4::from_rotation_z(self.yaw)
            * Mat4::from_rotation_y(self.pitch)
            * Mat4::from_rotation_x(self.roll)
    }
}

impl Add for Position {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
            yaw: self.yaw + rhs.yaw,
            pitch: self.pitch + rhs.pitch,
            roll: self.roll + rhs.roll,
        }
    }
}

impl Sub for Position {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
            yaw: self.yaw - rhs.yaw,
            pitch: self.pitch - rhs.pitch,
            roll: self.roll - rhs.roll,
        }
    }
}

impl Mul<f32> for Position {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
            yaw: self.yaw * s,
            pitch: self.pitch * s,
            roll: self.roll * s,
        }
    }
}

/// Pose of a whole vehicle at one trajectory timestep.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VehiclePosition {
    pub chassis: Position,
    pub wheels: [Position; WHEEL_COUNT],
    /// Rotation of each wheel about its axle. Kept apart from the Cardan
    /// angles because it is applied first, in the wheel's local frame.
    pub wheel_spin: [f32; WHEEL_COUNT],
    /// Tire force per wheel, world frame.
    pub forces: [Vec3; WHEEL_COUNT],
}

impl VehiclePosition {
    pub const ZERO: Self = Self {
        chassis: Position::ZERO,
        wheels: [Position::ZERO; WHEEL_COUNT],
        wheel_spin: [0.0; WHEEL_COUNT],
        forces: [Vec3::ZERO; WHEEL_COUNT],
    };

    /// Build a wheel pose from its recorded contact data and the chassis pose.
    pub fn wheel_pose(wheel: Wheel, chassis: &Position, center: Vec3, steer: f32) -> Position {
        let roll_offset = if wheel.is_left() { PI } else { 0.0 };
        Position {
            x: center.x,
            y: center.y,
            z: center.z,
            yaw: chassis.yaw + steer,
            pitch: chassis.pitch,
            roll: chassis.roll + roll_offset,
        }
    }

    /// Model matrix of one wheel: placement transform, then spin about the axle.
    ///
    /// The left wheels' local axle points the other way because of their
    /// half-turn roll, so their spin is negated to roll in the same world
    /// direction as the right wheels.
    pub fn wheel_matrix(&self, wheel: Wheel) -> Mat4 {
        let i = wheel.index();
        let spin = if wheel.is_left() {
            -self.wheel_spin[i]
        } else {
            self.wheel_spin[i]
        };
        self.wheels[i].to_matrix() * Mat4::from_rotation_y(spin)
    }
}

impl Add for VehiclePosition {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            chassis: self.chassis + rhs.chassis,
            wheels: std::array::from_fn(|i| self.wheels[i] + rhs.wheels[i]),
            wheel_spin: std::array::from_fn(|i| self.wheel_spin[i] + rhs.wheel_spin[i]),
            forces: std::array::from_fn(|i| self.forces[i] + rhs.forces[i]),
        }
    }
}

impl Sub for VehiclePosition {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            chassis: self.chassis - rhs.chassis,
            wheels: std::array::from_fn(|i| self.wheels[i] - rhs.wheels[i]),
            wheel_spin: std::array::from_fn(|i| self.wheel_spin[i] - rhs.wheel_spin[i]),
            forces: std::array::from_fn(|i| self.forces[i] - rhs.forces[i]),
        }
    }
}

impl Mul<f32> for VehiclePosition {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self {
            chassis: self.chassis * s,
            wheels: self.wheels.map(|w| w * s),
            wheel_spin: self.wheel_spin.map(|w| w * s),
            forces: self.forces.map(|f| f * s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Mat3, Vec4};

    #[test]
    fn test_pure_yaw_is_z_rotation() {
        for &theta in &[0.0_f32, 0.3, 1.2, -2.5, PI] {
            for &t in &[Vec3::ZERO, Vec3::new(4.0, -7.0, 1.5)] {
                let pose = Position::new(t.x, t.y, t.z, theta, 0.0, 0.0);
                let rotation = Mat3::from_mat4(pose.to_matrix());
                let expected = Mat3::from_rotation_z(theta);
                for (a, b) in rotation.to_cols_array().iter().zip(expected.to_cols_array()) {
                    assert_relative_eq!(*a, b, epsilon = 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_translation_is_applied_last() {
        let pose = Position::new(1.0, 2.0, 3.0, 0.7, 0.2, -0.4);
        let origin = pose.to_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(origin.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(origin.y, 2.0, epsilon = 1e-6);
        assert_relative_eq!(origin.z, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_order_yaw_pitch_roll() {
        let pose = Position::new(0.0, 0.0, 0.0, 0.5, 0.25, 0.125);
        let expected = Mat4::from_rotation_z(0.5)
            * Mat4::from_rotation_y(0.25)
            * Mat4::from_rotation_x(0.125);
        assert!(pose.to_matrix().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_componentwise_arithmetic() {
        let a = Position::new(1.0, 2.0, 3.0, 0.1, 0.2, 0.3);
        let b = Position::new(0.5, 0.5, 0.5, 0.1, 0.1, 0.1);
        let sum = a + b;
        assert_relative_eq!(sum.x, 1.5, epsilon = 1e-6);
        assert_relative_eq!(sum.roll, 0.4, epsilon = 1e-6);
        let diff = (a - b) * 2.0;
        assert_relative_eq!(diff.y, 3.0, epsilon = 1e-6);
        assert_relative_eq!(diff.pitch, 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_left_wheels_are_flipped() {
        let chassis = Position::new(0.0, 0.0, 0.0, 0.3, 0.1, 0.05);
        let left = VehiclePosition::wheel_pose(Wheel::FrontLeft, &chassis, Vec3::ZERO, 0.2);
        let right = VehiclePosition::wheel_pose(Wheel::FrontRight, &chassis, Vec3::ZERO, 0.2);
        assert_relative_eq!(left.yaw, 0.5, epsilon = 1e-6);
        assert_relative_eq!(right.roll, 0.05, epsilon = 1e-6);
        assert_relative_eq!(left.roll, 0.05 + PI, epsilon = 1e-6);
        assert_relative_eq!(left.pitch, chassis.pitch, epsilon = 1e-6);
    }

    #[test]
    fn test_spin_rolls_both_sides_the_same_way() {
        let chassis = Position::ZERO;
        let mut pose = VehiclePosition::ZERO;
        for wheel in Wheel::ALL {
            pose.wheels[wheel.index()] = VehiclePosition::wheel_pose(wheel, &chassis, Vec3::ZERO, 0.0);
            pose.wheel_spin[wheel.index()] = 0.4;
        }

        // World-space spin rotation, with the placement transform factored out.
        let spin_of = |wheel: Wheel| {
            pose.wheel_matrix(wheel) * pose.wheels[wheel.index()].to_matrix().inverse()
        };
        assert!(spin_of(Wheel::FrontLeft).abs_diff_eq(spin_of(Wheel::FrontRight), 1e-5));
        assert!(spin_of(Wheel::RearLeft).abs_diff_eq(Mat4::from_rotation_y(0.4), 1e-5));
    }
}
