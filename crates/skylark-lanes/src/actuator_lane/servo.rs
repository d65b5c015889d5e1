// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use skylark_core::config::{ControlSettings, ServoMount};
use skylark_core::math::{degrees_to_radians, Quaternion, Vec3};

/// A rate-limited angle actuator gimballing one thruster.
#[derive(Debug, Clone, PartialEq)]
pub struct Servo {
    thruster: usize,
    axis: Vec3,
    command_sign: f32,
    max_angle_deg: f32,
    slew_deg_per_s: f32,
    target_deg: f32,
    angle_deg: f32,
}

impl Servo {
    /// Creates a servo driving thruster `thruster` about `axis` (thruster mount frame).
    ///
    /// A zero or non-finite axis falls back to +Y. A slew rate of zero means unlimited.
    pub fn new(thruster: usize, axis: Vec3, max_angle_deg: f32, slew_deg_per_s: f32) -> Self {
        Self {
            thruster,
            axis: axis.try_normalize().unwrap_or(Vec3::Y),
            command_sign: 1.0,
            max_angle_deg: max_angle_deg.abs(),
            slew_deg_per_s: slew_deg_per_s.max(0.0),
            target_deg: 0.0,
            angle_deg: 0.0,
        }
    }

    /// Creates a servo from a configured mount.
    pub fn from_mount(thruster: usize, mount: &ServoMount, settings: &ControlSettings) -> Self {
        let mut servo = Self::new(
            thruster,
            mount.axis,
            settings.max_servo_angle_deg,
            settings.servo_slew_deg_per_s,
        );
        servo.command_sign = if mount.command_sign < 0.0 { -1.0 } else { 1.0 };
        servo
    }

    /// Index of the driven thruster.
    pub fn thruster(&self) -> usize {
        self.thruster
    }

    /// Sign applied to shared yaw commands.
    pub fn command_sign(&self) -> f32 {
        self.command_sign
    }

    /// Sets the target angle in degrees, clamped to `±max_angle`.
    pub fn set_target(&mut self, degrees: f32) {
        self.target_deg = if degrees.is_nan() {
            0.0
        } else {
            degrees.clamp(-self.max_angle_deg, self.max_angle_deg)
        };
    }

    /// Target angle in degrees.
    pub fn target(&self) -> f32 {
        self.target_deg
    }

    /// Current angle in degrees.
    pub fn angle(&self) -> f32 {
        self.angle_deg
    }

    /// Moves the angle towards the target by at most `slew * dt` and returns the new angle.
    pub fn step(&mut self, dt: f32) -> f32 {
        let error = self.target_deg - self.angle_deg;
        if self.slew_deg_per_s <= 0.0 {
            self.angle_deg = self.target_deg;
        } else if dt.is_finite() && dt > 0.0 {
            let max_step = self.slew_deg_per_s * dt;
            self.angle_deg += error.clamp(-max_step, max_step);
        }
        self.angle_deg
    }

    /// Rotation of the driven thruster relative to its mount.
    pub fn rotation(&self) -> Quaternion {
        Quaternion::from_axis_angle(self.axis, degrees_to_radians(self.angle_deg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_target_is_clamped() {
        let mut servo = Servo::new(0, Vec3::Y, 45.0, 0.0);
        servo.set_target(80.0);
        assert_eq!(servo.target(), 45.0);
        servo.set_target(-80.0);
        assert_eq!(servo.target(), -45.0);
    }

    #[test]
    fn test_slew_rate_limits_motion() {
        let mut servo = Servo::new(0, Vec3::Y, 45.0, 100.0);
        servo.set_target(30.0);
        assert_relative_eq!(servo.step(0.1), 10.0, epsilon = 1e-5);
        assert_relative_eq!(servo.step(0.1), 20.0, epsilon = 1e-5);
        assert_relative_eq!(servo.step(0.5), 30.0, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_slew_is_instant() {
        let mut servo = Servo::new(0, Vec3::Y, 45.0, 0.0);
        servo.set_target(-20.0);
        assert_eq!(servo.step(0.02), -20.0);
    }

    #[test]
    fn test_degenerate_axis_falls_back_to_y() {
        let mut servo = Servo::new(0, Vec3::ZERO, 90.0, 0.0);
        servo.set_target(90.0);
        servo.step(0.02);
        assert_relative_eq!(servo.rotation() * Vec3::X, -Vec3::Z, epsilon = 1e-5);
    }

    #[test]
    fn test_mount_sign() {
        let mount = ServoMount {
            axis: Vec3::Y,
            command_sign: -3.0,
        };
        let servo = Servo::from_mount(1, &mount, &ControlSettings::default());
        assert_eq!(servo.command_sign(), -1.0);
        assert_eq!(servo.thruster(), 1);
    }
}
