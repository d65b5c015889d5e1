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

use skylark_core::config::{ThrusterPlacement, ThrusterSettings};
use skylark_core::math::{saturate, Quaternion, Vec3};
use skylark_core::physics::{Pose, RigidBodyProvider};

use super::AppliedForce;

/// Highest thrust rating a thruster accepts (N).
pub const MAX_THRUST_LIMIT: f32 = 60.0;

/// Thrust rating that maps to unit geometric scale (N).
const REFERENCE_THRUST: f32 = 10.0;

/// Uniform geometric scale of a thruster with the given rating: `(T / 10)^(1/3)`.
///
/// Shared by the visuals and by the mass builder's cylinder approximation.
#[inline]
pub fn geometric_scale(max_thrust: f32) -> f32 {
    (max_thrust.max(0.0) / REFERENCE_THRUST).cbrt()
}

/// A proportional thruster pushing along its local +X axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Thruster {
    mount: Pose,
    gimbal: Quaternion,
    max_thrust: f32,
    control: f32,
}

impl Thruster {
    /// Creates a thruster at `mount` (body frame) with the given rating.
    pub fn new(mount: Pose, max_thrust: f32) -> Self {
        let mut thruster = Self {
            mount: Pose::new(mount.position, mount.rotation.normalize()),
            gimbal: Quaternion::IDENTITY,
            max_thrust: 0.0,
            control: 0.0,
        };
        thruster.set_max_thrust(max_thrust, MAX_THRUST_LIMIT);
        thruster
    }

    /// Creates a thruster from a configured placement, honouring the configured thrust limit.
    pub fn from_placement(placement: &ThrusterPlacement, settings: &ThrusterSettings) -> Self {
        let mut thruster = Self::new(
            Pose::new(
                placement.position,
                Quaternion::from_euler_degrees(placement.rotation_deg),
            ),
            0.0,
        );
        thruster.set_max_thrust(placement.max_thrust, settings.max_thrust_limit);
        thruster
    }

    /// Thrust rating in newtons.
    pub fn max_thrust(&self) -> f32 {
        self.max_thrust
    }

    /// Sets the thrust rating, clamped to `[0, limit]` where `limit` never exceeds
    /// [`MAX_THRUST_LIMIT`].
    pub fn set_max_thrust(&mut self, max_thrust: f32, limit: f32) {
        let limit = limit.clamp(0.0, MAX_THRUST_LIMIT);
        self.max_thrust = if max_thrust.is_nan() {
            0.0
        } else {
            max_thrust.clamp(0.0, limit)
        };
    }

    /// Current throttle in `[0, 1]`.
    pub fn control(&self) -> f32 {
        self.control
    }

    /// Sets the throttle, clamped to `[0, 1]`.
    pub fn set_control(&mut self, control: f32) {
        self.control = saturate(control);
    }

    /// Sets the servo-driven rotation applied on top of the mount orientation.
    pub fn set_gimbal(&mut self, gimbal: Quaternion) {
        self.gimbal = gimbal.normalize();
    }

    /// Current servo-driven rotation.
    pub fn gimbal(&self) -> Quaternion {
        self.gimbal
    }

    /// Mount position in the body frame.
    pub fn position(&self) -> Vec3 {
        self.mount.position
    }

    /// Effective pose in the body frame, including the gimbal.
    pub fn local_pose(&self) -> Pose {
        Pose::new(self.mount.position, (self.mount.rotation * self.gimbal).normalize())
    }

    /// Uniform geometric scale derived from the rating.
    pub fn scale(&self) -> f32 {
        geometric_scale(self.max_thrust)
    }

    /// Computes the thrust force and its application point for a body at `body_pose`.
    pub fn compute_force(&self, body_pose: &Pose) -> AppliedForce {
        let world = body_pose.compose(&self.local_pose());
        let direction = world.transform_vector(Vec3::X);
        AppliedForce {
            force: direction * (self.max_thrust * self.control),
            point: world.position,
        }
    }

    /// Accumulates this step's thrust on `body` and returns what was applied.
    pub fn apply(&self, body: &mut dyn RigidBodyProvider) -> AppliedForce {
        let applied = self.compute_force(&body.pose());
        if self.control > 0.0 && applied.force.is_finite() {
            body.apply_force_at_point(applied.force, applied.point);
        }
        applied
    }

    /// Cosmetic exhaust emission rate for the current throttle.
    pub fn emission_rate(&self, settings: &ThrusterSettings) -> f32 {
        if self.control < settings.emission_dead_zone {
            0.0
        } else {
            settings.max_emission * self.control
        }
    }
}
