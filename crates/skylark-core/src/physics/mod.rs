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

//! # Physics Abstractions
//!
//! The rigid-body contract consumed by the actuator lanes. The body itself (its integrator,
//! collision handling and lifecycle) belongs to whichever physics engine hosts it; the lanes only
//! read its state and push forces, impulses and mass properties through [`RigidBodyProvider`].

use serde::{Deserialize, Serialize};

use crate::math::{Quaternion, Vec3};

/// Position and orientation of a frame relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation of the frame origin.
    pub position: Vec3,
    /// Rotation of the frame axes.
    pub rotation: Quaternion,
}

impl Pose {
    /// The identity pose.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quaternion::IDENTITY,
    };

    /// Creates a new pose.
    pub fn new(position: Vec3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }

    /// Maps a point expressed in this frame into the parent frame.
    #[inline]
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    /// Maps a direction expressed in this frame into the parent frame.
    #[inline]
    pub fn transform_vector(&self, local: Vec3) -> Vec3 {
        self.rotation * local
    }

    /// Maps a point expressed in the parent frame into this frame.
    #[inline]
    pub fn inverse_transform_point(&self, parent: Vec3) -> Vec3 {
        self.rotation.normalize().conjugate() * (parent - self.position)
    }

    /// Composes `child` (expressed in this frame) into the parent frame.
    #[inline]
    pub fn compose(&self, child: &Pose) -> Pose {
        Pose {
            position: self.transform_point(child.position),
            rotation: (self.rotation * child.rotation).normalize(),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Mass, centre of mass and diagonal inertia written onto a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    /// Total mass in kilograms.
    pub mass: f32,
    /// Centre of mass in the body's local frame.
    pub center_of_mass: Vec3,
    /// Diagonal of the inertia tensor `(Ix, Iy, Iz)` in the body's local frame, in kg·m².
    /// The tensor rotation is always identity.
    pub principal_inertia: Vec3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            center_of_mass: Vec3::ZERO,
            principal_inertia: Vec3::ONE,
        }
    }
}

/// Interface contract for the rigid body the actuators act on.
///
/// Implemented by the hosting physics engine adapter. Implementations are injected into the
/// lanes by reference every tick; nothing in the lanes looks a body up globally.
pub trait RigidBodyProvider {
    /// World pose of the body frame (the frame part placements are expressed in).
    fn pose(&self) -> Pose;

    /// Current mass in kilograms.
    fn mass(&self) -> f32;

    /// Current centre of mass in world space.
    fn world_center_of_mass(&self) -> Vec3;

    /// Current linear velocity of the centre of mass in world space.
    fn linear_velocity(&self) -> Vec3;

    /// Current angular velocity in world space, in radians per second.
    fn angular_velocity(&self) -> Vec3;

    /// Velocity of the material point currently at `world_point`, including the
    /// contribution of the body's rotation.
    fn velocity_at_point(&self, world_point: Vec3) -> Vec3 {
        let lever = world_point - self.world_center_of_mass();
        self.linear_velocity() + self.angular_velocity().cross(lever)
    }

    /// Accumulates a continuous force applied at `world_point` for the current step.
    fn apply_force_at_point(&mut self, force: Vec3, world_point: Vec3);

    /// Applies an instantaneous impulse at `world_point`.
    fn apply_impulse_at_point(&mut self, impulse: Vec3, world_point: Vec3);

    /// Overwrites mass, centre of mass and inertia of the body.
    fn set_mass_properties(&mut self, properties: MassProperties);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pose_round_trips_points() {
        let pose = Pose::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quaternion::from_euler_degrees(Vec3::new(10.0, 45.0, -20.0)),
        );
        let local = Vec3::new(-0.5, 0.25, 2.0);
        let world = pose.transform_point(local);
        assert_relative_eq!(pose.inverse_transform_point(world), local, epsilon = 1e-5);
    }

    #[test]
    fn test_compose_applies_parent_rotation_to_child_offset() {
        let parent = Pose::new(
            Vec3::new(0.0, 1.0, 0.0),
            Quaternion::from_euler_degrees(Vec3::new(0.0, 90.0, 0.0)),
        );
        let child = Pose::new(Vec3::X, Quaternion::IDENTITY);
        let composed = parent.compose(&child);
        assert_relative_eq!(composed.position, Vec3::new(0.0, 1.0, -1.0), epsilon = 1e-6);
        assert_relative_eq!(composed.rotation * Vec3::X, -Vec3::Z, epsilon = 1e-6);
    }
}
