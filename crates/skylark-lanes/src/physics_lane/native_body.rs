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

use skylark_core::math::{Quaternion, Vec3};
use skylark_core::physics::{MassProperties, Pose, RigidBodyProvider};

/// Standard gravity along world -Y.
pub const STANDARD_GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

/// A single free rigid body integrated with semi-implicit Euler.
///
/// Forces accumulate until [`NativeRigidBody::integrate`]; impulses change the velocities
/// immediately. Inertia is diagonal in the body frame.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeRigidBody {
    pose: Pose,
    mass_properties: MassProperties,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    force: Vec3,
    torque: Vec3,
    gravity: Vec3,
}

impl NativeRigidBody {
    /// Creates a body at rest without gravity.
    pub fn new(pose: Pose, mass_properties: MassProperties) -> Self {
        Self {
            pose,
            mass_properties,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            gravity: Vec3::ZERO,
        }
    }

    /// Sets the gravitational acceleration.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    /// Teleports the body frame.
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    /// Overwrites the linear velocity of the centre of mass.
    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.linear_velocity = velocity;
    }

    /// Overwrites the angular velocity (world space, rad/s).
    pub fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.angular_velocity = velocity;
    }

    /// Mass properties currently in effect.
    pub fn mass_properties(&self) -> MassProperties {
        self.mass_properties
    }

    /// Force accumulated since the last integration.
    pub fn accumulated_force(&self) -> Vec3 {
        self.force
    }

    /// Torque about the centre of mass accumulated since the last integration.
    pub fn accumulated_torque(&self) -> Vec3 {
        self.torque
    }

    fn inverse_mass(&self) -> f32 {
        let mass = self.mass_properties.mass;
        if mass > 0.0 && mass.is_finite() {
            1.0 / mass
        } else {
            0.0
        }
    }

    /// Applies the world-space inverse inertia tensor to `v`.
    fn apply_inverse_inertia(&self, v: Vec3) -> Vec3 {
        let rotation = self.pose.rotation.normalize();
        let local = rotation.conjugate() * v;
        let inertia = self.mass_properties.principal_inertia;
        let inv = |value: f32, i: f32| if i > 0.0 && i.is_finite() { value / i } else { 0.0 };
        let scaled = Vec3::new(
            inv(local.x, inertia.x),
            inv(local.y, inertia.y),
            inv(local.z, inertia.z),
        );
        rotation * scaled
    }

    /// Advances the body by `dt` seconds and clears the accumulated force and torque.
    pub fn integrate(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let inv_mass = self.inverse_mass();
        if inv_mass > 0.0 {
            self.linear_velocity += (self.force * inv_mass + self.gravity) * dt;
        }
        self.angular_velocity += self.apply_inverse_inertia(self.torque) * dt;

        let center = self.world_center_of_mass() + self.linear_velocity * dt;

        let w_mag = self.angular_velocity.length();
        if w_mag > 1e-4 {
            let delta = Quaternion::from_axis_angle(self.angular_velocity / w_mag, w_mag * dt);
            self.pose.rotation = (delta * self.pose.rotation).normalize();
        }
        self.pose.position =
            center - self.pose.rotation * self.mass_properties.center_of_mass;

        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }
}

impl RigidBodyProvider for NativeRigidBody {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn mass(&self) -> f32 {
        self.mass_properties.mass
    }

    fn world_center_of_mass(&self) -> Vec3 {
        self.pose.transform_point(self.mass_properties.center_of_mass)
    }

    fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    fn apply_force_at_point(&mut self, force: Vec3, world_point: Vec3) {
        if !force.is_finite() || !world_point.is_finite() {
            return;
        }
        let lever = world_point - self.world_center_of_mass();
        self.force += force;
        self.torque += lever.cross(force);
    }

    fn apply_impulse_at_point(&mut self, impulse: Vec3, world_point: Vec3) {
        if !impulse.is_finite() || !world_point.is_finite() {
            return;
        }
        let lever = world_point - self.world_center_of_mass();
        self.linear_velocity += impulse * self.inverse_mass();
        self.angular_velocity += self.apply_inverse_inertia(lever.cross(impulse));
    }

    fn set_mass_properties(&mut self, properties: MassProperties) {
        self.mass_properties = properties;
    }
}
