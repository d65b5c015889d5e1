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

//! Rapier implementation of the rigid-body contract.

use rapier3d::prelude::*;
use skylark_core::math::{Quaternion, Vec3};
use skylark_core::physics::{MassProperties as BodyMassProperties, Pose, RigidBodyProvider};

fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

fn to_point(v: Vec3) -> Point<Real> {
    point![v.x, v.y, v.z]
}

fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn to_rapier_mass(props: &BodyMassProperties) -> MassProperties {
    MassProperties::new(
        to_point(props.center_of_mass),
        props.mass.max(0.0),
        to_vector(props.principal_inertia),
    )
}

/// A Rapier world hosting free rigid bodies.
///
/// Forces added through [`RapierBody`] last for one [`RapierPhysicsWorld::step`].
pub struct RapierPhysicsWorld {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
}

impl Default for RapierPhysicsWorld {
    fn default() -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: vector![0.0, -9.81, 0.0],
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
        }
    }
}

impl RapierPhysicsWorld {
    /// Creates a world with standard gravity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gravitational acceleration.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    /// Inserts a dynamic body at `pose` with the given mass properties.
    pub fn add_body(&mut self, pose: Pose, mass: BodyMassProperties) -> RigidBodyHandle {
        let rotation = pose.rotation.normalize();
        let rigid_body = RigidBodyBuilder::dynamic()
            .translation(to_vector(pose.position))
            .rotation(
                rapier3d::na::UnitQuaternion::from_quaternion(rapier3d::na::Quaternion::new(
                    rotation.w, rotation.x, rotation.y, rotation.z,
                ))
                .scaled_axis(),
            )
            .additional_mass_properties(to_rapier_mass(&mass))
            .build();
        self.rigid_body_set.insert(rigid_body)
    }

    /// Removes a body.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    /// Borrows a body through the rigid-body contract.
    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<RapierBody<'_>> {
        let colliders = &self.collider_set;
        self.rigid_body_set
            .get_mut(handle)
            .map(|body| RapierBody { body, colliders })
    }

    /// Advances the world by `dt` seconds, then clears every body's accumulated force and torque.
    pub fn step(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
        for (_, body) in self.rigid_body_set.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }
    }
}

/// A Rapier body viewed through [`RigidBodyProvider`].
pub struct RapierBody<'a> {
    body: &'a mut RigidBody,
    colliders: &'a ColliderSet,
}

impl RigidBodyProvider for RapierBody<'_> {
    fn pose(&self) -> Pose {
        let r = self.body.rotation();
        Pose::new(
            from_vector(self.body.translation()),
            Quaternion::new(r.i, r.j, r.k, r.w),
        )
    }

    fn mass(&self) -> f32 {
        self.body.mass()
    }

    fn world_center_of_mass(&self) -> Vec3 {
        let com = self.body.center_of_mass();
        Vec3::new(com.x, com.y, com.z)
    }

    fn linear_velocity(&self) -> Vec3 {
        from_vector(self.body.linvel())
    }

    fn angular_velocity(&self) -> Vec3 {
        from_vector(self.body.angvel())
    }

    fn velocity_at_point(&self, world_point: Vec3) -> Vec3 {
        from_vector(&self.body.velocity_at_point(&to_point(world_point)))
    }

    fn apply_force_at_point(&mut self, force: Vec3, world_point: Vec3) {
        if force.is_finite() && world_point.is_finite() {
            self.body
                .add_force_at_point(to_vector(force), to_point(world_point), true);
        }
    }

    fn apply_impulse_at_point(&mut self, impulse: Vec3, world_point: Vec3) {
        if impulse.is_finite() && world_point.is_finite() {
            self.body
                .apply_impulse_at_point(to_vector(impulse), to_point(world_point), true);
        }
    }

    fn set_mass_properties(&mut self, properties: BodyMassProperties) {
        self.body
            .set_additional_mass_properties(to_rapier_mass(&properties), true);
        self.body.recompute_mass_properties_from_colliders(self.colliders);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn world_with_body(mass: f32) -> (RapierPhysicsWorld, RigidBodyHandle) {
        let mut world = RapierPhysicsWorld::new();
        world.set_gravity(Vec3::ZERO);
        let handle = world.add_body(
            Pose::IDENTITY,
            BodyMassProperties {
                mass,
                ..BodyMassProperties::default()
            },
        );
        world.step(1.0 / 60.0);
        (world, handle)
    }

    #[test]
    fn test_central_impulse_sets_velocity() {
        let (mut world, handle) = world_with_body(2.0);
        let mut body = world.body_mut(handle).unwrap();
        let com = body.world_center_of_mass();
        body.apply_impulse_at_point(Vec3::new(4.0, 0.0, 0.0), com);
        assert_relative_eq!(body.linear_velocity(), Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_forces_last_one_step() {
        let (mut world, handle) = world_with_body(2.0);
        {
            let mut body = world.body_mut(handle).unwrap();
            let com = body.world_center_of_mass();
            body.apply_force_at_point(Vec3::new(2.0, 0.0, 0.0), com);
        }
        world.step(0.5);
        let after_force = world.body_mut(handle).unwrap().linear_velocity();
        assert_relative_eq!(after_force.x, 0.5, epsilon = 1e-3);

        world.step(0.5);
        let coasting = world.body_mut(handle).unwrap().linear_velocity();
        assert_relative_eq!(coasting.x, after_force.x, epsilon = 1e-4);
    }

    #[test]
    fn test_mass_properties_overwrite() {
        let (mut world, handle) = world_with_body(1.0);
        world
            .body_mut(handle)
            .unwrap()
            .set_mass_properties(BodyMassProperties {
                mass: 5.0,
                center_of_mass: Vec3::ZERO,
                principal_inertia: Vec3::new(2.0, 3.0, 2.0),
            });
        world.step(1.0 / 60.0);
        assert_relative_eq!(world.body_mut(handle).unwrap().mass(), 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_pose_is_reported() {
        let mut world = RapierPhysicsWorld::new();
        let pose = Pose::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quaternion::from_euler_degrees(Vec3::new(0.0, 90.0, 0.0)),
        );
        let handle = world.add_body(pose, BodyMassProperties::default());
        let reported = world.body_mut(handle).unwrap().pose();
        assert_relative_eq!(reported.position, pose.position, epsilon = 1e-5);
        assert_relative_eq!(reported.rotation * Vec3::X, -Vec3::Z, epsilon = 1e-5);
    }
}
