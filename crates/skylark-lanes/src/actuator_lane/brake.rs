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

use skylark_core::config::BrakePlacement;
use skylark_core::math::{degrees_to_radians, saturate, Quaternion, Vec3};
use skylark_core::physics::{Pose, RigidBodyProvider};

use super::AppliedForce;

/// Flap deflection at full control when no setting overrides it, in degrees.
pub const DEFAULT_MAX_DEFLECTION_DEG: f32 = 90.0;

/// Quadratic drag of one brake unit.
///
/// `velocity` is the body velocity sampled at the unit. The flap term along `lateral_axis` is
/// scaled by `control`; the passive term along `perpendicular_axis` always applies. Both axes are
/// expected to be unit length and orthogonal.
///
/// Non-finite input yields a zero force.
pub fn quadratic_drag(
    drag_constant: f32,
    velocity: Vec3,
    lateral_axis: Vec3,
    perpendicular_axis: Vec3,
    control: f32,
) -> Vec3 {
    if !velocity.is_finite() || !drag_constant.is_finite() {
        return Vec3::ZERO;
    }
    let control = saturate(control);
    let v_lateral = velocity.dot(lateral_axis);
    let v_perpendicular = velocity.dot(perpendicular_axis);

    let lateral = lateral_axis * (-drag_constant * v_lateral * v_lateral.abs() * control);
    let perpendicular =
        perpendicular_axis * (-drag_constant * v_perpendicular * v_perpendicular.abs());
    lateral + perpendicular
}

/// A brake unit mounted on the vehicle body.
///
/// The controllable flap drags along the mount's local +X axis; the fixed surface drags along
/// local +Y.
#[derive(Debug, Clone, PartialEq)]
pub struct BrakeUnit {
    mount: Pose,
    control: f32,
    drag_constant: f32,
    max_deflection_deg: f32,
    deflection_deg: f32,
}

impl BrakeUnit {
    /// Creates a brake unit at `mount`, expressed in the body frame.
    pub fn new(mount: Pose) -> Self {
        Self {
            mount: Pose::new(mount.position, mount.rotation.normalize()),
            control: 0.0,
            drag_constant: 0.0,
            max_deflection_deg: DEFAULT_MAX_DEFLECTION_DEG,
            deflection_deg: 0.0,
        }
    }

    /// Creates a brake unit from a configured placement.
    pub fn from_placement(placement: &BrakePlacement) -> Self {
        Self::new(Pose::new(
            placement.position,
            Quaternion::from_euler_degrees(placement.rotation_deg),
        ))
    }

    /// Mount pose in the body frame.
    pub fn mount(&self) -> Pose {
        self.mount
    }

    /// Current control value in `[0, 1]`.
    pub fn control(&self) -> f32 {
        self.control
    }

    /// Sets the flap command. The value is clamped to `[0, 1]`.
    pub fn set_control(&mut self, control: f32) {
        self.control = saturate(control);
    }

    /// Drag constant currently pushed down to this unit.
    pub fn drag_constant(&self) -> f32 {
        self.drag_constant
    }

    /// Sets the drag constant. Negative values are treated as zero.
    pub fn set_drag_constant(&mut self, drag_constant: f32) {
        self.drag_constant = if drag_constant.is_finite() {
            drag_constant.max(0.0)
        } else {
            0.0
        };
    }

    /// Sets the deflection reached at full control.
    pub fn set_max_deflection(&mut self, degrees: f32) {
        self.max_deflection_deg = degrees;
    }

    /// World pose of the unit for a body at `body_pose`.
    pub fn world_pose(&self, body_pose: &Pose) -> Pose {
        body_pose.compose(&self.mount)
    }

    /// Computes this unit's drag force and its application point.
    pub fn compute_force(&self, body: &dyn RigidBodyProvider) -> AppliedForce {
        let world = self.world_pose(&body.pose());
        let point = world.position;
        let velocity = body.velocity_at_point(point);
        let lateral = world.transform_vector(Vec3::X);
        let perpendicular = world.transform_vector(Vec3::Y);
        AppliedForce {
            force: quadratic_drag(
                self.drag_constant,
                velocity,
                lateral,
                perpendicular,
                self.control,
            ),
            point,
        }
    }

    /// Refreshes the cosmetic flap deflection from the current control and returns it in degrees.
    pub fn update_deflection(&mut self) -> f32 {
        self.deflection_deg = self.max_deflection_deg * self.control;
        self.deflection_deg
    }

    /// Last computed flap deflection in degrees.
    pub fn deflection(&self) -> f32 {
        self.deflection_deg
    }

    /// Local rotations of the upper and lower flap leaves, `±deflection` about local +Z.
    pub fn flap_rotations(&self) -> (Quaternion, Quaternion) {
        let angle = degrees_to_radians(self.deflection_deg);
        (
            Quaternion::from_axis_angle(Vec3::Z, angle),
            Quaternion::from_axis_angle(Vec3::Z, -angle),
        )
    }
}
