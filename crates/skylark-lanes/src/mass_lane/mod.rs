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

//! Mass Lane
//!
//! Synthesises mass, centre of mass and diagonal inertia of the vehicle from its registered parts
//! using the parallel-axis theorem about the vertical (yaw) axis.

use skylark_core::config::MassSettings;
use skylark_core::math::Vec3;
use skylark_core::physics::{MassProperties, RigidBodyProvider};

use crate::actuator_lane::{geometric_scale, BrakeUnit, Thruster};

/// Mass contribution of one part, in the body frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassPart {
    /// Mass in kilograms.
    pub mass: f32,
    /// Position of the part's centroid in the body frame.
    pub position: Vec3,
    /// Yaw inertia about the part's own centroid (kg·m²).
    pub intrinsic_inertia: f32,
}

impl MassPart {
    /// A slender rod of `length` centred at `position`: `I = m L² / 12`.
    pub fn rod(mass: f32, length: f32, position: Vec3) -> Self {
        let mass = mass.max(0.0);
        Self {
            mass,
            position,
            intrinsic_inertia: mass * length * length / 12.0,
        }
    }

    /// A thruster approximated as a solid cylinder scaled from its rating.
    ///
    /// `m = T / divisor`, `s = (T / 10)^(1/3)`, `r = 0.25 s`, `h = s`, `I = m (3r² + h²) / 12`.
    pub fn thruster(max_thrust: f32, mass_divisor: f32, position: Vec3) -> Self {
        let thrust = max_thrust.max(0.0);
        let mass = if mass_divisor > 0.0 {
            thrust / mass_divisor
        } else {
            0.0
        };
        let s = geometric_scale(thrust);
        let radius = 0.25 * s;
        let height = s;
        Self {
            mass,
            position,
            intrinsic_inertia: mass * (3.0 * radius * radius + height * height) / 12.0,
        }
    }
}

/// Builds and writes the vehicle's mass properties.
///
/// Rebuilding is idempotent: the same parts always produce the same result.
#[derive(Debug, Clone, Default)]
pub struct MassInertiaBuilder {
    settings: MassSettings,
}

impl MassInertiaBuilder {
    /// Creates a new builder.
    pub fn new(settings: MassSettings) -> Self {
        Self { settings }
    }

    /// Current settings.
    pub fn settings(&self) -> &MassSettings {
        &self.settings
    }

    /// Enables or disables the inflated non-yaw inertia terms.
    pub fn set_inflate_off_axis_inertia(&mut self, enabled: bool) {
        self.settings.inflate_off_axis_inertia = enabled;
    }

    /// Collects the body shell followed by every thruster and brake.
    pub fn collect_parts(&self, thrusters: &[Thruster], brakes: &[BrakeUnit]) -> Vec<MassPart> {
        let mut parts = Vec::with_capacity(1 + thrusters.len() + brakes.len());
        parts.push(MassPart::rod(
            self.settings.body_mass,
            self.settings.body_length,
            Vec3::ZERO,
        ));
        parts.extend(thrusters.iter().map(|t| {
            MassPart::thruster(t.max_thrust(), self.settings.thrust_mass_divisor, t.position())
        }));
        parts.extend(brakes.iter().map(|b| {
            MassPart::rod(
                self.settings.brake_mass,
                self.settings.brake_length,
                b.mount().position,
            )
        }));
        parts
    }

    /// Aggregates `parts` into mass, centre of mass and diagonal inertia.
    pub fn compute(&self, parts: &[MassPart]) -> MassProperties {
        let total_mass: f32 = parts.iter().map(|p| p.mass).sum();

        let center_of_mass = if total_mass > 0.0 {
            let weighted: Vec3 = parts.iter().map(|p| p.position * p.mass).sum();
            weighted / total_mass
        } else {
            Vec3::ZERO
        };

        let yaw_inertia: f64 = parts
            .iter()
            .map(|p| {
                let d2 = f64::from(p.position.planar_distance_squared_xz(center_of_mass));
                f64::from(p.intrinsic_inertia) + f64::from(p.mass) * d2
            })
            .sum();
        let yaw_inertia = yaw_inertia as f32;

        let off_axis = if self.settings.inflate_off_axis_inertia {
            (yaw_inertia * self.settings.lock_multiplier).max(1.0)
        } else {
            yaw_inertia
        };

        MassProperties {
            mass: total_mass,
            center_of_mass,
            principal_inertia: Vec3::new(off_axis, yaw_inertia, off_axis),
        }
    }

    /// Collects and aggregates the parts without touching any body.
    pub fn build(&self, thrusters: &[Thruster], brakes: &[BrakeUnit]) -> MassProperties {
        self.compute(&self.collect_parts(thrusters, brakes))
    }

    /// Rebuilds the mass properties and writes them onto `body`.
    pub fn rebuild(
        &self,
        thrusters: &[Thruster],
        brakes: &[BrakeUnit],
        body: &mut dyn RigidBodyProvider,
    ) -> MassProperties {
        let properties = self.build(thrusters, brakes);
        log::debug!(
            "Rebuilt mass properties: mass {:.3} kg, com ({:.3}, {:.3}, {:.3}), Iy {:.4}",
            properties.mass,
            properties.center_of_mass.x,
            properties.center_of_mass.y,
            properties.center_of_mass.z,
            properties.principal_inertia.y
        );
        body.set_mass_properties(properties);
        properties
    }
}
