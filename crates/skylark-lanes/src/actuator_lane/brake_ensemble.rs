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

use skylark_core::config::BrakeSettings;
use skylark_core::math::{Vec3, EPSILON};
use skylark_core::physics::RigidBodyProvider;

use super::{AppliedForce, BrakeUnit};

/// Which branch of the momentum bound a brake step went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrakeRegime {
    /// Nothing was applied (no brakes, invalid step or non-finite forces).
    Idle,
    /// The body was moving and the combined impulse stayed within the bound.
    Unlimited,
    /// The combined impulse would have reversed the body and was scaled down.
    Limited,
    /// The body was below the stop speed and the fallback scale was applied.
    LowSpeed,
}

/// Summary of one brake ensemble step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrakeStepReport {
    /// Sum of the unscaled brake forces.
    pub total_force: Vec3,
    /// Component of the scaled total impulse along the pre-step velocity.
    pub parallel_impulse: f32,
    /// Uniform scale applied to every brake force.
    pub scale: f32,
    /// Branch taken.
    pub regime: BrakeRegime,
}

impl BrakeStepReport {
    fn idle() -> Self {
        Self {
            total_force: Vec3::ZERO,
            parallel_impulse: 0.0,
            scale: 0.0,
            regime: BrakeRegime::Idle,
        }
    }
}

/// Computes the uniform scale that keeps a braking impulse from reversing the body.
///
/// `impulse` is the total unscaled impulse `F * dt`. Above `stop_speed` the opposing component
/// along the velocity is capped at `mass * speed * safety_factor`; below it `low_speed_scale` is
/// returned because there is no direction to reference.
pub fn momentum_limit_scale(
    impulse: Vec3,
    velocity: Vec3,
    mass: f32,
    settings: &BrakeSettings,
) -> (f32, BrakeRegime) {
    let speed = velocity.length();
    if !speed.is_finite() || speed <= settings.stop_speed.max(EPSILON) {
        return (settings.low_speed_scale, BrakeRegime::LowSpeed);
    }

    let direction = velocity / speed;
    let j_parallel = impulse.dot(direction);
    let max_abs_parallel = mass.max(0.0) * speed * settings.safety_factor;

    if j_parallel < -max_abs_parallel && j_parallel.abs() > EPSILON {
        (max_abs_parallel / j_parallel.abs(), BrakeRegime::Limited)
    } else {
        (1.0, BrakeRegime::Unlimited)
    }
}

/// Applies the combined drag of every brake unit as momentum-bounded impulses.
///
/// The per-step force list is transient: it is cleared and rebuilt on every call.
#[derive(Debug)]
pub struct BrakeEnsembleLane {
    settings: BrakeSettings,
    forces: Vec<AppliedForce>,
    last_report: BrakeStepReport,
}

impl Default for BrakeEnsembleLane {
    fn default() -> Self {
        Self::new(BrakeSettings::default())
    }
}

impl BrakeEnsembleLane {
    /// Creates a new lane with the given settings.
    pub fn new(settings: BrakeSettings) -> Self {
        Self {
            settings,
            forces: Vec::new(),
            last_report: BrakeStepReport::idle(),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &BrakeSettings {
        &self.settings
    }

    /// Replaces the settings; they take effect on the next step.
    pub fn set_settings(&mut self, settings: BrakeSettings) {
        self.settings = settings;
    }

    /// Report of the most recent step.
    pub fn last_report(&self) -> BrakeStepReport {
        self.last_report
    }

    /// Forces (already scaled) applied during the most recent step.
    pub fn applied_forces(&self) -> &[AppliedForce] {
        &self.forces
    }

    /// Executes one brake step over `brakes` against `body`.
    pub fn step(
        &mut self,
        brakes: &mut [BrakeUnit],
        body: &mut dyn RigidBodyProvider,
        dt: f32,
    ) -> BrakeStepReport {
        self.forces.clear();
        self.last_report = BrakeStepReport::idle();

        if brakes.is_empty() || !dt.is_finite() || dt <= 0.0 {
            return self.last_report;
        }

        for brake in brakes.iter_mut() {
            brake.set_drag_constant(self.settings.drag_constant);
            brake.set_max_deflection(self.settings.max_deflection_deg);
            self.forces.push(brake.compute_force(&*body));
            brake.update_deflection();
        }

        let total_force: Vec3 = self.forces.iter().map(|f| f.force).sum();
        if !total_force.is_finite() {
            log::warn!("Brake forces are not finite, skipping brake step");
            self.forces.clear();
            return self.last_report;
        }

        let velocity = body.linear_velocity();
        let (scale, regime) =
            momentum_limit_scale(total_force * dt, velocity, body.mass(), &self.settings);

        if regime == BrakeRegime::Limited {
            log::trace!("Brake impulse limited with scale {scale:.4}");
        }

        for applied in &mut self.forces {
            applied.force = applied.force * scale;
            body.apply_impulse_at_point(applied.force * dt, applied.point);
        }

        let speed = velocity.length();
        let parallel_impulse = if speed > EPSILON && speed.is_finite() {
            (total_force * (scale * dt)).dot(velocity / speed)
        } else {
            0.0
        };

        self.last_report = BrakeStepReport {
            total_force,
            parallel_impulse,
            scale,
            regime,
        };
        self.last_report
    }
}
