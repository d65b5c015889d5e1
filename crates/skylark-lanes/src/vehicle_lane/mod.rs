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

//! Vehicle Lane
//!
//! Owns the registered parts and runs every actuator once per fixed tick.

mod assembly;

pub use assembly::*;

use skylark_core::config::{SimulationConfig, ThrusterSettings};
use skylark_core::math::Vec3;
use skylark_core::physics::{MassProperties, RigidBodyProvider};
use skylark_core::telemetry::SensorFrame;

use crate::actuator_lane::{BrakeEnsembleLane, BrakeStepReport, BrakeUnit, Servo, Thruster};
use crate::control_lane::{ControlCommand, ControlMapper};
use crate::mass_lane::MassInertiaBuilder;

/// Summary of one vehicle tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleStepReport {
    /// Sum of the thrust forces applied this tick.
    pub total_thrust: Vec3,
    /// Brake ensemble outcome.
    pub brakes: BrakeStepReport,
    /// Mass properties written this tick, if a rebuild was pending.
    pub rebuilt_mass: Option<MassProperties>,
}

/// The controlled vehicle: its parts plus the lanes that drive them.
///
/// The rigid body is injected into every call; the vehicle never owns it.
#[derive(Debug)]
pub struct Vehicle {
    assembly: VehicleAssembly,
    mapper: ControlMapper,
    brake_lane: BrakeEnsembleLane,
    mass_builder: MassInertiaBuilder,
    thruster_settings: ThrusterSettings,
    last_command: Option<ControlCommand>,
    mass_dirty: bool,
}

impl Vehicle {
    /// Builds the vehicle described by `config`.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, AssemblyError> {
        let assembly = VehicleAssembly::from_config(config)?;
        Ok(Self::with_assembly(assembly, config))
    }

    /// Wraps an existing assembly using the lane settings from `config`.
    pub fn with_assembly(assembly: VehicleAssembly, config: &SimulationConfig) -> Self {
        Self {
            assembly,
            mapper: ControlMapper::new(config.control.clone()),
            brake_lane: BrakeEnsembleLane::new(config.brakes.clone()),
            mass_builder: MassInertiaBuilder::new(config.mass.clone()),
            thruster_settings: config.thrusters.clone(),
            last_command: None,
            mass_dirty: true,
        }
    }

    /// Registered parts.
    pub fn assembly(&self) -> &VehicleAssembly {
        &self.assembly
    }

    /// Mutable access to the parts. Marks the mass properties for rebuild.
    pub fn assembly_mut(&mut self) -> &mut VehicleAssembly {
        self.mass_dirty = true;
        &mut self.assembly
    }

    /// Registers a thruster and returns its index.
    pub fn add_thruster(&mut self, thruster: Thruster) -> usize {
        self.assembly_mut().add_thruster(thruster)
    }

    /// Registers a brake unit and returns its index.
    pub fn add_brake(&mut self, brake: BrakeUnit) -> usize {
        self.assembly_mut().add_brake(brake)
    }

    /// Removes the brake unit at `index`, if present.
    pub fn remove_brake(&mut self, index: usize) -> Option<BrakeUnit> {
        self.assembly_mut().remove_brake(index)
    }

    /// Attaches a servo to one of the registered thrusters.
    pub fn attach_servo(&mut self, servo: Servo) -> Result<usize, AssemblyError> {
        self.assembly.attach_servo(servo)
    }

    /// Toggles the inflated non-yaw inertia and schedules a rebuild.
    pub fn set_inflate_off_axis_inertia(&mut self, enabled: bool) {
        self.mass_builder.set_inflate_off_axis_inertia(enabled);
        self.mass_dirty = true;
    }

    /// `true` when the mass properties will be rebuilt on the next tick.
    pub fn is_mass_dirty(&self) -> bool {
        self.mass_dirty
    }

    /// Brake ensemble lane.
    pub fn brake_lane(&self) -> &BrakeEnsembleLane {
        &self.brake_lane
    }

    /// Last command applied.
    pub fn last_command(&self) -> Option<&ControlCommand> {
        self.last_command.as_ref()
    }

    /// Cosmetic exhaust emission of every thruster.
    pub fn emission_rates(&self) -> Vec<f32> {
        self.assembly
            .thrusters()
            .iter()
            .map(|t| t.emission_rate(&self.thruster_settings))
            .collect()
    }

    /// Maps and applies a controller reading. Returns `false` for invalid frames, which leave
    /// the previous commands in place.
    pub fn apply_frame(&mut self, frame: &SensorFrame) -> bool {
        match self.mapper.map(frame) {
            Some(command) => {
                self.apply_command(&command);
                true
            }
            None => false,
        }
    }

    /// Pushes `command` onto the actuators.
    pub fn apply_command(&mut self, command: &ControlCommand) {
        for thruster in self.assembly.thrusters_mut() {
            thruster.set_control(command.throttle);
        }
        for servo in self.assembly.servos_mut() {
            let sign = servo.command_sign();
            servo.set_target(command.servo_angle_deg * sign);
        }
        if let Some(brake) = command.brake {
            for unit in self.assembly.brakes_mut() {
                unit.set_control(brake);
            }
        }
        self.last_command = Some(*command);
    }

    /// Recomputes the mass properties from the current parts and writes them onto `body`.
    pub fn rebuild_mass(&mut self, body: &mut dyn RigidBodyProvider) -> MassProperties {
        self.mass_dirty = false;
        self.mass_builder
            .rebuild(self.assembly.thrusters(), self.assembly.brakes(), body)
    }

    /// Runs one fixed tick: pending mass rebuild, servos, thrust, then brakes.
    pub fn step(&mut self, body: &mut dyn RigidBodyProvider, dt: f32) -> VehicleStepReport {
        let rebuilt_mass = if self.mass_dirty {
            Some(self.rebuild_mass(body))
        } else {
            None
        };

        self.assembly.step_servos(dt);

        let total_thrust: Vec3 = self
            .assembly
            .thrusters()
            .iter()
            .map(|t| t.apply(&mut *body).force)
            .sum();

        let brakes = self
            .brake_lane
            .step(self.assembly.brakes_mut(), body, dt);

        VehicleStepReport {
            total_thrust,
            brakes,
            rebuilt_mass,
        }
    }
}
