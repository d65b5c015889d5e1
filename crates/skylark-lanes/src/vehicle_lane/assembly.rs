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

use skylark_core::config::SimulationConfig;
use thiserror::Error;

use crate::actuator_lane::{BrakeUnit, Servo, Thruster};

/// Errors raised while registering parts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    /// A servo references a thruster that is not registered.
    #[error("servo references thruster {index}, but only {count} thrusters are registered")]
    UnknownThruster {
        /// Referenced thruster index.
        index: usize,
        /// Number of registered thrusters.
        count: usize,
    },
    /// The thruster already has a servo.
    #[error("thruster {0} already has a servo attached")]
    ServoAlreadyAttached(usize),
}

/// Explicit registry of the parts mounted on the vehicle, in registration order.
#[derive(Debug, Clone, Default)]
pub struct VehicleAssembly {
    thrusters: Vec<Thruster>,
    servos: Vec<Servo>,
    brakes: Vec<BrakeUnit>,
}

impl VehicleAssembly {
    /// Creates an empty assembly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the assembly described by `config.assembly`.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, AssemblyError> {
        let mut assembly = Self::new();
        for placement in &config.assembly.thrusters {
            let index =
                assembly.add_thruster(Thruster::from_placement(placement, &config.thrusters));
            if let Some(mount) = &placement.servo {
                assembly.attach_servo(Servo::from_mount(index, mount, &config.control))?;
            }
        }
        for placement in &config.assembly.brakes {
            assembly.add_brake(BrakeUnit::from_placement(placement));
        }
        log::info!(
            "Vehicle assembled: {} thrusters, {} servos, {} brakes",
            assembly.thrusters.len(),
            assembly.servos.len(),
            assembly.brakes.len()
        );
        Ok(assembly)
    }

    /// Registers a thruster and returns its index.
    pub fn add_thruster(&mut self, thruster: Thruster) -> usize {
        self.thrusters.push(thruster);
        self.thrusters.len() - 1
    }

    /// Registers a brake unit and returns its index.
    pub fn add_brake(&mut self, brake: BrakeUnit) -> usize {
        self.brakes.push(brake);
        self.brakes.len() - 1
    }

    /// Removes the brake unit at `index`.
    pub fn remove_brake(&mut self, index: usize) -> Option<BrakeUnit> {
        (index < self.brakes.len()).then(|| self.brakes.remove(index))
    }

    /// Attaches `servo` to the thruster it references and returns the servo index.
    pub fn attach_servo(&mut self, servo: Servo) -> Result<usize, AssemblyError> {
        let index = servo.thruster();
        if index >= self.thrusters.len() {
            return Err(AssemblyError::UnknownThruster {
                index,
                count: self.thrusters.len(),
            });
        }
        if self.servos.iter().any(|s| s.thruster() == index) {
            return Err(AssemblyError::ServoAlreadyAttached(index));
        }
        self.servos.push(servo);
        Ok(self.servos.len() - 1)
    }

    /// Registered thrusters.
    pub fn thrusters(&self) -> &[Thruster] {
        &self.thrusters
    }

    /// Mutable access to the thrusters.
    pub fn thrusters_mut(&mut self) -> &mut [Thruster] {
        &mut self.thrusters
    }

    /// Registered servos.
    pub fn servos(&self) -> &[Servo] {
        &self.servos
    }

    /// Mutable access to the servos.
    pub fn servos_mut(&mut self) -> &mut [Servo] {
        &mut self.servos
    }

    /// Registered brake units.
    pub fn brakes(&self) -> &[BrakeUnit] {
        &self.brakes
    }

    /// Mutable access to the brake units.
    pub fn brakes_mut(&mut self) -> &mut [BrakeUnit] {
        &mut self.brakes
    }

    /// Advances every servo and copies its rotation onto its thruster.
    pub fn step_servos(&mut self, dt: f32) {
        for servo in &mut self.servos {
            servo.step(dt);
            if let Some(thruster) = self.thrusters.get_mut(servo.thruster()) {
                thruster.set_gimbal(servo.rotation());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylark_core::math::Vec3;
    use skylark_core::physics::Pose;

    #[test]
    fn test_default_config_assembles() {
        let assembly = VehicleAssembly::from_config(&SimulationConfig::default()).unwrap();
        assert_eq!(assembly.thrusters().len(), 2);
        assert_eq!(assembly.servos().len(), 2);
        assert_eq!(assembly.brakes().len(), 2);
        assert_eq!(assembly.servos()[1].command_sign(), -1.0);
    }

    #[test]
    fn test_servo_must_reference_a_thruster() {
        let mut assembly = VehicleAssembly::new();
        let err = assembly
            .attach_servo(Servo::new(0, Vec3::Y, 45.0, 0.0))
            .unwrap_err();
        assert_eq!(err, AssemblyError::UnknownThruster { index: 0, count: 0 });

        assembly.add_thruster(Thruster::new(Pose::IDENTITY, 10.0));
        assert_eq!(assembly.attach_servo(Servo::new(0, Vec3::Y, 45.0, 0.0)), Ok(0));
        assert_eq!(
            assembly.attach_servo(Servo::new(0, Vec3::Y, 45.0, 0.0)),
            Err(AssemblyError::ServoAlreadyAttached(0))
        );
    }

    #[test]
    fn test_servo_step_updates_gimbal() {
        let mut assembly = VehicleAssembly::new();
        assembly.add_thruster(Thruster::new(Pose::IDENTITY, 10.0));
        assembly
            .attach_servo(Servo::new(0, Vec3::Y, 90.0, 0.0))
            .unwrap();
        assembly.servos_mut()[0].set_target(90.0);
        assembly.step_servos(0.02);
        let direction = assembly.thrusters()[0].local_pose().rotation * Vec3::X;
        assert!((direction - (-Vec3::Z)).length() < 1e-5);
    }

    #[test]
    fn test_remove_brake_out_of_range() {
        let mut assembly = VehicleAssembly::new();
        assert!(assembly.remove_brake(3).is_none());
    }
}
