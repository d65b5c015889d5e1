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

//! Fixed-tick simulation loop.

use crate::args::PhysicsBackend;
use anyhow::Result;
use skylark_core::math::Vec3;
use skylark_core::physics::{MassProperties, Pose, RigidBodyProvider};
use skylark_core::SimulationConfig;
use skylark_infra::physics::{RapierPhysicsWorld, RigidBodyHandle};
use skylark_io::{FrameMailbox, LinkStats, PacketRateMeter};
use skylark_lanes::physics_lane::STANDARD_GRAVITY;
use skylark_lanes::vehicle_lane::VehicleStepReport;
use skylark_lanes::{NativeRigidBody, Vehicle};

/// The vehicle's rigid body, on whichever engine was selected.
pub enum PhysicsBody {
    Native(NativeRigidBody),
    Rapier {
        world: RapierPhysicsWorld,
        handle: RigidBodyHandle,
    },
}

impl PhysicsBody {
    /// Creates a body at `pose` under `gravity`.
    pub fn new(backend: PhysicsBackend, pose: Pose, gravity: Vec3) -> Self {
        match backend {
            PhysicsBackend::Native => {
                let mut body = NativeRigidBody::new(pose, MassProperties::default());
                body.set_gravity(gravity);
                PhysicsBody::Native(body)
            }
            PhysicsBackend::Rapier => {
                let mut world = RapierPhysicsWorld::new();
                world.set_gravity(gravity);
                let handle = world.add_body(pose, MassProperties::default());
                PhysicsBody::Rapier { world, handle }
            }
        }
    }

    /// Runs `f` against the body.
    pub fn with_body<R>(&mut self, f: impl FnOnce(&mut dyn RigidBodyProvider) -> R) -> Option<R> {
        match self {
            PhysicsBody::Native(body) => Some(f(body)),
            PhysicsBody::Rapier { world, handle } => {
                let mut body = world.body_mut(*handle)?;
                Some(f(&mut body))
            }
        }
    }

    /// Integrates the forces accumulated this tick.
    pub fn advance(&mut self, dt: f32) {
        match self {
            PhysicsBody::Native(body) => body.integrate(dt),
            PhysicsBody::Rapier { world, .. } => world.step(dt),
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    /// `true` when a frame newer than the previous tick's was applied.
    pub fresh_frame: bool,
    pub vehicle: Option<VehicleStepReport>,
    pub packets_per_second: u64,
}

/// Vehicle plus body, fed from a frame mailbox.
pub struct Simulation {
    vehicle: Vehicle,
    body: PhysicsBody,
    dt: f32,
    tick: u64,
    last_sequence: Option<u64>,
    rate_meter: PacketRateMeter,
}

impl Simulation {
    /// Builds the vehicle from `config` and spawns its body at rest at the origin.
    ///
    /// Gravity is left off: the vehicle flies in the horizontal plane.
    pub fn new(config: &SimulationConfig, backend: PhysicsBackend, gravity: bool) -> Result<Self> {
        let mut vehicle = Vehicle::from_config(config)?;
        vehicle.set_inflate_off_axis_inertia(config.mass.inflate_off_axis_inertia);
        let gravity = if gravity {
            STANDARD_GRAVITY
        } else {
            Vec3::ZERO
        };
        Ok(Self {
            vehicle,
            body: PhysicsBody::new(backend, Pose::IDENTITY, gravity),
            dt: config.fixed_dt,
            tick: 0,
            last_sequence: None,
            rate_meter: PacketRateMeter::new(),
        })
    }

    /// Fixed timestep in seconds.
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Reads the latest frame, steps the vehicle and advances the body by one fixed tick.
    pub fn tick(&mut self, mailbox: &FrameMailbox, stats: &LinkStats) -> TickReport {
        let mut fresh_frame = false;
        if let Some((frame, sequence)) = mailbox.latest_with_sequence() {
            if self.last_sequence != Some(sequence) {
                self.last_sequence = Some(sequence);
                fresh_frame = self.vehicle.apply_frame(&frame);
            }
        }

        let dt = self.dt;
        let vehicle = &mut self.vehicle;
        let report = self.body.with_body(|body| vehicle.step(body, dt));
        self.body.advance(dt);

        self.tick += 1;
        TickReport {
            tick: self.tick,
            fresh_frame,
            vehicle: report,
            packets_per_second: self.rate_meter.tick(dt, stats),
        }
    }

    /// Body position and velocity.
    pub fn kinematics(&mut self) -> Option<(Vec3, Vec3)> {
        self.body
            .with_body(|body| (body.pose().position, body.linear_velocity()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylark_core::telemetry::SensorFrame;

    fn full_throttle() -> SensorFrame {
        SensorFrame::new([0, 512, 512, 512, 0, 0], 0)
    }

    #[test]
    fn test_no_frame_keeps_vehicle_idle() {
        let config = SimulationConfig::default();
        let mut sim = Simulation::new(&config, PhysicsBackend::Native, false).unwrap();
        let mailbox = FrameMailbox::new();
        let stats = LinkStats::new();

        let report = sim.tick(&mailbox, &stats);
        assert!(!report.fresh_frame);
        assert_eq!(report.tick, 1);
        let (_, velocity) = sim.kinematics().unwrap();
        assert_eq!(velocity, Vec3::ZERO);
    }

    #[test]
    fn test_frame_applied_once_per_publish() {
        let config = SimulationConfig::default();
        let mut sim = Simulation::new(&config, PhysicsBackend::Native, false).unwrap();
        let mailbox = FrameMailbox::new();
        let stats = LinkStats::new();

        mailbox.publish(full_throttle());
        assert!(sim.tick(&mailbox, &stats).fresh_frame);
        assert!(!sim.tick(&mailbox, &stats).fresh_frame);
        mailbox.publish(full_throttle());
        assert!(sim.tick(&mailbox, &stats).fresh_frame);
    }

    #[test]
    fn test_throttle_moves_vehicle_on_both_backends() {
        for backend in [PhysicsBackend::Native, PhysicsBackend::Rapier] {
            let config = SimulationConfig::default();
            let mut sim = Simulation::new(&config, backend, false).unwrap();
            let mailbox = FrameMailbox::new();
            let stats = LinkStats::new();
            mailbox.publish(full_throttle());

            let first = sim.tick(&mailbox, &stats);
            assert!(first.vehicle.unwrap().rebuilt_mass.is_some());
            for _ in 0..49 {
                sim.tick(&mailbox, &stats);
            }
            let (position, velocity) = sim.kinematics().unwrap();
            assert!(velocity.x > 0.5, "{backend:?}: {velocity:?}");
            assert!(position.x > 0.0, "{backend:?}: {position:?}");
        }
    }
}
