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

//! Headless Skylark runtime.
//!
//! Reads the controller over the serial link (or a virtual one), maps it onto the vehicle's
//! actuators and steps the simulation at the configured fixed rate.

mod args;
mod controller;
mod sim;

use anyhow::{Context, Result};
use args::Options;
use clap::Parser;
use controller::VirtualController;
use sim::Simulation;
use skylark_core::SimulationConfig;
use skylark_infra::serial::SystemSerialBackend;
use skylark_io::{MemoryBackend, SerialLinkManager};
use std::time::{Duration, Instant};

const VIRTUAL_PORT: &str = "virtual0";
const VIRTUAL_FRAME_PERIOD: Duration = Duration::from_millis(20);

fn load_config(options: &Options) -> Result<SimulationConfig> {
    let config = match &options.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => {
            log::info!("No config file given, using defaults");
            SimulationConfig::default()
        }
    };
    Ok(config.sanitized())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let options = Options::parse();

    let config = load_config(&options)?;
    let mut simulation = Simulation::new(&config, options.physics, options.gravity)
        .context("failed to assemble the vehicle")?;

    let mut virtual_controller = None;
    let mut link = if options.virtual_controller {
        let backend = MemoryBackend::new();
        let writer = backend.add_port(VIRTUAL_PORT);
        virtual_controller = Some(VirtualController::spawn(
            writer,
            config.control.clone(),
            VIRTUAL_FRAME_PERIOD,
        )?);
        SerialLinkManager::new(config.serial.clone(), backend)
    } else {
        SerialLinkManager::new(config.serial.clone(), SystemSerialBackend)
    };

    if config.serial.auto_open {
        link.start()?;
    } else {
        log::info!("Serial link left closed (auto_open = false)");
    }

    let mailbox = link.mailbox();
    let stats = link.stats().clone();
    let dt = simulation.dt();
    let tick_period = Duration::from_secs_f32(dt);
    let ticks_per_status = (1.0 / dt).round().max(1.0) as u64;
    log::info!(
        "Simulating at {:.0} Hz with {:?} physics",
        1.0 / dt,
        options.physics
    );

    let mut fresh_frames = 0u64;
    let mut next_tick = Instant::now();
    loop {
        if options.ticks.is_some_and(|limit| simulation.ticks() >= limit) {
            break;
        }
        if options.ticks.is_none() && config.serial.auto_open && !link.is_running() {
            log::warn!("Serial link stopped, ending the run");
            break;
        }

        let report = simulation.tick(&mailbox, &stats);
        fresh_frames += u64::from(report.fresh_frame);
        if report.tick % ticks_per_status == 0 {
            let (position, velocity) = simulation.kinematics().unwrap_or_default();
            let brakes = report.vehicle.map(|v| v.brakes.regime);
            log::info!(
                "t={:.1}s link={} pps={} applied={} pos=({:.2}, {:.2}, {:.2}) speed={:.2} brakes={:?}",
                report.tick as f32 * dt,
                link.state(),
                report.packets_per_second,
                std::mem::take(&mut fresh_frames),
                position.x,
                position.y,
                position.z,
                velocity.length(),
                brakes
            );
        }

        if options.realtime() {
            next_tick += tick_period;
            let now = Instant::now();
            if next_tick > now {
                std::thread::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }
    }

    link.stop();
    if let Some(mut controller) = virtual_controller {
        controller.stop();
    }
    let totals = stats.snapshot();
    log::info!(
        "Done: {} packets, {} checksum errors, {} framing errors, {} reconnects",
        totals.packets,
        totals.checksum_errors,
        totals.framing_errors,
        totals.reconnects
    );
    Ok(())
}
