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

//! Synthetic controller that streams frames into an in-memory port.
//!
//! The flight profile: throttle ramps to full over the first seconds while the yaw stick sweeps,
//! then the brake channel is pulled and the throttle released.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use skylark_core::config::ControlSettings;
use skylark_core::telemetry::{SensorFrame, ANALOG_CHANNELS};
use skylark_io::{encode_frame, MemoryPortWriter};
use std::f32::consts::TAU;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const RAW_MAX: f32 = 1023.0;
const THROTTLE_RAMP_S: f32 = 4.0;
const BRAKE_AT_S: f32 = 8.0;
const YAW_PERIOD_S: f32 = 6.0;
const YAW_AMPLITUDE: f32 = 0.6;

/// Builds the frame the virtual controller sends `elapsed_s` seconds after starting.
pub fn synthetic_frame(elapsed_s: f32, settings: &ControlSettings) -> SensorFrame {
    let center = settings.joystick_center;
    let mut analog = [center.clamp(0.0, RAW_MAX) as u16; ANALOG_CHANNELS];

    let braking = elapsed_s >= BRAKE_AT_S;
    let throttle = if braking {
        0.0
    } else {
        (elapsed_s / THROTTLE_RAMP_S).clamp(0.0, 1.0)
    };
    // Throttle grows as the stick is pushed towards 0.
    let throttle_raw = (center - settings.joystick_deadzone) * (1.0 - throttle);
    let yaw_raw = center + center * YAW_AMPLITUDE * (TAU * elapsed_s / YAW_PERIOD_S).sin();

    set_channel(&mut analog, settings.throttle_channel, throttle_raw);
    set_channel(&mut analog, settings.yaw_channel, yaw_raw);
    if let Some(channel) = settings.brake_channel {
        set_channel(&mut analog, channel, if braking { RAW_MAX } else { 0.0 });
    }

    let buttons = if braking { 0b0_0001 } else { 0 };
    SensorFrame::new(analog, buttons)
}

fn set_channel(analog: &mut [u16; ANALOG_CHANNELS], channel: usize, raw: f32) {
    if let Some(slot) = analog.get_mut(channel) {
        *slot = raw.round().clamp(0.0, RAW_MAX) as u16;
    }
}

/// Background thread writing [`synthetic_frame`]s at a fixed rate.
pub struct VirtualController {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl VirtualController {
    /// Starts streaming into `writer` every `period`.
    pub fn spawn(
        writer: MemoryPortWriter,
        settings: ControlSettings,
        period: Duration,
    ) -> std::io::Result<Self> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("skylark-virtual-controller".into())
            .spawn(move || {
                let started = Instant::now();
                loop {
                    let frame = synthetic_frame(started.elapsed().as_secs_f32(), &settings);
                    if !writer.write(&encode_frame(&frame)) {
                        log::warn!("Virtual controller port closed");
                        break;
                    }
                    match shutdown_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                }
            })?;
        log::info!("Virtual controller streaming every {period:?}");
        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stops the stream and joins the thread.
    pub fn stop(&mut self) {
        self.shutdown_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Virtual controller thread panicked");
            }
        }
    }
}

impl Drop for VirtualController {
    fn drop(&mut self) {
        self.stop();
    }
}
