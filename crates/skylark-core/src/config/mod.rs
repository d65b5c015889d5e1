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

//! Simulation configuration.
//!
//! Every tunable the lanes and the serial link expose lives in one `serde` tree that is
//! loaded from RON. All fields are defaulted, so a configuration file only needs to list the
//! values it changes. Numeric parameters are not cross-validated; [`SimulationConfig::sanitized`]
//! clamps each of them to its documented range.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Root of the configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed simulation step in seconds.
    pub fixed_dt: f32,
    /// Brake ensemble parameters.
    pub brakes: BrakeSettings,
    /// Mass and inertia synthesis parameters.
    pub mass: MassSettings,
    /// Thruster parameters.
    pub thrusters: ThrusterSettings,
    /// Mapping from controller readings to actuator commands.
    pub control: ControlSettings,
    /// Serial link parameters.
    pub serial: SerialSettings,
    /// Registered actuator placements.
    pub assembly: AssemblyConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 0.02,
            brakes: BrakeSettings::default(),
            mass: MassSettings::default(),
            thrusters: ThrusterSettings::default(),
            control: ControlSettings::default(),
            serial: SerialSettings::default(),
            assembly: AssemblyConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Parses a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Loads a configuration from a RON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        Self::from_ron_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }

    /// Serializes the configuration as pretty-printed RON.
    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Returns a copy with every numeric parameter clamped to its documented range.
    pub fn sanitized(&self) -> Self {
        let mut out = self.clone();
        out.fixed_dt = clamp_or(self.fixed_dt, 1e-4, 0.1, 0.02);
        out.brakes = self.brakes.sanitized();
        out.mass = self.mass.sanitized();
        out.thrusters = self.thrusters.sanitized();
        out.control = self.control.sanitized();
        out.serial = self.serial.sanitized();
        let thrust_limit = out.thrusters.max_thrust_limit;
        for thruster in &mut out.assembly.thrusters {
            thruster.max_thrust = clamp_or(thruster.max_thrust, 0.0, thrust_limit, 0.0);
        }
        if out != *self {
            log::debug!("Configuration values were clamped to their documented ranges");
        }
        out
    }
}

/// Clamps `value` into `[min, max]`, substituting `fallback` for `NaN`.
fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Brake ensemble parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrakeSettings {
    /// Quadratic drag constant pushed down to every brake unit each tick.
    pub drag_constant: f32,
    /// Speed below which the body is considered stopped (m/s).
    pub stop_speed: f32,
    /// Fraction of the body's momentum the combined braking impulse may cancel in one step.
    pub safety_factor: f32,
    /// Uniform force scale applied while the body is below `stop_speed`.
    pub low_speed_scale: f32,
    /// Flap deflection at full control, in degrees. Cosmetic only.
    pub max_deflection_deg: f32,
}

impl Default for BrakeSettings {
    fn default() -> Self {
        Self {
            drag_constant: 10.0,
            stop_speed: 0.1,
            safety_factor: 0.95,
            low_speed_scale: 0.5,
            max_deflection_deg: 90.0,
        }
    }
}

impl BrakeSettings {
    fn sanitized(&self) -> Self {
        Self {
            drag_constant: clamp_or(self.drag_constant, 0.0, 1000.0, 10.0),
            stop_speed: clamp_or(self.stop_speed, 1e-3, 10.0, 0.1),
            safety_factor: clamp_or(self.safety_factor, 0.0, 0.999, 0.95),
            low_speed_scale: clamp_or(self.low_speed_scale, 0.0, 1.0, 0.5),
            max_deflection_deg: clamp_or(self.max_deflection_deg, 0.0, 180.0, 90.0),
        }
    }
}

/// Mass and inertia synthesis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MassSettings {
    /// Mass of the body shell (kg).
    pub body_mass: f32,
    /// Length of the body shell (m).
    pub body_length: f32,
    /// Mass of one brake unit (kg).
    pub brake_mass: f32,
    /// Length of one brake unit (m).
    pub brake_length: f32,
    /// Thrust rating (N) per kilogram of thruster mass.
    pub thrust_mass_divisor: f32,
    /// Inflate the two non-yaw inertia terms to suppress tumbling.
    pub inflate_off_axis_inertia: bool,
    /// Multiplier applied to the yaw inertia to obtain the inflated terms.
    pub lock_multiplier: f32,
}

impl Default for MassSettings {
    fn default() -> Self {
        Self {
            body_mass: 10.0,
            body_length: 2.0,
            brake_mass: 0.1,
            brake_length: 1.0,
            thrust_mass_divisor: 10.0,
            inflate_off_axis_inertia: false,
            lock_multiplier: 1000.0,
        }
    }
}

impl MassSettings {
    fn sanitized(&self) -> Self {
        Self {
            body_mass: clamp_or(self.body_mass, 0.0, 1.0e4, 10.0),
            body_length: clamp_or(self.body_length, 0.0, 100.0, 2.0),
            brake_mass: clamp_or(self.brake_mass, 0.0, 1.0e3, 0.1),
            brake_length: clamp_or(self.brake_length, 0.0, 100.0, 1.0),
            thrust_mass_divisor: clamp_or(self.thrust_mass_divisor, 1e-3, 1.0e4, 10.0),
            inflate_off_axis_inertia: self.inflate_off_axis_inertia,
            lock_multiplier: clamp_or(self.lock_multiplier, 1.0, 1.0e6, 1000.0),
        }
    }
}

/// Thruster parameters shared by every thruster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrusterSettings {
    /// Upper bound on any thruster's rating (N).
    pub max_thrust_limit: f32,
    /// Control value below which no exhaust is emitted. Cosmetic only.
    pub emission_dead_zone: f32,
    /// Exhaust particles per second at full control. Cosmetic only.
    pub max_emission: f32,
}

impl Default for ThrusterSettings {
    fn default() -> Self {
        Self {
            max_thrust_limit: 60.0,
            emission_dead_zone: 0.1,
            max_emission: 100.0,
        }
    }
}

impl ThrusterSettings {
    fn sanitized(&self) -> Self {
        Self {
            max_thrust_limit: clamp_or(self.max_thrust_limit, 0.0, 60.0, 60.0),
            emission_dead_zone: clamp_or(self.emission_dead_zone, 0.0, 1.0, 0.1),
            max_emission: clamp_or(self.max_emission, 0.0, 1.0e4, 100.0),
        }
    }
}

/// Mapping from raw controller readings to actuator commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Raw reading of a centred joystick axis.
    pub joystick_center: f32,
    /// Raw distance from centre treated as neutral.
    pub joystick_deadzone: f32,
    /// Servo deflection at full yaw stick, in degrees.
    pub max_servo_angle_deg: f32,
    /// Servo slew-rate limit in degrees per second.
    pub servo_slew_deg_per_s: f32,
    /// Analog channel carrying the throttle stick.
    pub throttle_channel: usize,
    /// Analog channel carrying the yaw stick.
    pub yaw_channel: usize,
    /// Analog channel driving the brake flaps, if any.
    pub brake_channel: Option<usize>,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            joystick_center: 512.0,
            joystick_deadzone: 50.0,
            max_servo_angle_deg: 45.0,
            servo_slew_deg_per_s: 180.0,
            throttle_channel: 0,
            yaw_channel: 3,
            brake_channel: Some(4),
        }
    }
}

impl ControlSettings {
    fn sanitized(&self) -> Self {
        let center = clamp_or(self.joystick_center, 1.0, 1023.0, 512.0);
        Self {
            joystick_center: center,
            joystick_deadzone: clamp_or(self.joystick_deadzone, 0.0, center, 50.0),
            max_servo_angle_deg: clamp_or(self.max_servo_angle_deg, 0.0, 90.0, 45.0),
            servo_slew_deg_per_s: clamp_or(self.servo_slew_deg_per_s, 0.0, 1.0e4, 180.0),
            throttle_channel: self.throttle_channel.min(5),
            yaw_channel: self.yaw_channel.min(5),
            brake_channel: self.brake_channel.map(|c| c.min(5)),
        }
    }
}

/// Serial link parameters. Timings are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Fixed port to open when auto-detection is disabled.
    pub port_name: Option<String>,
    /// Line speed.
    pub baud_rate: u32,
    /// Start the link together with the runtime.
    pub auto_open: bool,
    /// Return to scanning after a link fault instead of stopping.
    pub auto_reconnect: bool,
    /// Probe every enumerated port for a valid frame.
    pub auto_detect: bool,
    /// Wait after opening a port, letting a reset-on-open controller reboot.
    pub open_settle_ms: u64,
    /// Maximum probe attempts per candidate port.
    pub probe_packets: u32,
    /// Additional warm-up before probing a candidate.
    pub detect_warmup_ms: u64,
    /// Window shared by all probe attempts to find a start marker.
    pub detect_find_start_ms: u64,
    /// Per-read timeout while probing.
    pub detect_read_timeout_ms: u64,
    /// Per-read timeout while connected.
    pub read_timeout_ms: u64,
    /// Pause before scanning again after a failed scan or a link fault.
    pub reconnect_wait_ms: u64,
    /// Bounded wait for the receive thread when stopping.
    pub join_timeout_ms: u64,
    /// Consecutive decode failures tolerated before the link is considered faulty (0 = never).
    pub max_consecutive_decode_errors: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port_name: None,
            baud_rate: 115_200,
            auto_open: true,
            auto_reconnect: true,
            auto_detect: true,
            open_settle_ms: 500,
            probe_packets: 3,
            detect_warmup_ms: 1200,
            detect_find_start_ms: 1500,
            detect_read_timeout_ms: 100,
            read_timeout_ms: 20,
            reconnect_wait_ms: 500,
            join_timeout_ms: 300,
            max_consecutive_decode_errors: 200,
        }
    }
}

impl SerialSettings {
    fn sanitized(&self) -> Self {
        const MAX_MS: u64 = 60_000;
        Self {
            port_name: self.port_name.clone().filter(|p| !p.trim().is_empty()),
            baud_rate: self.baud_rate.clamp(300, 4_000_000),
            auto_open: self.auto_open,
            auto_reconnect: self.auto_reconnect,
            auto_detect: self.auto_detect,
            open_settle_ms: self.open_settle_ms.min(MAX_MS),
            probe_packets: self.probe_packets.clamp(1, 100),
            detect_warmup_ms: self.detect_warmup_ms.min(MAX_MS),
            detect_find_start_ms: self.detect_find_start_ms.clamp(1, MAX_MS),
            detect_read_timeout_ms: self.detect_read_timeout_ms.clamp(1, MAX_MS),
            read_timeout_ms: self.read_timeout_ms.clamp(1, MAX_MS),
            reconnect_wait_ms: self.reconnect_wait_ms.min(MAX_MS),
            join_timeout_ms: self.join_timeout_ms.min(MAX_MS),
            max_consecutive_decode_errors: self.max_consecutive_decode_errors,
        }
    }

    /// Settle interval after opening a port.
    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }

    /// Warm-up before probing.
    pub fn detect_warmup(&self) -> Duration {
        Duration::from_millis(self.detect_warmup_ms)
    }

    /// Start-marker search window while probing.
    pub fn detect_find_start(&self) -> Duration {
        Duration::from_millis(self.detect_find_start_ms)
    }

    /// Per-read timeout while probing.
    pub fn detect_read_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_read_timeout_ms)
    }

    /// Per-read timeout while connected.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Pause between scan cycles.
    pub fn reconnect_wait(&self) -> Duration {
        Duration::from_millis(self.reconnect_wait_ms)
    }

    /// Bounded join wait on stop.
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Registered actuator placements, expressed in the body's local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Thrusters, in registration order.
    pub thrusters: Vec<ThrusterPlacement>,
    /// Brake units, in registration order.
    pub brakes: Vec<BrakePlacement>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            thrusters: vec![
                ThrusterPlacement {
                    position: Vec3::new(-1.0, 0.0, 0.4),
                    rotation_deg: Vec3::ZERO,
                    max_thrust: 10.0,
                    servo: Some(ServoMount {
                        axis: Vec3::Y,
                        command_sign: 1.0,
                    }),
                },
                ThrusterPlacement {
                    position: Vec3::new(-1.0, 0.0, -0.4),
                    rotation_deg: Vec3::ZERO,
                    max_thrust: 10.0,
                    servo: Some(ServoMount {
                        axis: Vec3::Y,
                        command_sign: -1.0,
                    }),
                },
            ],
            brakes: vec![
                BrakePlacement {
                    position: Vec3::new(0.2, 0.0, 0.5),
                    rotation_deg: Vec3::ZERO,
                },
                BrakePlacement {
                    position: Vec3::new(0.2, 0.0, -0.5),
                    rotation_deg: Vec3::ZERO,
                },
            ],
        }
    }
}

/// Placement of one thruster. Thrust acts along the thruster's local +X axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrusterPlacement {
    /// Mount position in the body frame.
    pub position: Vec3,
    /// Mount orientation as Euler angles in degrees.
    pub rotation_deg: Vec3,
    /// Thrust rating (N).
    pub max_thrust: f32,
    /// Servo gimbal, if the thruster is vectored.
    pub servo: Option<ServoMount>,
}

impl Default for ThrusterPlacement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation_deg: Vec3::ZERO,
            max_thrust: 10.0,
            servo: None,
        }
    }
}

/// A servo gimbal under a thruster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoMount {
    /// Rotation axis in the thruster's mount frame.
    pub axis: Vec3,
    /// Sign applied to the yaw command (`1.0` or `-1.0`).
    pub command_sign: f32,
}

impl Default for ServoMount {
    fn default() -> Self {
        Self {
            axis: Vec3::Y,
            command_sign: 1.0,
        }
    }
}

/// Placement of one brake unit. The flap drags along local +X, the passive surface along local +Y.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BrakePlacement {
    /// Mount position in the body frame.
    pub position: Vec3,
    /// Mount orientation as Euler angles in degrees.
    pub rotation_deg: Vec3,
}
