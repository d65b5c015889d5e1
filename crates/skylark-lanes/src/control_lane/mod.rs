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

//! Control Lane
//!
//! Maps raw controller readings onto actuator commands.

use skylark_core::config::ControlSettings;
use skylark_core::math::{inverse_lerp, saturate};
use skylark_core::telemetry::{SensorFrame, BUTTON_COUNT};

/// Actuator commands derived from one controller reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlCommand {
    /// Throttle applied to every thruster, in `[0, 1]`.
    pub throttle: f32,
    /// Normalised yaw stick in `[-1, 1]`.
    pub yaw: f32,
    /// Servo deflection for the yaw stick in degrees, before each servo's sign.
    pub servo_angle_deg: f32,
    /// Brake flap command in `[0, 1]`, when a brake channel is mapped.
    pub brake: Option<f32>,
    /// Button states.
    pub buttons: [bool; BUTTON_COUNT],
}

/// Turns [`SensorFrame`]s into [`ControlCommand`]s.
#[derive(Debug, Clone, Default)]
pub struct ControlMapper {
    settings: ControlSettings,
}

impl ControlMapper {
    /// Creates a new mapper.
    pub fn new(settings: ControlSettings) -> Self {
        Self { settings }
    }

    /// Current settings.
    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    /// Maps `frame`. Invalid frames produce no command.
    pub fn map(&self, frame: &SensorFrame) -> Option<ControlCommand> {
        if !frame.valid {
            return None;
        }

        let yaw = self.yaw(frame);
        Some(ControlCommand {
            throttle: self.throttle(frame),
            yaw,
            servo_angle_deg: yaw * self.settings.max_servo_angle_deg,
            brake: self
                .settings
                .brake_channel
                .and_then(|channel| frame.channel_normalized(channel))
                .map(saturate),
            buttons: frame.pressed(),
        })
    }

    /// Throttle rises from 0 at `center - deadzone` to 1 at a raw reading of 0.
    fn throttle(&self, frame: &SensorFrame) -> f32 {
        let raw = frame
            .channel(self.settings.throttle_channel)
            .map(f32::from)
            .unwrap_or(self.settings.joystick_center);
        let start = self.settings.joystick_center - self.settings.joystick_deadzone;
        if raw < start {
            saturate(inverse_lerp(start, 0.0, raw))
        } else {
            0.0
        }
    }

    fn yaw(&self, frame: &SensorFrame) -> f32 {
        let center = self.settings.joystick_center;
        if center <= 0.0 {
            return 0.0;
        }
        let raw = frame
            .channel(self.settings.yaw_channel)
            .map(f32::from)
            .unwrap_or(center);
        let yaw = (raw - center) / center;
        if yaw.abs() < self.settings.joystick_deadzone / center {
            0.0
        } else {
            yaw.clamp(-1.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame(a0: u16, a3: u16, a4: u16, buttons: u8) -> SensorFrame {
        SensorFrame::new([a0, 512, 512, a3, a4, 0], buttons)
    }

    #[test]
    fn test_centered_sticks_are_neutral() {
        let mapper = ControlMapper::default();
        let cmd = mapper.map(&frame(512, 512, 0, 0)).unwrap();
        assert_eq!(cmd.throttle, 0.0);
        assert_eq!(cmd.yaw, 0.0);
        assert_eq!(cmd.servo_angle_deg, 0.0);
        assert_eq!(cmd.brake, Some(0.0));
        assert_eq!(cmd.buttons, [false; BUTTON_COUNT]);
    }

    #[test]
    fn test_throttle_ramps_below_deadzone() {
        let mapper = ControlMapper::default();
        assert_eq!(mapper.map(&frame(470, 512, 0, 0)).unwrap().throttle, 0.0);
        assert_relative_eq!(mapper.map(&frame(231, 512, 0, 0)).unwrap().throttle, 0.5);
        assert_eq!(mapper.map(&frame(0, 512, 0, 0)).unwrap().throttle, 1.0);
        assert_eq!(mapper.map(&frame(1023, 512, 0, 0)).unwrap().throttle, 0.0);
    }

    #[test]
    fn test_yaw_maps_to_servo_angle() {
        let mapper = ControlMapper::default();
        let cmd = mapper.map(&frame(512, 768, 0, 0)).unwrap();
        assert_relative_eq!(cmd.yaw, 0.5);
        assert_relative_eq!(cmd.servo_angle_deg, 22.5);

        let cmd = mapper.map(&frame(512, 540, 0, 0)).unwrap();
        assert_eq!(cmd.yaw, 0.0);

        let cmd = mapper.map(&frame(512, 0, 0, 0)).unwrap();
        assert_relative_eq!(cmd.yaw, -1.0);
    }

    #[test]
    fn test_brake_channel_and_buttons() {
        let mapper = ControlMapper::default();
        let cmd = mapper.map(&frame(512, 512, 1023, 0b1_0101)).unwrap();
        assert_eq!(cmd.brake, Some(1.0));
        assert_eq!(cmd.buttons, [true, false, true, false, true]);

        let unmapped = ControlMapper::new(ControlSettings {
            brake_channel: None,
            ..ControlSettings::default()
        });
        assert_eq!(unmapped.map(&frame(512, 512, 1023, 0)).unwrap().brake, None);
    }

    #[test]
    fn test_invalid_frame_yields_nothing() {
        let mapper = ControlMapper::default();
        assert!(mapper.map(&SensorFrame::default()).is_none());
    }
}
