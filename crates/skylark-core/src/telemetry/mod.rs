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

//! Telemetry data shared between the serial receive thread and the simulation tick.

use serde::{Deserialize, Serialize};

/// Number of analog channels carried by a sensor frame.
pub const ANALOG_CHANNELS: usize = 6;

/// Number of button bits carried by a sensor frame.
pub const BUTTON_COUNT: usize = 5;

/// Mask of the meaningful bits of the button byte.
pub const BUTTON_MASK: u8 = (1 << BUTTON_COUNT) - 1;

/// Full-scale reading of the controller's 10-bit ADC.
pub const ANALOG_FULL_SCALE: u16 = 1023;

/// One decoded reading of the hand controller.
///
/// The frame is `Copy`, so handing it across threads under a lock always moves a complete,
/// internally consistent snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorFrame {
    /// Raw analog readings `A0..A5`.
    pub analog: [u16; ANALOG_CHANNELS],
    /// Pressed buttons, bit `i` set when button `i` is held (bits 0–4).
    pub buttons: u8,
    /// `true` for frames produced by a successful decode.
    pub valid: bool,
}

impl SensorFrame {
    /// Creates a valid frame. Bits above [`BUTTON_MASK`] are discarded.
    pub fn new(analog: [u16; ANALOG_CHANNELS], buttons: u8) -> Self {
        Self {
            analog,
            buttons: buttons & BUTTON_MASK,
            valid: true,
        }
    }

    /// Returns the raw reading of analog channel `index`, if it exists.
    pub fn channel(&self, index: usize) -> Option<u16> {
        self.analog.get(index).copied()
    }

    /// Returns the reading of channel `index` scaled to `[0.0, 1.0]` by the ADC full scale.
    pub fn channel_normalized(&self, index: usize) -> Option<f32> {
        self.channel(index)
            .map(|raw| (f32::from(raw) / f32::from(ANALOG_FULL_SCALE)).min(1.0))
    }

    /// Returns `true` if button `index` (0–4) is pressed.
    pub fn is_pressed(&self, index: usize) -> bool {
        index < BUTTON_COUNT && self.buttons & (1 << index) != 0
    }

    /// Returns the state of every button.
    pub fn pressed(&self) -> [bool; BUTTON_COUNT] {
        std::array::from_fn(|i| self.is_pressed(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buttons_are_masked_to_five_bits() {
        let frame = SensorFrame::new([0; ANALOG_CHANNELS], 0xFF);
        assert_eq!(frame.buttons, 0b1_1111);
        assert!(frame.pressed().iter().all(|&b| b));
        assert!(!frame.is_pressed(5));
    }

    #[test]
    fn test_default_frame_is_invalid() {
        assert!(!SensorFrame::default().valid);
    }

    #[test]
    fn test_channel_normalization() {
        let frame = SensorFrame::new([0, 1023, 2000, 512, 0, 0], 0);
        assert_eq!(frame.channel_normalized(0), Some(0.0));
        assert_eq!(frame.channel_normalized(1), Some(1.0));
        assert_eq!(frame.channel_normalized(2), Some(1.0));
        assert_eq!(frame.channel_normalized(6), None);
    }
}
