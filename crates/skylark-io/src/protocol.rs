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

//! Wire format of the controller frame.
//!
//! ```text
//! [0]      0xAA start marker
//! [1..13)  six u16 analog channels, little-endian
//! [13]     button mask, bits 0-4
//! [14]     checksum: sum of bytes 1..=13 mod 256
//! [15]     0x55 end marker
//! ```

use skylark_core::telemetry::{SensorFrame, ANALOG_CHANNELS, BUTTON_MASK};

use crate::error::{FrameError, Marker};

/// Length of one frame in bytes.
pub const FRAME_LEN: usize = 16;
/// First byte of every frame.
pub const START_MARKER: u8 = 0xAA;
/// Last byte of every frame.
pub const END_MARKER: u8 = 0x55;

const PAYLOAD: std::ops::Range<usize> = 1..14;
const BUTTON_INDEX: usize = 13;
const CHECKSUM_INDEX: usize = 14;
const END_INDEX: usize = 15;

/// Sum of `bytes` modulo 256.
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Validates and decodes one frame.
///
/// Markers are checked before the checksum is computed.
pub fn decode_frame(buf: &[u8; FRAME_LEN]) -> Result<SensorFrame, FrameError> {
    if buf[0] != START_MARKER {
        return Err(FrameError::Framing {
            marker: Marker::Start,
            found: buf[0],
        });
    }
    if buf[END_INDEX] != END_MARKER {
        return Err(FrameError::Framing {
            marker: Marker::End,
            found: buf[END_INDEX],
        });
    }

    let expected = checksum(&buf[PAYLOAD]);
    let actual = buf[CHECKSUM_INDEX];
    if expected != actual {
        return Err(FrameError::Checksum { expected, actual });
    }

    let mut analog = [0u16; ANALOG_CHANNELS];
    for (i, value) in analog.iter_mut().enumerate() {
        let offset = 1 + i * 2;
        *value = u16::from_le_bytes([buf[offset], buf[offset + 1]]);
    }
    Ok(SensorFrame::new(analog, buf[BUTTON_INDEX] & BUTTON_MASK))
}

/// Encodes `frame` into wire bytes, as the controller firmware does.
pub fn encode_frame(frame: &SensorFrame) -> [u8; FRAME_LEN] {
    let mut buf = [0u8; FRAME_LEN];
    buf[0] = START_MARKER;
    for (i, value) in frame.analog.iter().enumerate() {
        let offset = 1 + i * 2;
        buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }
    buf[BUTTON_INDEX] = frame.buttons & BUTTON_MASK;
    buf[CHECKSUM_INDEX] = checksum(&buf[PAYLOAD]);
    buf[END_INDEX] = END_MARKER;
    buf
}
