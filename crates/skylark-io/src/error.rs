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

//! Error types of the serial link.

use std::fmt;

use thiserror::Error;

/// Which frame delimiter failed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Byte 0.
    Start,
    /// Byte 15.
    End,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Start => write!(f, "start"),
            Marker::End => write!(f, "end"),
        }
    }
}

/// A rejected frame. Counted by the link, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// A delimiter byte did not match.
    #[error("{marker} marker mismatch: found {found:#04x}")]
    Framing {
        /// The delimiter that failed.
        marker: Marker,
        /// The byte found in its place.
        found: u8,
    },
    /// The payload sum did not match the checksum byte.
    #[error("checksum mismatch: computed {expected:#04x}, frame carries {actual:#04x}")]
    Checksum {
        /// Checksum computed over the payload.
        expected: u8,
        /// Checksum carried by the frame.
        actual: u8,
    },
}

/// Errors raised by the link manager and its backends.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No enumerated port produced a valid frame.
    #[error("no port produced a valid frame")]
    NoPortFound,
    /// A port could not be opened, read or configured.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Too many frames in a row failed to decode.
    #[error("{0} consecutive frames failed to decode")]
    DecodeErrors(u32),
    /// The receive thread is already running.
    #[error("the serial link is already running")]
    AlreadyRunning,
    /// The receive thread could not be spawned.
    #[error("failed to spawn the receive thread: {0}")]
    Spawn(#[source] std::io::Error),
}
