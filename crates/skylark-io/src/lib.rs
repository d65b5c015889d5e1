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

//! # Skylark IO
//!
//! Receives the hand controller's telemetry over a serial port. A background thread owned by
//! [`SerialLinkManager`] discovers the port, decodes frames with [`decode_frame`] and publishes
//! the newest one into a [`FrameMailbox`] that the tick domain polls.

#![warn(missing_docs)]

pub mod error;
pub mod link;
pub mod mailbox;
pub mod memory;
pub mod port;
pub mod protocol;
pub mod stats;

pub use error::{FrameError, LinkError, Marker};
pub use link::{LinkState, SerialLinkManager};
pub use mailbox::FrameMailbox;
pub use memory::{MemoryBackend, MemoryPortWriter};
pub use port::{PortSettings, SerialBackend, SerialConnection};
pub use protocol::{decode_frame, encode_frame, FRAME_LEN};
pub use stats::{LinkStats, LinkStatsSnapshot, PacketRateMeter};
