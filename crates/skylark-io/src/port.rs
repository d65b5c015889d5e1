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

//! Transport abstraction for the serial link.
//!
//! The link manager only talks to ports through these traits; the operating-system
//! implementation lives in the infra crate and an in-memory one in [`crate::memory`].

use std::io;
use std::time::Duration;

/// Parameters used when opening a port. Frames are always 8 data bits, no parity, one stop bit
/// and no flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSettings {
    /// Line speed.
    pub baud_rate: u32,
    /// Per-read timeout.
    pub timeout: Duration,
    /// Assert DTR after opening. Resets boards that reboot on DTR.
    pub data_terminal_ready: bool,
    /// Assert RTS after opening.
    pub request_to_send: bool,
}

impl PortSettings {
    /// 8N1 settings with DTR asserted and RTS released.
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self {
            baud_rate,
            timeout,
            data_terminal_ready: true,
            request_to_send: false,
        }
    }
}

/// An open port.
pub trait SerialConnection: Send {
    /// Reads up to `buf.len()` bytes.
    ///
    /// Returns an error of kind [`io::ErrorKind::TimedOut`] when nothing arrives within the
    /// timeout.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Changes the per-read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discards bytes received but not yet read.
    fn clear_input(&mut self) -> io::Result<()>;
}

/// A source of ports.
pub trait SerialBackend: Send + Sync {
    /// Lists the names of the ports currently present.
    fn available_ports(&self) -> io::Result<Vec<String>>;

    /// Opens `name`.
    fn open(&self, name: &str, settings: &PortSettings) -> io::Result<Box<dyn SerialConnection>>;
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Reads a single byte. A timeout yields `Ok(None)`.
pub fn read_byte(conn: &mut dyn SerialConnection) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    match conn.read(&mut byte) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(byte[0])),
        Err(err) if is_timeout(&err) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Fills `buf`, each read bounded by the connection timeout.
///
/// Returns `Ok(false)` if a read times out before the buffer is full.
pub fn read_full(conn: &mut dyn SerialConnection, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match conn.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(err) if is_timeout(&err) => return Ok(false),
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}
