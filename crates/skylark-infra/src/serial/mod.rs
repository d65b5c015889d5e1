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

//! Operating-system serial ports.

use std::io::{self, Read};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use skylark_io::port::{PortSettings, SerialBackend, SerialConnection};

/// [`SerialBackend`] over the ports the operating system enumerates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerialBackend;

impl SystemSerialBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }
}

impl SerialBackend for SystemSerialBackend {
    fn available_ports(&self) -> io::Result<Vec<String>> {
        let ports = serialport::available_ports().map_err(io::Error::from)?;
        Ok(ports.into_iter().map(|info| info.port_name).collect())
    }

    fn open(&self, name: &str, settings: &PortSettings) -> io::Result<Box<dyn SerialConnection>> {
        let mut port = serialport::new(name, settings.baud_rate)
            .timeout(settings.timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()
            .map_err(io::Error::from)?;

        // Some USB bridges do not expose modem lines; the stream still works without them.
        if let Err(err) = port.write_data_terminal_ready(settings.data_terminal_ready) {
            log::warn!("Could not set DTR on '{name}': {err}");
        }
        if let Err(err) = port.write_request_to_send(settings.request_to_send) {
            log::warn!("Could not set RTS on '{name}': {err}");
        }

        log::debug!("Opened '{name}' at {} baud", settings.baud_rate);
        Ok(Box::new(SystemSerialConnection { port }))
    }
}

struct SystemSerialConnection {
    port: Box<dyn SerialPort>,
}

impl SerialConnection for SystemSerialConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::from)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}
