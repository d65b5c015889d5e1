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

//! In-memory ports.
//!
//! Each port is fed by a [`MemoryPortWriter`] and read through the regular
//! [`SerialConnection`] interface, so the link manager can run against a virtual controller.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::port::{PortSettings, SerialBackend, SerialConnection};

#[derive(Debug)]
struct PortEntry {
    name: String,
    rx: Option<Receiver<Vec<u8>>>,
    opens: usize,
}

/// A [`SerialBackend`] whose ports exist only in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    ports: Arc<Mutex<Vec<PortEntry>>>,
}

impl MemoryBackend {
    /// Creates a backend without ports.
    pub fn new() -> Self {
        Self::default()
    }

    fn ports(&self) -> MutexGuard<'_, Vec<PortEntry>> {
        self.ports.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a port and returns the handle that feeds it.
    ///
    /// Every connection opened on the port reads from the same byte stream.
    pub fn add_port(&self, name: impl Into<String>) -> MemoryPortWriter {
        let (tx, rx) = unbounded();
        let name = name.into();
        let mut ports = self.ports();
        ports.retain(|p| p.name != name);
        ports.push(PortEntry {
            name,
            rx: Some(rx),
            opens: 0,
        });
        MemoryPortWriter { tx }
    }

    /// Adds a port that is listed but refuses to open.
    pub fn add_unavailable_port(&self, name: impl Into<String>) {
        let name = name.into();
        let mut ports = self.ports();
        ports.retain(|p| p.name != name);
        ports.push(PortEntry {
            name,
            rx: None,
            opens: 0,
        });
    }

    /// Removes a port from the listing.
    pub fn remove_port(&self, name: &str) {
        self.ports().retain(|p| p.name != name);
    }

    /// How many times `name` was opened successfully.
    pub fn open_count(&self, name: &str) -> usize {
        self.ports()
            .iter()
            .find(|p| p.name == name)
            .map_or(0, |p| p.opens)
    }
}

impl SerialBackend for MemoryBackend {
    fn available_ports(&self) -> io::Result<Vec<String>> {
        Ok(self.ports().iter().map(|p| p.name.clone()).collect())
    }

    fn open(&self, name: &str, settings: &PortSettings) -> io::Result<Box<dyn SerialConnection>> {
        let mut ports = self.ports();
        let entry = ports
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no port '{name}'")))?;
        let rx = entry.rx.clone().ok_or_else(|| {
            io::Error::new(io::ErrorKind::PermissionDenied, format!("port '{name}' is busy"))
        })?;
        entry.opens += 1;
        Ok(Box::new(MemoryConnection {
            rx,
            pending: VecDeque::new(),
            timeout: settings.timeout,
        }))
    }
}

/// Feeds bytes into an in-memory port. Dropping every writer unplugs the port.
#[derive(Debug, Clone)]
pub struct MemoryPortWriter {
    tx: Sender<Vec<u8>>,
}

impl MemoryPortWriter {
    /// Queues `bytes` for readers. Returns `false` once the port is gone.
    pub fn write(&self, bytes: &[u8]) -> bool {
        self.tx.send(bytes.to_vec()).is_ok()
    }
}

struct MemoryConnection {
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    timeout: Duration,
}

impl SerialConnection for MemoryConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.timeout) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::ErrorKind::TimedOut.into());
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "port was unplugged",
                    ));
                }
            }
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        while self.rx.try_recv().is_ok() {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::read_full;

    fn settings() -> PortSettings {
        PortSettings::new(115_200, Duration::from_millis(5))
    }

    #[test]
    fn test_written_bytes_are_read_back() {
        let backend = MemoryBackend::new();
        let writer = backend.add_port("mem0");
        let mut conn = backend.open("mem0", &settings()).unwrap();
        assert!(writer.write(&[1, 2, 3]));
        assert!(writer.write(&[4]));
        let mut buf = [0u8; 4];
        assert!(read_full(conn.as_mut(), &mut buf).unwrap());
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(backend.open_count("mem0"), 1);
    }

    #[test]
    fn test_silence_times_out() {
        let backend = MemoryBackend::new();
        let _writer = backend.add_port("mem0");
        let mut conn = backend.open("mem0", &settings()).unwrap();
        let err = conn.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_dropping_writer_unplugs() {
        let backend = MemoryBackend::new();
        let writer = backend.add_port("mem0");
        let mut conn = backend.open("mem0", &settings()).unwrap();
        drop(writer);
        let err = conn.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_unavailable_and_missing_ports() {
        let backend = MemoryBackend::new();
        backend.add_unavailable_port("busy");
        assert_eq!(backend.available_ports().unwrap(), vec!["busy".to_string()]);
        assert!(backend.open("busy", &settings()).is_err());
        assert!(backend.open("ghost", &settings()).is_err());
    }

    #[test]
    fn test_clear_input_discards_backlog() {
        let backend = MemoryBackend::new();
        let writer = backend.add_port("mem0");
        let mut conn = backend.open("mem0", &settings()).unwrap();
        writer.write(&[9, 9, 9]);
        conn.clear_input().unwrap();
        writer.write(&[7]);
        let mut buf = [0u8; 1];
        assert!(read_full(conn.as_mut(), &mut buf).unwrap());
        assert_eq!(buf, [7]);
    }
}
