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

//! Integration tests for the serial link manager running against in-memory ports.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use skylark_core::config::SerialSettings;
use skylark_core::SensorFrame;
use skylark_io::protocol::{encode_frame, END_MARKER, START_MARKER};
use skylark_io::{
    LinkError, LinkState, MemoryBackend, MemoryPortWriter, PortSettings, SerialBackend,
    SerialConnection, SerialLinkManager,
};

/// Helper: timings short enough for tests.
fn fast_settings() -> SerialSettings {
    SerialSettings {
        open_settle_ms: 0,
        detect_warmup_ms: 0,
        detect_find_start_ms: 150,
        detect_read_timeout_ms: 20,
        read_timeout_ms: 10,
        reconnect_wait_ms: 20,
        join_timeout_ms: 1000,
        ..SerialSettings::default()
    }
}

/// Helper: a thread writing `chunk` into a port every couple of milliseconds.
struct Streamer {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl Streamer {
    fn start(writer: MemoryPortWriter, chunk: Vec<u8>) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(Duration::from_millis(2)) {
                Err(RecvTimeoutError::Timeout) => {
                    if !writer.write(&chunk) {
                        break;
                    }
                }
                _ => break,
            }
        });
        Self { stop_tx, handle }
    }

    /// Stops writing and unplugs the port.
    fn unplug(self) {
        drop(self.stop_tx);
        self.handle.join().unwrap();
    }
}

/// Helper: a single port whose reads hang for `stall` before timing out.
#[derive(Clone)]
struct StallingBackend {
    stall: Duration,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl StallingBackend {
    fn new(stall: Duration) -> Self {
        Self {
            stall,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct StallingConnection {
    stall: Duration,
    closed: Arc<AtomicUsize>,
}

impl SerialBackend for StallingBackend {
    fn available_ports(&self) -> io::Result<Vec<String>> {
        Ok(vec!["stall".to_owned()])
    }

    fn open(&self, _name: &str, _settings: &PortSettings) -> io::Result<Box<dyn SerialConnection>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StallingConnection {
            stall: self.stall,
            closed: Arc::clone(&self.closed),
        }))
    }
}

impl SerialConnection for StallingConnection {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        thread::sleep(self.stall);
        Err(io::ErrorKind::TimedOut.into())
    }

    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for StallingConnection {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Helper: both sticks centered, no buttons. Each 512 is `[0x00, 0x02]`, so the checksum is 0x0C.
fn centered_bytes() -> Vec<u8> {
    let mut bytes = vec![START_MARKER];
    for _ in 0..6 {
        bytes.extend_from_slice(&512u16.to_le_bytes());
    }
    bytes.extend_from_slice(&[0x00, 0x0C, END_MARKER]);
    bytes
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

const WAIT: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// Discovery
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_auto_detect_finds_streaming_port_end_to_end() {
    let backend = MemoryBackend::new();
    backend.add_unavailable_port("busy");
    let _silent = backend.add_port("silent");
    let noise = Streamer::start(backend.add_port("noise"), vec![0x13; 32]);
    let good = Streamer::start(backend.add_port("good"), centered_bytes());

    let mut manager = SerialLinkManager::new(fast_settings(), backend.clone());
    manager.start().unwrap();

    assert!(wait_until(WAIT, || manager.latest_frame().is_some()));
    assert_eq!(manager.state(), LinkState::Connected);
    assert_eq!(manager.connected_port().as_deref(), Some("good"));

    let frame = manager.latest_frame().unwrap();
    assert_eq!(frame, SensorFrame::new([512; 6], 0));
    assert!(frame.valid);
    assert_eq!(frame.pressed(), [false; 5]);
    assert!(manager.stats().snapshot().packets > 0);

    manager.stop();
    noise.unplug();
    good.unplug();
}

#[test]
fn test_fixed_port_skips_probing() {
    let backend = MemoryBackend::new();
    let _fixed = backend.add_port("fixed");
    let other = Streamer::start(backend.add_port("other"), centered_bytes());

    let settings = SerialSettings {
        auto_detect: false,
        port_name: Some("fixed".to_owned()),
        ..fast_settings()
    };
    let mut manager = SerialLinkManager::new(settings, backend.clone());
    manager.start().unwrap();

    assert!(wait_until(WAIT, || manager.state() == LinkState::Connected));
    assert_eq!(manager.connected_port().as_deref(), Some("fixed"));
    assert_eq!(backend.open_count("fixed"), 1);
    assert_eq!(backend.open_count("other"), 0);

    manager.stop();
    other.unplug();
}

#[test]
fn test_no_ports_keeps_scanning() {
    let mut manager = SerialLinkManager::new(fast_settings(), MemoryBackend::new());
    manager.start().unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(manager.is_running());
    assert_eq!(manager.state(), LinkState::Scanning);
    manager.stop();
    assert_eq!(manager.state(), LinkState::Disconnected);
}

// ─────────────────────────────────────────────────────────────────────────────
// Error tolerance
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_checksum_errors_do_not_disconnect() {
    let backend = MemoryBackend::new();
    let mut corrupted = encode_frame(&SensorFrame::new([100; 6], 1)).to_vec();
    corrupted[14] = corrupted[14].wrapping_add(1);
    let mut chunk = centered_bytes();
    chunk.extend_from_slice(&corrupted);
    let port = Streamer::start(backend.add_port("flaky"), chunk);

    let mut manager = SerialLinkManager::new(fast_settings(), backend);
    manager.start().unwrap();

    assert!(wait_until(WAIT, || {
        let stats = manager.stats().snapshot();
        stats.packets >= 5 && stats.checksum_errors >= 5
    }));
    assert_eq!(manager.state(), LinkState::Connected);
    assert_eq!(manager.stats().snapshot().reconnects, 0);
    assert_eq!(manager.latest_frame(), Some(SensorFrame::new([512; 6], 0)));

    manager.stop();
    port.unplug();
}

#[test]
fn test_consecutive_decode_errors_force_reconnect() {
    let backend = MemoryBackend::new();
    let mut chunk = centered_bytes();
    chunk.extend_from_slice(&[0u8; 20]);
    let port = Streamer::start(backend.add_port("noisy"), chunk);

    let settings = SerialSettings {
        max_consecutive_decode_errors: 5,
        ..fast_settings()
    };
    let mut manager = SerialLinkManager::new(settings, backend);
    manager.start().unwrap();

    assert!(wait_until(WAIT, || manager.stats().snapshot().reconnects >= 1));
    assert!(manager.stats().snapshot().framing_errors >= 5);

    manager.stop();
    port.unplug();
}

// ─────────────────────────────────────────────────────────────────────────────
// Reconnect and lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unplug_triggers_reconnect_to_new_port() {
    let backend = MemoryBackend::new();
    let first = Streamer::start(backend.add_port("first"), centered_bytes());

    let mut manager = SerialLinkManager::new(fast_settings(), backend.clone());
    manager.start().unwrap();
    assert!(wait_until(WAIT, || manager.connected_port().as_deref() == Some("first")));

    backend.remove_port("first");
    first.unplug();
    let second = Streamer::start(backend.add_port("second"), centered_bytes());

    assert!(wait_until(WAIT, || manager.connected_port().as_deref() == Some("second")));
    assert!(manager.stats().snapshot().reconnects >= 1);

    manager.stop();
    second.unplug();
}

#[test]
fn test_without_auto_reconnect_link_stops_permanently() {
    let backend = MemoryBackend::new();
    let port = Streamer::start(backend.add_port("only"), centered_bytes());

    let settings = SerialSettings {
        auto_reconnect: false,
        ..fast_settings()
    };
    let mut manager = SerialLinkManager::new(settings, backend);
    manager.start().unwrap();
    assert!(wait_until(WAIT, || manager.state() == LinkState::Connected));

    port.unplug();
    assert!(wait_until(WAIT, || !manager.is_running()));
    assert_eq!(manager.state(), LinkState::Disconnected);
    assert!(manager.connected_port().is_none());

    // The last good frame stays readable.
    assert!(manager.latest_frame().is_some());
}

#[test]
fn test_start_twice_is_rejected() {
    let mut manager = SerialLinkManager::new(fast_settings(), MemoryBackend::new());
    manager.start().unwrap();
    assert!(matches!(manager.start(), Err(LinkError::AlreadyRunning)));
    manager.stop();
    assert!(manager.start().is_ok());
    manager.stop();
}

#[test]
fn test_stop_is_bounded_and_clears_state() {
    let backend = MemoryBackend::new();
    let port = Streamer::start(backend.add_port("p"), centered_bytes());
    let mut manager = SerialLinkManager::new(fast_settings(), backend);
    manager.start().unwrap();
    assert!(wait_until(WAIT, || manager.state() == LinkState::Connected));

    let started = Instant::now();
    manager.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!manager.is_running());
    assert_eq!(manager.state(), LinkState::Disconnected);
    assert!(manager.connected_port().is_none());

    port.unplug();
}

#[test]
fn test_stop_detaches_a_worker_stuck_in_a_read() {
    let backend = StallingBackend::new(Duration::from_millis(800));
    let settings = SerialSettings {
        auto_detect: false,
        port_name: Some("stall".to_owned()),
        join_timeout_ms: 100,
        ..fast_settings()
    };
    let mut manager = SerialLinkManager::new(settings, backend.clone());
    manager.start().unwrap();
    assert!(wait_until(WAIT, || manager.state() == LinkState::Connected));
    thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    manager.stop();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "{elapsed:?}");
    assert!(!manager.is_running());
    assert_eq!(manager.state(), LinkState::Disconnected);
    assert!(manager.connected_port().is_none());

    // The detached worker still holds the port until its read returns, then closes it.
    assert_eq!(backend.closed.load(Ordering::SeqCst), 0);
    assert!(wait_until(WAIT, || backend.closed.load(Ordering::SeqCst) == 1));

    // A late worker must not overwrite the state of the stopped manager.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(manager.state(), LinkState::Disconnected);
    assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
}

#[test]
fn test_mailbox_handle_follows_publishes() {
    let backend = MemoryBackend::new();
    let frame = SensorFrame::new([1, 2, 3, 4, 5, 6], 0b11);
    let port = Streamer::start(backend.add_port("p"), encode_frame(&frame).to_vec());
    let mut manager = SerialLinkManager::new(fast_settings(), backend);
    let mailbox = manager.mailbox();
    manager.start().unwrap();

    assert!(wait_until(WAIT, || mailbox.latest() == Some(frame)));

    manager.stop();
    port.unplug();
}
