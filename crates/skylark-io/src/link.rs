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

//! Background receive loop: port discovery, probing, reconnects and frame publishing.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use skylark_core::config::SerialSettings;
use skylark_core::telemetry::SensorFrame;

use crate::error::LinkError;
use crate::mailbox::FrameMailbox;
use crate::port::{read_byte, read_full, PortSettings, SerialBackend, SerialConnection};
use crate::protocol::{decode_frame, FRAME_LEN, START_MARKER};
use crate::stats::LinkStats;

/// Pause between probe attempts on one candidate.
const PROBE_PAUSE: Duration = Duration::from_millis(10);

/// Connection state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No receive thread, or the thread gave up.
    Disconnected,
    /// Looking for a port that streams valid frames.
    Scanning,
    /// Reading frames from a validated port.
    Connected,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LinkState::Scanning,
            2 => LinkState::Connected,
            _ => LinkState::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LinkState::Disconnected => 0,
            LinkState::Scanning => 1,
            LinkState::Connected => 2,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "disconnected"),
            LinkState::Scanning => write!(f, "scanning"),
            LinkState::Connected => write!(f, "connected"),
        }
    }
}

/// State published by one run of the receive thread.
#[derive(Debug, Default)]
struct LinkStatus {
    state: AtomicU8,
    port: Mutex<Option<String>>,
}

impl LinkStatus {
    fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn port(&self) -> MutexGuard<'_, Option<String>> {
        self.port.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: LinkState) {
        let previous = LinkState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel));
        if previous != state {
            log::info!("Serial link {previous} -> {state}");
        }
    }

    fn set_connected(&self, port: &str) {
        *self.port() = Some(port.to_owned());
        self.set_state(LinkState::Connected);
    }

    fn set_disconnected(&self, next: LinkState) {
        *self.port() = None;
        self.set_state(next);
    }
}

struct Worker {
    handle: JoinHandle<()>,
    shutdown_tx: Sender<()>,
    done_rx: Receiver<()>,
}

/// Owns the background receive thread and the latest-frame mailbox.
///
/// The tick domain reads frames through [`SerialLinkManager::latest_frame`] (or a cloned
/// [`FrameMailbox`]) and never blocks on I/O.
pub struct SerialLinkManager {
    settings: SerialSettings,
    backend: Arc<dyn SerialBackend>,
    mailbox: FrameMailbox,
    stats: Arc<LinkStats>,
    status: Arc<LinkStatus>,
    worker: Option<Worker>,
}

impl fmt::Debug for SerialLinkManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialLinkManager")
            .field("state", &self.state())
            .field("port", &self.connected_port())
            .field("running", &self.is_running())
            .finish()
    }
}

impl SerialLinkManager {
    /// Creates a stopped manager.
    pub fn new(settings: SerialSettings, backend: impl SerialBackend + 'static) -> Self {
        Self::with_backend(settings, Arc::new(backend))
    }

    /// Creates a stopped manager around a shared backend.
    pub fn with_backend(settings: SerialSettings, backend: Arc<dyn SerialBackend>) -> Self {
        Self {
            settings,
            backend,
            mailbox: FrameMailbox::new(),
            stats: Arc::new(LinkStats::new()),
            status: Arc::new(LinkStatus::default()),
            worker: None,
        }
    }

    /// Starts the receive thread.
    pub fn start(&mut self) -> Result<(), LinkError> {
        if let Some(worker) = &self.worker {
            if !worker.handle.is_finished() {
                return Err(LinkError::AlreadyRunning);
            }
        }
        if let Some(finished) = self.worker.take() {
            let _ = finished.handle.join();
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        let status = Arc::new(LinkStatus::default());
        status.set_state(LinkState::Scanning);
        let context = WorkerContext {
            settings: self.settings.clone(),
            backend: Arc::clone(&self.backend),
            mailbox: self.mailbox.clone(),
            stats: Arc::clone(&self.stats),
            status: Arc::clone(&status),
            shutdown_rx,
        };

        let handle = thread::Builder::new()
            .name("skylark-serial-rx".to_owned())
            .spawn(move || {
                context.run();
                let _ = done_tx.send(());
            })
            .map_err(LinkError::Spawn)?;

        self.status = status;
        self.worker = Some(Worker {
            handle,
            shutdown_tx,
            done_rx,
        });
        Ok(())
    }

    /// Signals the receive thread to exit and waits for it up to the configured join timeout.
    ///
    /// A thread that does not exit in time is detached; the manager reports
    /// [`LinkState::Disconnected`] regardless and the detached thread closes its port once its
    /// pending read returns.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        drop(worker.shutdown_tx);

        match worker.done_rx.recv_timeout(self.settings.join_timeout()) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    log::warn!("Serial receive thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Serial receive thread did not exit within {:?}, detaching it",
                    self.settings.join_timeout()
                );
                self.status = Arc::new(LinkStatus::default());
            }
        }
        self.status.set_disconnected(LinkState::Disconnected);
    }

    /// `true` while the receive thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Current connection state.
    pub fn state(&self) -> LinkState {
        self.status.state()
    }

    /// Name of the port frames are currently read from.
    pub fn connected_port(&self) -> Option<String> {
        self.status.port().clone()
    }

    /// Link counters.
    pub fn stats(&self) -> &Arc<LinkStats> {
        &self.stats
    }

    /// A handle on the latest-frame mailbox.
    pub fn mailbox(&self) -> FrameMailbox {
        self.mailbox.clone()
    }

    /// Most recent valid frame, if any has been received.
    pub fn latest_frame(&self) -> Option<SensorFrame> {
        self.mailbox.latest()
    }

    /// Settings the next start will use.
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

impl Drop for SerialLinkManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Why the connected loop returned.
enum ReceiveExit {
    Shutdown,
    Fault(LinkError),
}

struct WorkerContext {
    settings: SerialSettings,
    backend: Arc<dyn SerialBackend>,
    mailbox: FrameMailbox,
    stats: Arc<LinkStats>,
    status: Arc<LinkStatus>,
    shutdown_rx: Receiver<()>,
}

impl WorkerContext {
    fn shutdown_requested(&self) -> bool {
        !matches!(self.shutdown_rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleeps for `duration` unless shutdown is requested first. Returns `true` on shutdown.
    fn sleep(&self, duration: Duration) -> bool {
        !matches!(
            self.shutdown_rx.recv_timeout(duration),
            Err(RecvTimeoutError::Timeout)
        )
    }

    fn run(&self) {
        log::debug!("Serial receive thread started");
        loop {
            if self.shutdown_requested() {
                break;
            }
            self.status.set_state(LinkState::Scanning);

            let (port, mut conn) = match self.open_link() {
                Ok(Some(link)) => link,
                Ok(None) => break,
                Err(err) => {
                    log::debug!("Serial scan failed: {err}");
                    if !self.settings.auto_reconnect || self.sleep(self.settings.reconnect_wait())
                    {
                        break;
                    }
                    continue;
                }
            };

            self.status.set_connected(&port);
            match self.receive(conn.as_mut()) {
                ReceiveExit::Shutdown => break,
                ReceiveExit::Fault(err) => {
                    log::warn!("Serial link on '{port}' lost: {err}");
                    drop(conn);
                    self.stats.record_reconnect();
                    self.status.set_disconnected(LinkState::Scanning);
                    if !self.settings.auto_reconnect {
                        break;
                    }
                    if self.sleep(self.settings.reconnect_wait()) {
                        break;
                    }
                }
            }
        }
        self.status.set_disconnected(LinkState::Disconnected);
        log::debug!("Serial receive thread stopped");
    }

    fn port_settings(&self, timeout: Duration) -> PortSettings {
        PortSettings::new(self.settings.baud_rate, timeout)
    }

    /// Opens the configured port or auto-detects one. `Ok(None)` means shutdown was requested.
    fn open_link(&self) -> Result<Option<(String, Box<dyn SerialConnection>)>, LinkError> {
        if !self.settings.auto_detect {
            if let Some(name) = self.settings.port_name.clone() {
                return self.open_fixed(&name).map(|conn| conn.map(|c| (name, c)));
            }
            log::debug!("Auto-detect disabled but no port configured, scanning");
        }
        self.detect()
    }

    fn open_fixed(&self, name: &str) -> Result<Option<Box<dyn SerialConnection>>, LinkError> {
        let mut conn = self
            .backend
            .open(name, &self.port_settings(self.settings.read_timeout()))?;
        if self.sleep(self.settings.open_settle()) {
            return Ok(None);
        }
        conn.clear_input()?;
        Ok(Some(conn))
    }

    fn detect(&self) -> Result<Option<(String, Box<dyn SerialConnection>)>, LinkError> {
        let candidates = self.backend.available_ports()?;
        log::debug!("Probing {} serial port(s)", candidates.len());

        for name in candidates {
            if self.shutdown_requested() {
                return Ok(None);
            }
            match self.probe(&name) {
                Ok(Some(conn)) => return Ok(Some((name, conn))),
                Ok(None) if self.shutdown_requested() => return Ok(None),
                Ok(None) => log::debug!("Port '{name}' produced no valid frame"),
                Err(err) => log::debug!("Port '{name}' rejected: {err}"),
            }
        }
        Err(LinkError::NoPortFound)
    }

    /// Opens `name` and waits for one valid frame. The port is closed on any failure.
    fn probe(&self, name: &str) -> Result<Option<Box<dyn SerialConnection>>, LinkError> {
        let settings = &self.settings;
        let mut conn = self
            .backend
            .open(name, &self.port_settings(settings.detect_read_timeout()))?;

        if self.sleep(settings.open_settle()) {
            return Ok(None);
        }
        conn.clear_input()?;
        if self.sleep(settings.detect_warmup()) {
            return Ok(None);
        }
        conn.clear_input()?;
        conn.set_timeout(settings.detect_read_timeout())?;

        let deadline = Instant::now() + settings.detect_find_start();
        let mut frame = [0u8; FRAME_LEN];
        for attempt in 0..settings.probe_packets.max(1) {
            while !self.shutdown_requested() && Instant::now() < deadline {
                if read_byte(conn.as_mut())? != Some(START_MARKER) {
                    continue;
                }
                frame[0] = START_MARKER;
                if !read_full(conn.as_mut(), &mut frame[1..])? {
                    break;
                }
                match decode_frame(&frame) {
                    Ok(_) => {
                        conn.set_timeout(settings.read_timeout())?;
                        return Ok(Some(conn));
                    }
                    Err(err) => {
                        log::trace!("Probe {attempt} on '{name}' rejected: {err}");
                        break;
                    }
                }
            }
            if self.sleep(PROBE_PAUSE) {
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// Reads frames until shutdown or a link fault.
    fn receive(&self, conn: &mut dyn SerialConnection) -> ReceiveExit {
        let tolerance = self.settings.max_consecutive_decode_errors;
        let mut consecutive_errors = 0u32;
        let mut frame = [0u8; FRAME_LEN];

        loop {
            if self.shutdown_requested() {
                return ReceiveExit::Shutdown;
            }

            let byte = match read_byte(conn) {
                Ok(Some(byte)) => byte,
                Ok(None) => continue,
                Err(err) => return ReceiveExit::Fault(err.into()),
            };

            let result = if byte != START_MARKER {
                self.stats.record_framing_error();
                Err(())
            } else {
                frame[0] = START_MARKER;
                match read_full(conn, &mut frame[1..]) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => return ReceiveExit::Fault(err.into()),
                }
                match decode_frame(&frame) {
                    Ok(decoded) => {
                        self.mailbox.publish(decoded);
                        self.stats.record_packet();
                        Ok(())
                    }
                    Err(err) => {
                        log::trace!("Dropped frame: {err}");
                        self.stats.record_frame_error(&err);
                        Err(())
                    }
                }
            };

            match result {
                Ok(()) => consecutive_errors = 0,
                Err(()) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    if tolerance > 0 && consecutive_errors >= tolerance {
                        return ReceiveExit::Fault(LinkError::DecodeErrors(consecutive_errors));
                    }
                }
            }
        }
    }
}
