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

//! Link counters shared between the receive thread and its observers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::FrameError;

/// Counters updated by the receive thread.
#[derive(Debug, Default)]
pub struct LinkStats {
    packets: AtomicU64,
    window_packets: AtomicU64,
    checksum_errors: AtomicU64,
    framing_errors: AtomicU64,
    reconnects: AtomicU64,
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatsSnapshot {
    /// Valid frames received since creation.
    pub packets: u64,
    /// Frames rejected for a checksum mismatch.
    pub checksum_errors: u64,
    /// Frames rejected for a marker mismatch, plus stray bytes skipped while hunting for a start
    /// marker.
    pub framing_errors: u64,
    /// Connections lost after having been established.
    pub reconnects: u64,
}

impl LinkStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one valid frame.
    pub fn record_packet(&self) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.window_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one rejected frame.
    pub fn record_frame_error(&self, error: &FrameError) {
        match error {
            FrameError::Framing { .. } => self.record_framing_error(),
            FrameError::Checksum { .. } => {
                self.checksum_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Counts one framing error.
    pub fn record_framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one lost connection.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of frames since the previous call and restarts the window.
    pub fn take_window(&self) -> u64 {
        self.window_packets.swap(0, Ordering::Relaxed)
    }

    /// Copies the counters.
    pub fn snapshot(&self) -> LinkStatsSnapshot {
        LinkStatsSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            checksum_errors: self.checksum_errors.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Packets-per-second gauge driven from the tick domain.
#[derive(Debug, Default)]
pub struct PacketRateMeter {
    elapsed: f32,
    packets_per_second: u64,
}

impl PacketRateMeter {
    /// Creates a meter reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates `dt` seconds; once a full second has elapsed, takes the packet window from
    /// `stats`. Returns the current rate.
    pub fn tick(&mut self, dt: f32, stats: &LinkStats) -> u64 {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }
        if self.elapsed >= 1.0 {
            self.packets_per_second = stats.take_window();
            self.elapsed = 0.0;
        }
        self.packets_per_second
    }

    /// Last measured rate.
    pub fn packets_per_second(&self) -> u64 {
        self.packets_per_second
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Marker;

    #[test]
    fn test_errors_are_classified() {
        let stats = LinkStats::new();
        stats.record_frame_error(&FrameError::Checksum {
            expected: 1,
            actual: 2,
        });
        stats.record_frame_error(&FrameError::Framing {
            marker: Marker::End,
            found: 0,
        });
        stats.record_framing_error();
        let snap = stats.snapshot();
        assert_eq!(snap.checksum_errors, 1);
        assert_eq!(snap.framing_errors, 2);
        assert_eq!(snap.packets, 0);
    }

    #[test]
    fn test_rate_meter_samples_once_per_second() {
        let stats = LinkStats::new();
        let mut meter = PacketRateMeter::new();
        for _ in 0..30 {
            stats.record_packet();
        }
        for _ in 0..49 {
            assert_eq!(meter.tick(0.02, &stats), 0);
        }
        // 50 ticks of 0.02 s; allow for float accumulation by adding a little extra.
        assert_eq!(meter.tick(0.021, &stats), 30);
        assert_eq!(meter.packets_per_second(), 30);
        assert_eq!(stats.snapshot().packets, 30);
        assert_eq!(stats.take_window(), 0);
    }
}
