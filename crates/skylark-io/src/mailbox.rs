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

//! Single-slot, last-write-wins hand-off between the receive thread and the tick domain.

use std::sync::{Arc, Mutex, MutexGuard};

use skylark_core::telemetry::SensorFrame;

#[derive(Debug, Default)]
struct Slot {
    frame: Option<SensorFrame>,
    sequence: u64,
}

/// Shared latest-frame slot.
///
/// A publish unconditionally replaces any unread frame; older frames are never queued. The whole
/// frame is copied under the lock, so a reader always observes either the previous frame or the
/// new one in full.
#[derive(Debug, Clone, Default)]
pub struct FrameMailbox {
    slot: Arc<Mutex<Slot>>,
}

impl FrameMailbox {
    /// Creates an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // The slot only holds `Copy` data, so a panic while locked cannot leave it half-written.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the stored frame.
    pub fn publish(&self, frame: SensorFrame) {
        let mut slot = self.lock();
        slot.frame = Some(frame);
        slot.sequence = slot.sequence.wrapping_add(1);
    }

    /// Returns the most recent frame without consuming it.
    pub fn latest(&self) -> Option<SensorFrame> {
        self.lock().frame
    }

    /// Returns the most recent frame together with its publish sequence number.
    ///
    /// The sequence lets a consumer tell a fresh frame from one it has already seen.
    pub fn latest_with_sequence(&self) -> Option<(SensorFrame, u64)> {
        let slot = self.lock();
        slot.frame.map(|frame| (frame, slot.sequence))
    }

    /// Removes and returns the stored frame.
    pub fn take(&self) -> Option<SensorFrame> {
        self.lock().frame.take()
    }

    /// Forgets the stored frame.
    pub fn clear(&self) {
        self.lock().frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    fn uniform(value: u16) -> SensorFrame {
        SensorFrame::new([value; 6], (value % 32) as u8)
    }

    #[test]
    fn test_last_write_wins() {
        let mailbox = FrameMailbox::new();
        assert!(mailbox.latest().is_none());
        mailbox.publish(uniform(1));
        mailbox.publish(uniform(2));
        assert_eq!(mailbox.latest(), Some(uniform(2)));
        assert_eq!(mailbox.latest(), Some(uniform(2)));
        assert_eq!(mailbox.take(), Some(uniform(2)));
        assert!(mailbox.latest().is_none());
    }

    #[test]
    fn test_sequence_advances_per_publish() {
        let mailbox = FrameMailbox::new();
        mailbox.publish(uniform(5));
        let (_, first) = mailbox.latest_with_sequence().unwrap();
        mailbox.publish(uniform(5));
        let (_, second) = mailbox.latest_with_sequence().unwrap();
        assert_eq!(second, first + 1);
        mailbox.clear();
        assert!(mailbox.latest_with_sequence().is_none());
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let mailbox = FrameMailbox::new();
        mailbox.publish(uniform(7));
        let clone = mailbox.clone();
        let _ = thread::spawn(move || {
            let _guard = clone.slot.lock().unwrap();
            panic!("poison the slot");
        })
        .join();
        assert_eq!(mailbox.latest(), Some(uniform(7)));
    }

    #[test]
    fn test_reader_waits_out_a_stalled_publish() {
        let mailbox = FrameMailbox::new();
        mailbox.publish(uniform(1));
        let writer_box = mailbox.clone();
        let halfway = Arc::new(Barrier::new(2));
        let writer_halfway = Arc::clone(&halfway);
        let stall = Duration::from_millis(50);

        // Writes the next frame one channel at a time and stalls with half of it in the slot.
        let writer = thread::spawn(move || {
            let mut slot = writer_box.lock();
            let frame = slot.frame.as_mut().unwrap();
            frame.analog[..3].fill(2);
            writer_halfway.wait();
            thread::sleep(stall);
            frame.analog[3..].fill(2);
            frame.buttons = 2;
            slot.sequence += 1;
        });

        halfway.wait();
        let started = Instant::now();
        let (frame, sequence) = mailbox.latest_with_sequence().unwrap();
        assert!(started.elapsed() >= stall / 2);
        assert_eq!(frame, uniform(2));
        assert_eq!(sequence, 2);
        writer.join().unwrap();
    }

    #[test]
    fn test_concurrent_reads_never_observe_torn_frames() {
        let mailbox = FrameMailbox::new();
        let writer_box = mailbox.clone();
        let (ready_tx, ready_rx) = bounded::<()>(0);

        let writer = thread::spawn(move || {
            let _ = ready_rx.recv();
            for value in 0..20_000u16 {
                writer_box.publish(uniform(value));
                if value % 64 == 0 {
                    thread::yield_now();
                }
            }
        });

        let _ = ready_tx.send(());
        let mut reads = 0;
        while !writer.is_finished() || reads < 1000 {
            if let Some(frame) = mailbox.latest() {
                let first = frame.analog[0];
                assert!(frame.analog.iter().all(|&v| v == first), "torn frame {frame:?}");
                assert_eq!(frame.buttons, (first % 32) as u8);
                reads += 1;
            }
        }
        writer.join().unwrap();
        assert_eq!(mailbox.latest(), Some(uniform(19_999)));
    }
}
