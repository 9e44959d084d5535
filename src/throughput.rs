//! Write throughput accounting in fixed wall-clock windows.

use embassy_time::{Duration, Instant};

/// Monotonic time source used for elapsed-time measurement only.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The embassy time driver (RP2350 timer on the device).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// One finished report window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Throughput {
    pub bytes: u64,
    pub elapsed_ms: u64,
    pub bytes_per_sec: u64,
}

/// Counts bytes since the window opened and closes the window once
/// `interval` has passed. Windows are independent: nothing is carried over.
pub struct ThroughputWindow {
    interval: Duration,
    start: Instant,
    bytes: u64,
}

impl ThroughputWindow {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            start: now,
            bytes: 0,
        }
    }

    pub fn record(&mut self, bytes: usize) {
        self.bytes = self.bytes.saturating_add(bytes as u64);
    }

    /// Bytes recorded in the open window
    pub fn pending_bytes(&self) -> u64 {
        self.bytes
    }

    /// Close the window if it is due, returning its rate and opening a new
    /// one that starts at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Throughput> {
        let elapsed = now.checked_duration_since(self.start)?;
        if elapsed < self.interval {
            return None;
        }
        let elapsed_us = elapsed.as_micros().max(1);
        let report = Throughput {
            bytes: self.bytes,
            elapsed_ms: elapsed.as_millis(),
            bytes_per_sec: ((self.bytes as u128 * 1_000_000) / elapsed_us as u128) as u64,
        };
        self.bytes = 0;
        self.start = now;
        Some(report)
    }
}
