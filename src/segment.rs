//! Segment writer: drains chunks to `FILE_<m>.txt` inside the session
//! directory, rolling to the next file after a fixed number of appends.
//!
//! Each chunk is one open-append-close cycle. Segment files are plain
//! concatenations of chunks with no framing, so a reader re-frames them with
//! the chunk size it already knows.
//!
//! Write slots count attempts: a failed or short append still uses one of the
//! segment's `max_writes_per_segment` slots. Nothing is retried.
//!
//! Once the session has used its last segment index the writer starts a new
//! session directory and continues from the base index there. A segment
//! file is never reopened after the writer has rolled past it.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;

use crate::config::{
    MAX_SEGMENT_INDEX, MAX_WRITES_PER_SEGMENT, REPORT_INTERVAL_MS, ROLLOVER_POLICY, SEGMENT_BASE_INDEX,
};
use crate::fmt::Debug2Format;
use crate::pipeline::Pipeline;
use crate::session::{start_session, Session};
use crate::storage::Storage;
use crate::throughput::{Clock, Throughput, ThroughputWindow};

/// What happens to the chunk that finds the current segment full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RolloverPolicy {
    /// Open the next segment and append the chunk to it. No data is lost.
    Carry,
    /// Open the next segment but drop the chunk; the first append to the new
    /// segment happens on the following chunk. One chunk is lost per rollover
    /// by design, counted in [`WriterStats::chunks_dropped`].
    Lazy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentConfig {
    pub max_writes_per_segment: u32,
    /// Index of the first segment of the session
    pub base_index: u32,
    /// Last segment index of a session; the next rollover opens a new session
    pub max_segment_index: u32,
    pub policy: RolloverPolicy,
    pub report_interval: Duration,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_writes_per_segment: MAX_WRITES_PER_SEGMENT,
            base_index: SEGMENT_BASE_INDEX,
            max_segment_index: MAX_SEGMENT_INDEX,
            policy: ROLLOVER_POLICY,
            report_interval: Duration::from_millis(REPORT_INTERVAL_MS),
        }
    }
}

/// Result of handing one chunk to the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteOutcome {
    Written { segment: u32, bytes: usize },
    Short { segment: u32, requested: usize, written: usize },
    /// Open or write failed, or no next segment could be opened
    Failed { segment: u32 },
    /// Rolled over to `segment` under [`RolloverPolicy::Lazy`], chunk discarded
    DroppedAtRollover { segment: u32 },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriterStats {
    pub chunks_received: u64,
    /// Chunks appended in full
    pub chunks_written: u64,
    pub short_writes: u64,
    pub failed_writes: u64,
    /// Chunks discarded at a lazy rollover
    pub chunks_dropped: u64,
    /// Bytes that actually reached storage since boot
    pub bytes_written: u64,
    /// Sessions started after the boot session filled up
    pub sessions_rolled: u64,
}

pub struct SegmentWriter<S, C> {
    storage: S,
    clock: C,
    session: Session,
    config: SegmentConfig,
    segment: u32,
    writes_in_segment: u32,
    stats: WriterStats,
    window: ThroughputWindow,
    last_report: Option<Throughput>,
}

impl<S: Storage, C: Clock> SegmentWriter<S, C> {
    pub fn new(storage: S, clock: C, session: Session, config: SegmentConfig) -> Self {
        let window = ThroughputWindow::new(config.report_interval, clock.now());
        info!(
            "Writing to {}, {} appends per segment, {:?} rollover",
            session.segment_path(config.base_index).as_str(),
            config.max_writes_per_segment,
            config.policy
        );
        Self {
            storage,
            clock,
            session,
            segment: config.base_index,
            config,
            writes_in_segment: 0,
            stats: WriterStats::default(),
            window,
            last_report: None,
        }
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// Index of the segment the next append goes to
    pub fn segment(&self) -> u32 {
        self.segment
    }

    pub fn writes_in_segment(&self) -> u32 {
        self.writes_in_segment
    }

    /// Most recent throughput report
    pub fn last_throughput(&self) -> Option<Throughput> {
        self.last_report
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Append one chunk, rolling over first if the segment is full.
    pub fn write_chunk(&mut self, data: &[u8]) -> WriteOutcome {
        self.stats.chunks_received += 1;

        if self.writes_in_segment >= self.config.max_writes_per_segment {
            if !self.roll_over() {
                // Slots stay exhausted, so the next chunk tries again.
                self.stats.failed_writes += 1;
                return WriteOutcome::Failed { segment: self.segment };
            }
            if self.config.policy == RolloverPolicy::Lazy {
                self.stats.chunks_dropped += 1;
                debug!("Chunk dropped at rollover to FILE_{}", self.segment);
                return WriteOutcome::DroppedAtRollover { segment: self.segment };
            }
        }

        let outcome = self.append(data);
        self.writes_in_segment += 1;
        outcome
    }

    /// Move to the next segment, or to a new session when this one has no
    /// segment index left. Returns false if nothing could be opened.
    fn roll_over(&mut self) -> bool {
        let previous = self.segment;
        let next = previous
            .checked_add(1)
            .filter(|&next| next <= self.config.max_segment_index);
        match next {
            Some(next) => {
                self.segment = next;
                info!(
                    "FILE_{} has been written {} times, now writing to FILE_{}",
                    previous, self.config.max_writes_per_segment, next
                );
            }
            None => {
                warn!("{} has no segment after FILE_{}, starting a new session", self.session.dir(), previous);
                match start_session(&mut self.storage) {
                    Ok(session) => {
                        self.session = session;
                        self.segment = self.config.base_index;
                        self.stats.sessions_rolled += 1;
                        info!("Now writing to {}", self.session.segment_path(self.segment).as_str());
                    }
                    Err(e) => {
                        error!("Cannot start a new session: {:?}", Debug2Format(&e));
                        return false;
                    }
                }
            }
        }
        self.writes_in_segment = 0;
        true
    }

    fn append(&mut self, data: &[u8]) -> WriteOutcome {
        let segment = self.segment;
        let path = self.session.segment_path(segment);

        let mut file = match self.storage.open_append(&path) {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to open {} for appending: {:?}", path.as_str(), Debug2Format(&e));
                self.stats.failed_writes += 1;
                return WriteOutcome::Failed { segment };
            }
        };

        let written = match self.storage.write(&mut file, data) {
            Ok(n) => n.min(data.len()),
            Err(e) => {
                error!("Failed to write {}: {:?}", path.as_str(), Debug2Format(&e));
                0
            }
        };

        if let Err(e) = self.storage.close(file) {
            warn!("Failed to close {}: {:?}", path.as_str(), Debug2Format(&e));
        }

        self.stats.bytes_written = self.stats.bytes_written.saturating_add(written as u64);
        self.window.record(written);

        if written == data.len() {
            self.stats.chunks_written += 1;
            WriteOutcome::Written { segment, bytes: written }
        } else if written == 0 {
            self.stats.failed_writes += 1;
            WriteOutcome::Failed { segment }
        } else {
            warn!("Short write to {}: {}/{} bytes", path.as_str(), written, data.len());
            self.stats.short_writes += 1;
            WriteOutcome::Short {
                segment,
                requested: data.len(),
                written,
            }
        }
    }

    /// Close the throughput window if it is due and log its rate.
    pub fn poll_throughput(&mut self) -> Option<Throughput> {
        let report = self.window.poll(self.clock.now())?;
        info!(
            "Write speed: {} B/s ({} B in {} ms)",
            report.bytes_per_sec, report.bytes, report.elapsed_ms
        );
        self.last_report = Some(report);
        Some(report)
    }

    /// Writer loop: receive, append, return the buffer, report. Never returns.
    pub async fn run<M: RawMutex, const N: usize, const CAP: usize, const POOL: usize>(
        &mut self,
        pipeline: &Pipeline<M, N, CAP, POOL>,
    ) -> ! {
        loop {
            let chunk = pipeline.receive().await;
            self.write_chunk(&chunk);
            if let Err(e) = pipeline.release(chunk) {
                error!("Chunk buffer not returned to pool: {:?}", e);
            }
            self.poll_throughput();
        }
    }
}
