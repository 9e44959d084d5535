//! Serial capture pipeline for the SD logger
//!
//! A receiver task packs fixed-size serial packets into chunks and hands them,
//! one buffer at a time, to a writer task that appends them to numbered
//! segment files inside a fresh per-boot session directory:
//!
//! ```text
//! serial ──▶ FrameAssembler ──▶ Pipeline (free list + bounded channel) ──▶ SegmentWriter ──▶ SD
//! ```
//!
//! Everything here is `no_std` and hardware-agnostic. The firmware binary
//! supplies the UART, the SD volume and the dual-core executors.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
mod fmt;

pub mod assembler;
pub mod config;
pub mod pipeline;
pub mod segment;
pub mod serial;
pub mod session;
pub mod storage;
pub mod throughput;

pub use assembler::{AssemblerStats, FrameAssembler};
pub use pipeline::{Chunk, Pipeline, PoolError};
pub use segment::{RolloverPolicy, SegmentConfig, SegmentWriter, WriteOutcome, WriterStats};
pub use serial::{PatternSource, ReadTransport, SerialTransport};
pub use session::{discover_next_session_index, parse_session_index, start_session, Session, SessionError};
pub use storage::{Entry, PathBuf, Storage};
pub use throughput::{Clock, SystemClock, Throughput, ThroughputWindow};
