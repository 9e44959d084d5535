//! Configuration constants for the serial capture logger

use crate::segment::RolloverPolicy;

/// Bytes per chunk handed from the receiver to the SD writer
pub const CHUNK_SIZE: usize = 512;

/// Bytes per serial transaction (one wire packet)
pub const PACKET_SIZE: usize = 4;

/// Packets needed to fill one chunk
pub const PACKETS_PER_CHUNK: usize = CHUNK_SIZE / PACKET_SIZE;

/// Chunks that may sit in the receiver → writer channel (1 = rendezvous)
pub const CHANNEL_CAPACITY: usize = 1;

/// Chunk buffers in circulation: one filling, one in transit, one draining
pub const CHUNK_POOL_SIZE: usize = 3;

/// Chunk appends per segment file before rolling to the next one
/// (2048 x 512 B = 1 MiB per segment)
pub const MAX_WRITES_PER_SEGMENT: u32 = 2048;

/// Suffix of the first segment file in a session (`FILE_0.txt`)
pub const SEGMENT_BASE_INDEX: u32 = 0;

/// Highest segment suffix a session may use. FAT short names fit
/// `FILE_999.txt` at most; past it the writer moves to a new session
/// directory (about 1000 MiB per session with the defaults).
pub const MAX_SEGMENT_INDEX: u32 = 999;

/// What happens to the chunk that arrives once a segment is full
pub const ROLLOVER_POLICY: RolloverPolicy = RolloverPolicy::Carry;

/// Throughput report window
pub const REPORT_INTERVAL_MS: u64 = 5_000;

/// Session directories are `DIR<n>` in the volume root
pub const SESSION_DIR_PREFIX: &str = "DIR";

/// Segment files are `FILE_<m>.txt` inside the session directory
pub const SEGMENT_FILE_PREFIX: &str = "FILE_";
pub const SEGMENT_FILE_EXT: &str = "txt";

/// Longest path the pipeline builds (`DIR4294967295/FILE_4294967295.txt`)
pub const MAX_PATH_LEN: usize = 40;

/// Where chunks come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataSource {
    /// Packets read from the serial link, clocked by the external master
    Serial,
    /// Packets synthesised on-device from the `A..Z` pattern
    Pattern,
}

pub const DATA_SOURCE: DataSource = DataSource::Serial;

/// Serial link baudrate (receiver and mock source)
pub const UART_BAUDRATE: u32 = 921_600;

/// Embassy BufferedUart RX buffer size (~44 ms at 921600 baud)
pub const UART_RX_BUF_SIZE: usize = 4096;

/// Delay between packets sent by the mock data source, 0 = back-to-back
pub const MOCK_PACKET_PERIOD_US: u64 = 0;

/// Byte the mock data source repeats in every packet
pub const MOCK_PACKET_FILL: u8 = 0xAA;

/// SD SPI initialization frequency (slow for card init)
pub const SD_SPI_INIT_FREQ: u32 = 400_000;

/// SD SPI working frequency after init
pub const SD_SPI_WORK_FREQ: u32 = 16_000_000;

/// Max retries for SD card initialization
pub const SD_INIT_RETRIES: u8 = 3;

/// Watchdog period; only armed to force a reboot on fatal errors
pub const WATCHDOG_PERIOD_MS: u64 = 5_000;

const _: () = assert!(CHUNK_SIZE % PACKET_SIZE == 0, "chunk must hold whole packets");
const _: () = assert!(PACKET_SIZE > 0);
const _: () = assert!(CHANNEL_CAPACITY >= 1);
const _: () = assert!(
    CHUNK_POOL_SIZE > CHANNEL_CAPACITY,
    "pool must cover the channel plus the buffer being filled"
);
const _: () = assert!(MAX_WRITES_PER_SEGMENT > 0);
const _: () = assert!(SEGMENT_BASE_INDEX <= MAX_SEGMENT_INDEX);
