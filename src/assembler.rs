//! Serial frame assembler: packs wire packets into chunks for the writer

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::fmt::Debug2Format;
use crate::pipeline::{Chunk, Pipeline};
use crate::serial::SerialTransport;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AssemblerStats {
    /// Successful packet transactions
    pub packets_received: u64,
    /// Chunks handed to the writer
    pub chunks_emitted: u64,
    /// Chunks restarted because a transaction failed
    pub chunks_aborted: u64,
}

/// Fills `N`-byte chunks from `P`-byte serial transactions.
///
/// Completion is decided by the packet count, never by bytes seen: a chunk is
/// done after exactly `N / P` good transactions. A failed or short transaction
/// throws away the packets gathered so far for that chunk, and the chunk is
/// refilled from slot 0, so a partial chunk never reaches the writer.
pub struct FrameAssembler<T, const N: usize, const P: usize> {
    transport: T,
    packet: [u8; P],
    stats: AssemblerStats,
}

impl<T: SerialTransport, const N: usize, const P: usize> FrameAssembler<T, N, P> {
    pub const PACKETS_PER_CHUNK: usize = N / P;

    const LAYOUT_OK: () = assert!(P > 0 && N % P == 0, "chunk size must be a multiple of packet size");

    pub fn new(transport: T) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::LAYOUT_OK;
        Self {
            transport,
            packet: [0u8; P],
            stats: AssemblerStats::default(),
        }
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Fill `chunk` completely. Only returns once every packet slot holds data
    /// from one uninterrupted run of successful transactions.
    pub async fn fill(&mut self, chunk: &mut Chunk<N>) {
        let mut received = 0;
        while received < Self::PACKETS_PER_CHUNK {
            match self.transport.transact(None, &mut self.packet).await {
                Ok(n) if n == P => {
                    let start = received * P;
                    chunk[start..start + P].copy_from_slice(&self.packet);
                    received += 1;
                    self.stats.packets_received += 1;
                }
                Ok(n) => {
                    warn!(
                        "Short serial transfer ({}/{} bytes), dropping {} packets",
                        n, P, received
                    );
                    self.stats.chunks_aborted += 1;
                    received = 0;
                }
                Err(e) => {
                    warn!(
                        "Serial receive error: {:?}, dropping {} packets",
                        Debug2Format(&e),
                        received
                    );
                    self.stats.chunks_aborted += 1;
                    received = 0;
                }
            }
        }
        self.stats.chunks_emitted += 1;
    }

    /// Receiver loop: take a free buffer, fill it, hand it to the writer.
    /// Never returns.
    pub async fn run<M: RawMutex, const CAP: usize, const POOL: usize>(
        mut self,
        pipeline: &Pipeline<M, N, CAP, POOL>,
    ) -> ! {
        info!(
            "Frame assembler running: {} x {} B packets per {} B chunk",
            Self::PACKETS_PER_CHUNK,
            P,
            N
        );
        loop {
            let mut chunk = pipeline.acquire().await;
            self.fill(&mut chunk).await;
            pipeline.send(chunk).await;
            trace!("Chunk {} handed to writer", self.stats.chunks_emitted);
        }
    }
}
