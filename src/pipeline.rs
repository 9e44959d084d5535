//! Chunk buffers and the bounded handoff between receiver and SD writer.
//!
//! Buffers are allocated once and circulate through two channels: `free`
//! (pool → receiver) and `filled` (receiver → writer). A [`Chunk`] wraps an
//! exclusive `&'static mut` buffer, so whichever stage holds the value is the
//! only one that can touch the bytes.
//!
//! With `CAP = 1` the `filled` channel is a rendezvous: `send` for chunk i+1
//! parks until the writer has taken chunk i. That stall is the only
//! backpressure the receiver gets. The serial master keeps clocking while the
//! receiver is parked, so packets lost to a long SD stall are an accepted loss,
//! not an error.

use core::ops::{Deref, DerefMut};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, TrySendError};

/// One fixed-size unit of captured data.
pub struct Chunk<const N: usize> {
    buf: &'static mut [u8; N],
}

impl<const N: usize> Chunk<N> {
    pub fn new(buf: &'static mut [u8; N]) -> Self {
        Self { buf }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}

impl<const N: usize> Deref for Chunk<N> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf[..]
    }
}

impl<const N: usize> DerefMut for Chunk<N> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PoolError {
    /// Seeding was given no buffers; the receiver would wait forever.
    NoBuffers,
    /// More buffers than the free list can hold.
    Full,
}

/// Free list + bounded `filled` channel for one receiver/writer pair.
///
/// `N` is the chunk size, `CAP` the filled-channel capacity and `POOL` the
/// number of buffers the free list can hold.
pub struct Pipeline<M: RawMutex, const N: usize, const CAP: usize, const POOL: usize> {
    free: Channel<M, Chunk<N>, POOL>,
    filled: Channel<M, Chunk<N>, CAP>,
}

impl<M: RawMutex, const N: usize, const CAP: usize, const POOL: usize> Pipeline<M, N, CAP, POOL> {
    pub const fn new() -> Self {
        Self {
            free: Channel::new(),
            filled: Channel::new(),
        }
    }

    /// Hand the statically allocated buffers to the free list.
    /// Returns how many buffers were added.
    pub fn seed<I>(&self, buffers: I) -> Result<usize, PoolError>
    where
        I: IntoIterator<Item = &'static mut [u8; N]>,
    {
        let mut seeded = 0;
        for buf in buffers {
            if self.free.try_send(Chunk::new(buf)).is_err() {
                return Err(PoolError::Full);
            }
            seeded += 1;
        }
        if seeded == 0 {
            return Err(PoolError::NoBuffers);
        }
        Ok(seeded)
    }

    /// Take an empty buffer, waiting for the writer to return one if needed.
    pub async fn acquire(&self) -> Chunk<N> {
        self.free.receive().await
    }

    /// Give a drained buffer back to the free list.
    pub fn release(&self, chunk: Chunk<N>) -> Result<(), PoolError> {
        self.free.try_send(chunk).map_err(|_| PoolError::Full)
    }

    /// Move a filled chunk to the writer. Waits while the channel is full.
    pub async fn send(&self, chunk: Chunk<N>) {
        self.filled.send(chunk).await
    }

    /// Non-blocking `send`; hands the chunk back when the channel is full.
    pub fn try_send(&self, chunk: Chunk<N>) -> Result<(), Chunk<N>> {
        self.filled.try_send(chunk).map_err(|TrySendError::Full(c)| c)
    }

    /// Wait for the next filled chunk.
    pub async fn receive(&self) -> Chunk<N> {
        self.filled.receive().await
    }

    pub fn try_receive(&self) -> Option<Chunk<N>> {
        self.filled.try_receive().ok()
    }

    /// Filled chunks waiting for the writer
    pub fn in_flight(&self) -> usize {
        self.filled.len()
    }

    /// Buffers currently sitting in the free list
    pub fn free_buffers(&self) -> usize {
        self.free.len()
    }
}

impl<M: RawMutex, const N: usize, const CAP: usize, const POOL: usize> Default
    for Pipeline<M, N, CAP, POOL>
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    type TestPipeline<const POOL: usize> = Pipeline<CriticalSectionRawMutex, 8, 1, POOL>;

    fn leak_buf(fill: u8) -> &'static mut [u8; 8] {
        Box::leak(Box::new([fill; 8]))
    }

    #[test]
    fn seed_rejects_empty_and_oversized_pools() {
        let pipeline: TestPipeline<2> = Pipeline::new();
        assert_eq!(pipeline.seed(core::iter::empty()), Err(PoolError::NoBuffers));

        let pipeline: TestPipeline<2> = Pipeline::new();
        let bufs = [leak_buf(0), leak_buf(1), leak_buf(2)];
        assert_eq!(pipeline.seed(bufs), Err(PoolError::Full));
    }

    #[test]
    fn chunk_ownership_moves_through_the_pipeline() {
        let pipeline: TestPipeline<2> = Pipeline::new();
        assert_eq!(pipeline.seed([leak_buf(0), leak_buf(0)]), Ok(2));
        assert_eq!(pipeline.free_buffers(), 2);

        block_on(async {
            let mut chunk = pipeline.acquire().await;
            chunk.copy_from_slice(b"abcdefgh");
            pipeline.send(chunk).await;
            assert_eq!(pipeline.in_flight(), 1);
            assert_eq!(pipeline.free_buffers(), 1);

            let received = pipeline.receive().await;
            assert_eq!(&received[..], b"abcdefgh");
            assert_eq!(received.len(), 8);
            pipeline.release(received).unwrap();
        });

        assert_eq!(pipeline.in_flight(), 0);
        assert_eq!(pipeline.free_buffers(), 2);
    }

    #[test]
    fn capacity_one_channel_refuses_a_second_chunk() {
        let pipeline: TestPipeline<3> = Pipeline::new();
        pipeline.seed([leak_buf(1), leak_buf(2)]).unwrap();

        let first = pipeline.free.try_receive().unwrap();
        let second = pipeline.free.try_receive().unwrap();
        assert!(pipeline.try_send(first).is_ok());

        let second = match pipeline.try_send(second) {
            Err(back) => back,
            Ok(()) => panic!("second chunk accepted while the first is in flight"),
        };
        assert_eq!(second[0], 2);

        let first = pipeline.try_receive().unwrap();
        assert_eq!(first[0], 1);
        assert!(pipeline.try_send(second).is_ok());
    }

    #[test]
    fn release_beyond_pool_capacity_is_reported() {
        let pipeline: TestPipeline<1> = Pipeline::new();
        pipeline.seed([leak_buf(0)]).unwrap();
        assert_eq!(
            pipeline.release(Chunk::new(leak_buf(9))),
            Err(PoolError::Full)
        );
    }
}
