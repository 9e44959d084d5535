//! Serial transport capability and the data sources built on it.

use embedded_io_async::{Read, ReadExactError};

/// One blocking transaction against the serial bus.
///
/// The transaction is clocked by the external master: `transact` returns once
/// the master has moved `rx.len()` bytes, or fails. Implementations report how
/// many bytes landed in `rx`.
#[allow(async_fn_in_trait)]
pub trait SerialTransport {
    type Error: core::fmt::Debug;

    async fn transact(&mut self, tx: Option<&[u8]>, rx: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Receive-only transport over any `embedded_io_async::Read` (UART RX half).
///
/// Each transaction reads exactly `rx.len()` bytes. There is no TX path on a
/// receive-only link, so `tx` is ignored.
pub struct ReadTransport<R> {
    rx: R,
}

impl<R: Read> ReadTransport<R> {
    pub fn new(rx: R) -> Self {
        Self { rx }
    }

    pub fn into_inner(self) -> R {
        self.rx
    }
}

impl<R: Read> SerialTransport for ReadTransport<R> {
    type Error = ReadExactError<R::Error>;

    async fn transact(&mut self, _tx: Option<&[u8]>, rx: &mut [u8]) -> Result<usize, Self::Error> {
        self.rx.read_exact(rx).await?;
        Ok(rx.len())
    }
}

/// On-device stand-in for the external source: byte `i` of every
/// `period`-byte block is `b'A' + i % 26`. With `period` set to the chunk size
/// each chunk starts again at `A`.
pub struct PatternSource {
    period: usize,
    offset: usize,
}

impl PatternSource {
    pub const fn new(period: usize) -> Self {
        Self {
            period: if period == 0 { 1 } else { period },
            offset: 0,
        }
    }
}

impl SerialTransport for PatternSource {
    type Error = core::convert::Infallible;

    async fn transact(&mut self, _tx: Option<&[u8]>, rx: &mut [u8]) -> Result<usize, Self::Error> {
        for b in rx.iter_mut() {
            *b = b'A' + (self.offset % 26) as u8;
            self.offset = (self.offset + 1) % self.period;
        }
        // Let the writer run when both tasks share one executor.
        embassy_futures::yield_now().await;
        Ok(rx.len())
    }
}
