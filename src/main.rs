//! Serial capture logger for RP2350A
//!
//! Core 1 receives fixed-size packets from the serial link (or synthesises
//! them) and packs them into chunks; core 0 appends the chunks to
//! `DIR<n>/FILE_<m>.txt` on the SD card and logs the sustained write speed.
//! A new `DIR<n>` is created on every boot.

#![no_std]
#![no_main]

mod sd_card;

use defmt::*;
use embassy_executor::Executor;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::UART0;
use embassy_rp::spi;
use embassy_rp::uart::{BufferedInterruptHandler, BufferedUartRx, Config as UartConfig};
use embassy_rp::watchdog::Watchdog;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Duration;
use static_cell::StaticCell;

use sd_card::SdStorage;
use serial_sd_logger::config::*;
use serial_sd_logger::{
    start_session, FrameAssembler, PatternSource, Pipeline, ReadTransport, SegmentConfig, SegmentWriter,
    SystemClock,
};

use {defmt_rtt as _, panic_probe as _};

// ============================================================================
// Interrupt bindings
// ============================================================================

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// ============================================================================
// Shared state
// ============================================================================

type CapturePipeline = Pipeline<CriticalSectionRawMutex, CHUNK_SIZE, CHANNEL_CAPACITY, CHUNK_POOL_SIZE>;

/// Chunk handoff: receiver (core 1) → SD writer (core 0)
static PIPELINE: CapturePipeline = Pipeline::new();

static CHUNK_BUFFERS: StaticCell<[[u8; CHUNK_SIZE]; CHUNK_POOL_SIZE]> = StaticCell::new();

static CORE1_STACK: StaticCell<Stack<8192>> = StaticCell::new();
static EXECUTOR0: StaticCell<Executor> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

// ============================================================================
// Entry point
// ============================================================================

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());
    info!("Serial SD logger starting...");

    let mut watchdog = Watchdog::new(p.WATCHDOG);

    // ── SD card ─────────────────────────────────────────────────────────
    let mut spi_config = spi::Config::default();
    spi_config.frequency = SD_SPI_INIT_FREQ;
    let spi1 = spi::Spi::new_blocking(p.SPI1, p.PIN_10, p.PIN_11, p.PIN_12, spi_config);
    let cs = Output::new(p.PIN_13, Level::High);

    let mut storage = match sd_card::mount(spi1, cs) {
        Ok(s) => s,
        Err(e) => fatal(&mut watchdog, "SD mount", e),
    };

    // ── Session directory ──────────────────────────────────────────────
    let session = match start_session(&mut storage) {
        Ok(s) => s,
        Err(e) => fatal(&mut watchdog, "session directory", e),
    };
    info!("Session {}: first segment {}", session.index(), session.segment_path(SEGMENT_BASE_INDEX).as_str());

    // ── Chunk buffers ──────────────────────────────────────────────────
    let buffers = CHUNK_BUFFERS.init([[0u8; CHUNK_SIZE]; CHUNK_POOL_SIZE]);
    if let Err(e) = PIPELINE.seed(buffers.iter_mut()) {
        fatal(&mut watchdog, "chunk pool", e);
    }

    let writer = SegmentWriter::new(storage, SystemClock, session, SegmentConfig::default());

    // ── Core 1: receiver ───────────────────────────────────────────────
    let uart0 = p.UART0;
    let rx_pin = p.PIN_1;
    spawn_core1(
        p.CORE1,
        CORE1_STACK.init_with(Stack::new),
        move || {
            let executor1 = EXECUTOR1.init(Executor::new());
            executor1.run(|spawner| match DATA_SOURCE {
                DataSource::Serial => {
                    static RX_BUF: StaticCell<[u8; UART_RX_BUF_SIZE]> = StaticCell::new();
                    let rx_buf = &mut RX_BUF.init([0; UART_RX_BUF_SIZE])[..];
                    let mut uart_config = UartConfig::default();
                    uart_config.baudrate = UART_BAUDRATE;
                    let rx = BufferedUartRx::new(uart0, Irqs, rx_pin, rx_buf, uart_config);
                    spawner.must_spawn(receiver_task(rx));
                }
                DataSource::Pattern => spawner.must_spawn(generator_task()),
            });
        },
    );

    // ── Core 0: SD writer ──────────────────────────────────────────────
    let executor0 = EXECUTOR0.init(Executor::new());
    executor0.run(|spawner| spawner.must_spawn(sd_writer_task(writer)));
}

/// Startup failure: log, then let the watchdog reboot us.
fn fatal(watchdog: &mut Watchdog, what: &str, err: impl Format) -> ! {
    error!("Fatal: {} failed: {}, watchdog reboot in {} ms", what, err, WATCHDOG_PERIOD_MS);
    watchdog.start(Duration::from_millis(WATCHDOG_PERIOD_MS));
    loop {
        cortex_m::asm::wfi();
    }
}

// ============================================================================
// Receiver tasks (core 1): fill chunks, hand them to the writer
// ============================================================================

#[embassy_executor::task]
async fn receiver_task(rx: BufferedUartRx) {
    info!("receiver_task started ({} baud)", UART_BAUDRATE);
    let assembler: FrameAssembler<_, CHUNK_SIZE, PACKET_SIZE> = FrameAssembler::new(ReadTransport::new(rx));
    assembler.run(&PIPELINE).await
}

#[embassy_executor::task]
async fn generator_task() {
    info!("generator_task started (A..Z pattern)");
    let assembler: FrameAssembler<_, CHUNK_SIZE, PACKET_SIZE> = FrameAssembler::new(PatternSource::new(CHUNK_SIZE));
    assembler.run(&PIPELINE).await
}

// ============================================================================
// SD writer task (core 0): append chunks, roll segments, report throughput
// ============================================================================

#[embassy_executor::task]
async fn sd_writer_task(mut writer: SegmentWriter<SdStorage, SystemClock>) {
    info!("sd_writer_task started");
    writer.run(&PIPELINE).await
}
