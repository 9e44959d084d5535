//! Data source mock: plays the external sensor on a second board.
//! Streams `PACKET_SIZE`-byte packets of `MOCK_PACKET_FILL` on UART0 TX
//! (GPIO0) as fast as the link allows, or one every `MOCK_PACKET_PERIOD_US`.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, BufferedUartTx, Config as UartConfig};
use embassy_time::{Duration, Instant, Ticker};
use embedded_io_async::Write;
use static_cell::StaticCell;

use serial_sd_logger::config::{MOCK_PACKET_FILL, MOCK_PACKET_PERIOD_US, PACKET_SIZE, UART_BAUDRATE};

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

/// Log the packet rate this often
const REPORT_EVERY_PACKETS: u32 = 100_000;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    info!("Data source mock starting ({} B packets @ {} baud)", PACKET_SIZE, UART_BAUDRATE);

    static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
    let tx_buf = &mut TX_BUF.init([0; 256])[..];
    let mut config = UartConfig::default();
    config.baudrate = UART_BAUDRATE;
    let mut tx = BufferedUartTx::new(p.UART0, Irqs, p.PIN_0, tx_buf, config);

    let packet = [MOCK_PACKET_FILL; PACKET_SIZE];
    let mut ticker = (MOCK_PACKET_PERIOD_US > 0).then(|| Ticker::every(Duration::from_micros(MOCK_PACKET_PERIOD_US)));
    let mut sent: u32 = 0;
    let mut window_start = Instant::now();

    loop {
        if let Err(e) = tx.write_all(&packet).await {
            warn!("UART write error: {:?}", e);
            continue;
        }
        sent += 1;
        if sent == REPORT_EVERY_PACKETS {
            let elapsed_ms = window_start.elapsed().as_millis().max(1);
            info!("Sent {} packets in {} ms", sent, elapsed_ms);
            sent = 0;
            window_start = Instant::now();
        }
        if let Some(ticker) = ticker.as_mut() {
            ticker.next().await;
        }
    }
}
