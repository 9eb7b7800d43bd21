//! Poolbus - RS-485 bridge firmware for Pentair pool equipment
//!
//! Polls an IntelliChlor salt chlorinator and an IntelliFlo pump sharing one
//! half-duplex RS-485 line, and optionally takes over control of the
//! chlorinator's output from the pool controller.
//!
//! Wiring (RP2040):
//! - GPIO0 UART0 TX -> transceiver DI
//! - GPIO1 UART0 RX <- transceiver RO
//! - GPIO2 -> transceiver DE/RE (driver enable)

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use poolbus_core::config::toml::parse_config;
use poolbus_core::config::BusConfig;

/// Embedded bus configuration (compiled into firmware)
/// Edit bus.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../bus.toml");

mod board;
mod channels;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Poolbus firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart_config = board::uart_config(&config.serial);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    // Receiver enabled until a chlorinator frame goes out
    let tx_enable = Output::new(p.PIN_2, Level::Low);

    info!(
        "RS-485 initialized at {} baud, takeover={}",
        config.serial.baudrate, config.chlorinator.takeover
    );

    spawner.spawn(tasks::rx_task(rx)).unwrap();
    spawner.spawn(tasks::bus_task(config, tx, tx_enable)).unwrap();

    info!("All tasks spawned");
}

/// Parse the embedded configuration, falling back to defaults
fn load_config() -> BusConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Loaded bus.toml");
            config
        }
        Err(e) => {
            // build.rs validates the file, so this only trips on parser drift
            warn!("bus.toml rejected: {}, using defaults", e);
            BusConfig::default()
        }
    }
}
