//! RS-485 receive task
//!
//! Moves bytes from the buffered UART into [`RX_PIPE`] as they arrive.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use crate::channels::RX_PIPE;

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

#[embassy_executor::task]
pub async fn rx_task(mut rx: BufferedUartRx) {
    info!("RS-485 RX task started");

    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("RX: {} bytes", n);
                // Waits while the bus task is behind
                RX_PIPE.write_all(&buf[..n]).await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("UART read error: {:?}", e);
            }
        }
    }
}
