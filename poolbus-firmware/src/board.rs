//! RP2040 peripherals behind the poolbus-hal traits

use core::convert::Infallible;

use embassy_rp::uart::{self, BufferedUartTx};
use poolbus_hal::uart::{DataBits, Parity, StopBits};
use poolbus_hal::{OutputPin, UartConfig, UartRx, UartTx};

use crate::channels::RX_PIPE;

/// Translate the bus line settings into the embassy UART config
pub fn uart_config(serial: &UartConfig) -> uart::Config {
    let mut config = uart::Config::default();
    config.baudrate = serial.baudrate;
    config.data_bits = match serial.data_bits {
        DataBits::Seven => uart::DataBits::DataBits7,
        DataBits::Eight => uart::DataBits::DataBits8,
    };
    config.parity = match serial.parity {
        Parity::None => uart::Parity::ParityNone,
        Parity::Even => uart::Parity::ParityEven,
        Parity::Odd => uart::Parity::ParityOdd,
    };
    config.stop_bits = match serial.stop_bits {
        StopBits::One => uart::StopBits::STOP1,
        StopBits::Two => uart::StopBits::STOP2,
    };
    config
}

/// Blocking writer over the buffered UART
pub struct UartWriter(pub BufferedUartTx);

impl UartTx for UartWriter {
    type Error = uart::Error;

    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        embedded_io::Write::write_all(&mut self.0, data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        embedded_io::Write::flush(&mut self.0)?;
        // Buffer drained; wait for the shift register before the line turns around
        while self.0.busy() {}
        Ok(())
    }
}

/// Non-blocking reader over the bytes collected by the receive task
pub struct PipeReader;

impl UartRx for PipeReader {
    type Error = Infallible;

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        // An empty pipe reports an error; that just means nothing arrived
        Ok(RX_PIPE.try_read(buf).unwrap_or(0))
    }
}

/// RS-485 driver enable on a GPIO
pub struct TxEnable<P> {
    pin: P,
    high: bool,
}

impl<P: embedded_hal::digital::OutputPin> TxEnable<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, high: false }
    }
}

impl<P: embedded_hal::digital::OutputPin> OutputPin for TxEnable<P> {
    fn set_high(&mut self) {
        // GPIO writes on the RP2040 are infallible
        let _ = self.pin.set_high();
        self.high = true;
    }

    fn set_low(&mut self) {
        let _ = self.pin.set_low();
        self.high = false;
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}
