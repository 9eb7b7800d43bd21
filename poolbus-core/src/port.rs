//! Serial port with optional RS-485 transmit enable
//!
//! Chlorinator frames are written with the transceiver's driver enabled for
//! exactly the duration of the write. Pump frames go out with the line
//! direction untouched.

use poolbus_hal::{NoPin, OutputPin, UartRx, UartTx};

use crate::error::BusError;

/// The half-duplex line: one transmitter, one receiver, and an optional
/// transmit enable output
pub struct SerialPort<T, R, P = NoPin> {
    tx: T,
    rx: R,
    tx_enable: Option<P>,
}

impl<T, R> SerialPort<T, R, NoPin> {
    /// Port for an auto-direction transceiver
    pub fn new(tx: T, rx: R) -> Self {
        Self {
            tx,
            rx,
            tx_enable: None,
        }
    }
}

impl<T, R, P> SerialPort<T, R, P>
where
    T: UartTx,
    R: UartRx,
    P: OutputPin,
{
    /// Port that drives `pin` high around chlorinator writes
    pub fn with_tx_enable(tx: T, rx: R, mut pin: P) -> Self {
        pin.set_low();
        Self {
            tx,
            rx,
            tx_enable: Some(pin),
        }
    }

    /// Copy already received bytes into `buf`
    pub fn read_available(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, BusError<R::Error, T::Error>> {
        self.rx.read_available(buf).map_err(BusError::Read)
    }

    /// Write a chlorinator frame with transmit enable asserted
    ///
    /// The pin is released again even when the write fails.
    pub fn send_chlorinator(
        &mut self,
        frame: &[u8],
    ) -> Result<(), BusError<R::Error, T::Error>> {
        if let Some(pin) = self.tx_enable.as_mut() {
            trace!("Enable send");
            pin.set_high();
        }

        let result = self
            .tx
            .write_all(frame)
            .and_then(|()| self.tx.flush());

        if let Some(pin) = self.tx_enable.as_mut() {
            trace!("Disable send");
            pin.set_low();
        }

        result.map_err(BusError::Write)
    }

    /// Write a pump frame, leaving the line direction alone
    pub fn send_pump(&mut self, frame: &[u8]) -> Result<(), BusError<R::Error, T::Error>> {
        self.tx
            .flush()
            .and_then(|()| self.tx.write_all(frame))
            .map_err(BusError::Write)
    }

    pub fn tx_enable(&self) -> Option<&P> {
        self.tx_enable.as_ref()
    }

    /// Split back into the underlying peripherals
    pub fn into_parts(self) -> (T, R, Option<P>) {
        (self.tx, self.rx, self.tx_enable)
    }

    #[cfg(test)]
    pub(crate) fn rx_mut(&mut self) -> &mut R {
        &mut self.rx
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Host-side peripherals for engine tests

    use heapless::Vec;
    use poolbus_hal::{OutputPin, UartRx, UartTx};

    /// Records every write; each write is one entry
    #[derive(Debug, Default)]
    pub struct MockTx {
        pub writes: Vec<Vec<u8, 32>, 64>,
        pub flushes: usize,
        pub fail_writes: bool,
    }

    impl UartTx for MockTx {
        type Error = ();

        fn write_all(&mut self, data: &[u8]) -> Result<(), ()> {
            if self.fail_writes {
                return Err(());
            }
            let frame = Vec::from_slice(data).map_err(|_| ())?;
            self.writes.push(frame).map_err(|_| ())
        }

        fn flush(&mut self) -> Result<(), ()> {
            self.flushes += 1;
            Ok(())
        }
    }

    /// Serves queued bytes in chunks of at most `chunk`
    #[derive(Debug, Default)]
    pub struct MockRx {
        pub pending: Vec<u8, 256>,
        pub chunk: usize,
    }

    impl MockRx {
        pub fn feed(&mut self, bytes: &[u8]) {
            self.pending.extend_from_slice(bytes).unwrap();
        }
    }

    impl UartRx for MockRx {
        type Error = ();

        fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
            let limit = if self.chunk == 0 { buf.len() } else { self.chunk };
            let n = self.pending.len().min(buf.len()).min(limit);
            buf[..n].copy_from_slice(&self.pending[..n]);
            let rest: Vec<u8, 256> = Vec::from_slice(&self.pending[n..]).unwrap();
            self.pending = rest;
            Ok(n)
        }
    }

    /// Pin that counts its rising edges
    #[derive(Debug, Default)]
    pub struct MockPin {
        pub high: bool,
        pub rising_edges: usize,
    }

    impl OutputPin for MockPin {
        fn set_high(&mut self) {
            if !self.high {
                self.rising_edges += 1;
            }
            self.high = true;
        }

        fn set_low(&mut self) {
            self.high = false;
        }

        fn is_set_high(&self) -> bool {
            self.high
        }
    }
}
