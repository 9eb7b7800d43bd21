//! Transmit arbiter
//!
//! Decides when the shared line is quiet enough to talk and services the
//! front of the transmit queue. At most one frame goes out per call.
//!
//! ```text
//!  gate open? ── no ──▶ Idle
//!      │ yes
//!  front entry ── none ──▶ Idle
//!      │
//!      ├─ Chlorinator, sent retries+1 times ──▶ pop, Exhausted
//!      ├─ Chlorinator ──▶ attempts += 1, write with TX enable, keep queued
//!      └─ Pump ──▶ write, pop
//! ```

use poolbus_hal::{OutputPin, UartRx, UartTx};
use poolbus_protocol::Protocol;

use crate::config::TimingConfig;
use crate::error::BusError;
use crate::port::SerialPort;
use crate::queue::{PendingCommand, TransmitQueue};
use crate::time::{Duration, Instant};

/// What a service call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceOutcome {
    /// Gate closed or nothing queued
    Idle,
    /// One frame was written
    Sent(Protocol),
    /// A chlorinator command ran out of attempts and was dropped
    Exhausted,
}

/// Bus-quiet gate and queue servicing
#[derive(Debug, Clone)]
pub struct TransmitArbiter {
    command_quiet: Duration,
    transmit_quiet: Duration,
    receive_quiet: Duration,
    last_command: Instant,
    last_transmit: Instant,
    last_receive: Instant,
}

impl TransmitArbiter {
    /// Arbiter whose timestamps all start at `now`
    ///
    /// The gate therefore stays closed for the first quiet period after
    /// start-up.
    pub fn new(timing: &TimingConfig, now: Instant) -> Self {
        Self {
            command_quiet: timing.command_quiet(),
            transmit_quiet: timing.transmit_quiet(),
            receive_quiet: timing.receive_quiet(),
            last_command: now,
            last_transmit: now,
            last_receive: now,
        }
    }

    /// Note that a byte arrived
    pub fn record_receive(&mut self, now: Instant) {
        self.last_receive = now;
    }

    /// True when every quiet period has strictly elapsed
    pub fn gate_open(&self, now: Instant) -> bool {
        now.duration_since(self.last_command) > self.command_quiet
            && now.duration_since(self.last_transmit) > self.transmit_quiet
            && now.duration_since(self.last_receive) > self.receive_quiet
    }

    pub fn last_command(&self) -> Instant {
        self.last_command
    }

    pub fn last_transmit(&self) -> Instant {
        self.last_transmit
    }

    pub fn last_receive(&self) -> Instant {
        self.last_receive
    }

    /// Service the front of `queue` if the gate is open
    ///
    /// A failed write leaves the entry where it was. A chlorinator entry has
    /// already had the attempt counted.
    pub fn service<T, R, P>(
        &mut self,
        queue: &mut TransmitQueue,
        port: &mut SerialPort<T, R, P>,
        now: Instant,
    ) -> Result<ServiceOutcome, BusError<R::Error, T::Error>>
    where
        T: UartTx,
        R: UartRx,
        P: OutputPin,
    {
        if !self.gate_open(now) {
            return Ok(ServiceOutcome::Idle);
        }

        let Some(front) = queue.front_mut() else {
            return Ok(ServiceOutcome::Idle);
        };

        match front {
            PendingCommand::Chlorinator {
                retries,
                attempts,
                frame,
            } => {
                if *attempts > u16::from(*retries) {
                    error!(
                        "IC no response after {} attempts, removing from send queue",
                        *attempts
                    );
                    queue.pop_front();
                    return Ok(ServiceOutcome::Exhausted);
                }

                *attempts += 1;
                debug!("IC process queue retries:{} attempt:{}", *retries, *attempts);
                info!("IC sent: {=[u8]:02X}", frame.as_slice());
                port.send_chlorinator(frame)?;

                self.last_command = now;
                self.last_transmit = now;
                Ok(ServiceOutcome::Sent(Protocol::Chlorinator))
            }
            PendingCommand::Pump { frame } => {
                port.send_pump(frame)?;
                info!("IF sent: {=[u8]:02X}", frame.as_slice());

                self.last_receive = now;
                self.last_transmit = now;
                queue.pop_front();
                Ok(ServiceOutcome::Sent(Protocol::Pump))
            }
        }
    }
}
