//! Bus controller
//!
//! Owns the framer, the transmit queue, the arbiter and the polling schedule,
//! and is the only thing the firmware talks to. It is driven from a single
//! task:
//!
//! - [`BusController::tick`] on a short fixed period: drains received bytes,
//!   fires the deferred pump poll, then lets the arbiter send at most one
//!   frame.
//! - [`BusController::update`] on the long polling period: queues a
//!   rate-limited chlorinator refresh and arms the pump poll.
//!
//! Control requests (takeover mode, output percent, pump commands) only
//! queue frames; nothing here waits on the line.

use poolbus_hal::{OutputPin, UartRx, UartTx};
use poolbus_protocol::chlorinator::{self, Response};
use poolbus_protocol::pump::{self, PumpStatus};
use poolbus_protocol::{Frame, FrameEvent, Framer, Protocol};

use crate::arbiter::{ServiceOutcome, TransmitArbiter};
use crate::config::BusConfig;
use crate::error::{BusError, CommandError};
use crate::port::SerialPort;
use crate::queue::{PendingCommand, TransmitQueue};
use crate::schedule::PollSchedule;
use crate::telemetry::{ChlorinatorTelemetry, Telemetry, TelemetrySink};
use crate::time::Instant;

/// Bytes pulled from the receiver per read
const RX_CHUNK: usize = 32;

/// Highest accepted output percent
pub const MAX_PERCENT: u8 = 100;

pub struct BusController {
    framer: Framer,
    queue: TransmitQueue,
    arbiter: TransmitArbiter,
    schedule: PollSchedule,
    takeover: bool,
    swg_percent: u8,
    last_set_percent: u8,
}

impl BusController {
    pub fn new(config: &BusConfig, now: Instant) -> Self {
        Self {
            framer: Framer::new(),
            queue: TransmitQueue::new(),
            arbiter: TransmitArbiter::new(&config.timing, now),
            schedule: PollSchedule::new(config),
            takeover: config.chlorinator.takeover,
            swg_percent: config.chlorinator.percent.min(MAX_PERCENT),
            last_set_percent: 0,
        }
    }

    // ---- Receive path ----

    /// Feed one received byte
    ///
    /// A completed frame is decoded and published before this returns.
    pub fn receive<S>(&mut self, byte: u8, now: Instant, sink: &mut S) -> FrameEvent
    where
        S: TelemetrySink + ?Sized,
    {
        self.arbiter.record_receive(now);
        let event = self.framer.push(byte);
        if let FrameEvent::Complete(frame) = &event {
            self.dispatch(frame, sink);
        }
        event
    }

    fn dispatch<S>(&mut self, frame: &Frame, sink: &mut S)
    where
        S: TelemetrySink + ?Sized,
    {
        match frame.protocol {
            Protocol::Chlorinator => {
                if let Some(response) = Response::from_frame(frame.body()) {
                    let update = self.chlorinator_telemetry(response);
                    sink.publish(&Telemetry::Chlorinator(update));
                }
                // Any reply counts as the answer to the command in front
                if self.queue.ack_chlorinator().is_some() {
                    debug!("IC reply, removing command from send queue");
                }
            }
            Protocol::Pump => {
                if let Some(status) = PumpStatus::from_message(frame.body()) {
                    sink.publish(&Telemetry::Pump(status));
                }
            }
        }
    }

    fn chlorinator_telemetry(&self, response: Response) -> ChlorinatorTelemetry {
        match response {
            Response::Version(version) => ChlorinatorTelemetry::Version(version),
            Response::Temperature(t) => ChlorinatorTelemetry::WaterTemperature(t),
            Response::Status { salt_ppm, errors } => ChlorinatorTelemetry::Status {
                salt_ppm,
                errors,
                last_set_percent: self.last_set_percent,
            },
            Response::Takeover { status } => ChlorinatorTelemetry::Takeover { status },
        }
    }

    // ---- Tick ----

    /// One pass of the bus loop
    ///
    /// Drains every byte the receiver holds, queues the pump poll if it is
    /// due, then services the transmit queue. Sends at most one frame.
    pub fn tick<T, R, P, S>(
        &mut self,
        now: Instant,
        port: &mut SerialPort<T, R, P>,
        sink: &mut S,
    ) -> Result<ServiceOutcome, BusError<R::Error, T::Error>>
    where
        T: UartTx,
        R: UartRx,
        P: OutputPin,
        S: TelemetrySink + ?Sized,
    {
        let mut buf = [0u8; RX_CHUNK];
        loop {
            let n = port.read_available(&mut buf)?;
            if n == 0 {
                break;
            }
            for &byte in &buf[..n] {
                self.receive(byte, now, sink);
            }
        }

        if self.schedule.take_pump_poll(now) {
            if let Err(e) = self.poll_pump() {
                warn!("Pump poll not queued: {}", e);
            }
        }

        self.arbiter.service(&mut self.queue, port, now)
    }

    // ---- Polling ----

    /// Periodic poll of both devices
    ///
    /// Queues a chlorinator refresh if the rate limit allows, and arms the
    /// pump poll to follow after the configured delay.
    pub fn update(&mut self, now: Instant) -> Result<(), CommandError> {
        self.schedule.arm_pump_poll(now);
        self.read_all_chlorinator_info(now)
    }

    /// Queue a chlorinator refresh now, ignoring the rate limit
    pub fn refresh_chlorinator(&mut self, now: Instant) -> Result<(), CommandError> {
        debug!("Manual chlorinator refresh requested");
        self.queue_refresh()?;
        self.schedule.mark_refreshed(now);
        Ok(())
    }

    /// Switch takeover mode and request a rate-limited refresh
    pub fn set_takeover_mode(&mut self, enable: bool, now: Instant) -> Result<(), CommandError> {
        info!("Takeover mode {}", enable);
        self.takeover = enable;
        self.read_all_chlorinator_info(now)
    }

    /// Record the target output percent, clamped to 100
    ///
    /// In takeover mode this also requests a rate-limited refresh, which is
    /// what actually sends the new value.
    pub fn set_swg_percent(&mut self, percent: u8, now: Instant) -> Result<(), CommandError> {
        if percent > MAX_PERCENT {
            warn!("SWG percent {} clamped to {}", percent, MAX_PERCENT);
        }
        self.swg_percent = percent.min(MAX_PERCENT);
        if self.takeover {
            self.read_all_chlorinator_info(now)
        } else {
            Ok(())
        }
    }

    fn read_all_chlorinator_info(&mut self, now: Instant) -> Result<(), CommandError> {
        if !self.schedule.refresh_due(now) {
            return Ok(());
        }
        // The slot is only used up once the whole refresh is queued
        self.queue_refresh()?;
        self.schedule.mark_refreshed(now);
        Ok(())
    }

    /// Queue every command of one refresh, or none of them
    fn queue_refresh(&mut self) -> Result<(), CommandError> {
        let needed = if self.takeover { 4 } else { 2 };
        if self.queue.available() < needed {
            warn!(
                "Send queue has room for {} of {} refresh commands, skipping",
                self.queue.available(),
                needed
            );
            return Err(CommandError::QueueFull);
        }

        if self.takeover {
            debug!("IC send Takeover");
            self.queue_chlorinator(chlorinator::Command::Takeover)?;
            debug!("IC send SetPercent");
            self.last_set_percent = self.swg_percent;
            self.queue_chlorinator(chlorinator::Command::SetPercent(self.swg_percent))?;
        }
        debug!("IC send GetVersion");
        self.queue_chlorinator(chlorinator::Command::GetVersion)?;
        debug!("IC send GetTemp");
        self.queue_chlorinator(chlorinator::Command::GetTemperature)
    }

    fn poll_pump(&mut self) -> Result<(), CommandError> {
        self.request_pump_status()?;
        self.pump_to_local_control()
    }

    // ---- Queueing ----

    /// Encode and queue a chlorinator command with its retry limit
    pub fn queue_chlorinator(&mut self, command: chlorinator::Command) -> Result<(), CommandError> {
        let frame = command.encode()?;
        self.queue
            .push(PendingCommand::chlorinator(frame, command.retries()))
    }

    /// Encode, self-check and queue a pump command
    pub fn queue_pump(&mut self, command: pump::Command) -> Result<(), CommandError> {
        let frame = command.encode()?;
        self.queue.push(PendingCommand::pump(frame))
    }

    pub fn request_pump_status(&mut self) -> Result<(), CommandError> {
        debug!("IF requesting pump status");
        self.queue_pump(pump::Command::RequestStatus)
    }

    pub fn pump_to_local_control(&mut self) -> Result<(), CommandError> {
        debug!("IF pump to local control");
        self.queue_pump(pump::Command::LocalControl)
    }

    pub fn pump_to_remote_control(&mut self) -> Result<(), CommandError> {
        debug!("IF pump to remote control");
        self.queue_pump(pump::Command::RemoteControl)
    }

    pub fn run_pump(&mut self) -> Result<(), CommandError> {
        self.queue_pump(pump::Command::Run)
    }

    pub fn stop_pump(&mut self) -> Result<(), CommandError> {
        self.queue_pump(pump::Command::Stop)
    }

    /// Run one of the pump's local programs, 0-3
    pub fn run_local_program(&mut self, program: u8) -> Result<(), CommandError> {
        self.queue_pump(pump::Command::LocalProgram(program))
    }

    /// Run external program 1-4
    pub fn run_external_program(&mut self, program: u8) -> Result<(), CommandError> {
        self.queue_pump(pump::Command::ExternalProgram(program))
    }

    /// Store the speed of an external program
    pub fn save_program_value(&mut self, program: u8, value: u16) -> Result<(), CommandError> {
        self.queue_pump(pump::Command::SaveProgramValue { program, value })
    }

    pub fn set_pump_rpm(&mut self, rpm: u16) -> Result<(), CommandError> {
        self.queue_pump(pump::Command::SetRpm(rpm))
    }

    /// Flow target in tenths of m³/h
    pub fn set_pump_flow(&mut self, flow: u8) -> Result<(), CommandError> {
        self.queue_pump(pump::Command::SetFlow(flow))
    }

    pub fn set_pump_clock(&mut self, hour: u8, minute: u8) -> Result<(), CommandError> {
        warn!("IF clock set is not supported by every pump model");
        self.queue_pump(pump::Command::SetClock { hour, minute })
    }

    // ---- State ----

    pub fn takeover_mode(&self) -> bool {
        self.takeover
    }

    pub fn swg_percent(&self) -> u8 {
        self.swg_percent
    }

    /// Percent carried by the most recently queued set command
    pub fn last_set_percent(&self) -> u8 {
        self.last_set_percent
    }

    pub fn queue(&self) -> &TransmitQueue {
        &self.queue
    }

    pub fn framer(&self) -> &Framer {
        &self.framer
    }

    pub fn arbiter(&self) -> &TransmitArbiter {
        &self.arbiter
    }

    pub fn pump_poll_pending(&self) -> bool {
        self.schedule.pump_poll_pending()
    }
}
