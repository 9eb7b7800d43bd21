//! Bus engine task
//!
//! Ticks the controller at a fixed rate so received bytes are framed and the
//! transmit queue is serviced, and runs the periodic device update.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_rp::gpio::Output;
use embassy_rp::uart::BufferedUartTx;
use embassy_time::{Duration, Ticker};

use poolbus_core::config::BusConfig;
use poolbus_core::telemetry::ChlorinatorTelemetry;
use poolbus_core::{
    BusController, BusError, Instant, SerialPort, Telemetry, TelemetrySink, TelemetrySnapshot,
};
use poolbus_protocol::pump::Program;

use crate::board::{PipeReader, TxEnable, UartWriter};

/// Logs each update and keeps the latest values
struct LogSink {
    snapshot: TelemetrySnapshot,
}

impl TelemetrySink for LogSink {
    fn publish(&mut self, telemetry: &Telemetry) {
        self.snapshot.publish(telemetry);

        match telemetry {
            Telemetry::Chlorinator(ChlorinatorTelemetry::Version(version)) => {
                info!("Chlorinator version: {}", version.as_str());
            }
            Telemetry::Chlorinator(ChlorinatorTelemetry::WaterTemperature(t)) => {
                info!("Water temperature: {}", t);
            }
            Telemetry::Chlorinator(ChlorinatorTelemetry::Status {
                salt_ppm,
                errors,
                last_set_percent,
            }) => {
                info!(
                    "Salt: {} ppm, errors: {:#04x}, set: {}%",
                    salt_ppm, errors.0, last_set_percent
                );
            }
            Telemetry::Chlorinator(ChlorinatorTelemetry::Takeover { status }) => {
                debug!("Takeover status: {:#04x}", status);
            }
            Telemetry::Pump(status) => {
                // Unknown codes keep the last known running state and program
                let pump = &self.snapshot.pump;
                info!(
                    "Pump: running={}, program={=str}, {} W, {} rpm, {} m3/h, {} bar",
                    pump.running,
                    pump.program.map(Program::label).unwrap_or("unknown"),
                    status.power,
                    status.rpm,
                    status.flow,
                    status.pressure
                );
            }
        }
    }
}

fn now() -> Instant {
    // Truncation to u32 is fine, all engine arithmetic wraps
    Instant::from_millis(embassy_time::Instant::now().as_millis() as u32)
}

#[embassy_executor::task]
pub async fn bus_task(config: BusConfig, tx: BufferedUartTx, tx_enable: Output<'static>) {
    info!("Bus task started");

    let mut controller = BusController::new(&config, now());
    let mut port = SerialPort::with_tx_enable(UartWriter(tx), PipeReader, TxEnable::new(tx_enable));
    let mut sink = LogSink {
        snapshot: TelemetrySnapshot::new(),
    };

    let mut tick = Ticker::every(Duration::from_millis(config.polling.tick_interval_ms as u64));
    let mut update = Ticker::every(Duration::from_millis(config.polling.update_interval_ms as u64));

    // Takeover mode and percent come from the config; the first update
    // sends them
    if let Err(e) = controller.update(now()) {
        warn!("Update not queued: {}", e);
    }

    loop {
        match select(tick.next(), update.next()).await {
            Either::First(()) => match controller.tick(now(), &mut port, &mut sink) {
                Ok(_) => {}
                Err(BusError::Read(never)) => match never {},
                Err(BusError::Write(e)) => warn!("UART write error: {:?}", e),
            },
            Either::Second(()) => {
                if let Err(e) = controller.update(now()) {
                    warn!("Update not queued: {}", e);
                }
            }
        }
    }
}
