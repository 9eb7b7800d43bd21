//! Decoded telemetry and its consumer
//!
//! Every completed frame that decodes to something useful is published once
//! through [`TelemetrySink`]. What happens next (sensor entities, a display,
//! a log line) is the sink's business.

use poolbus_protocol::chlorinator::{ErrorFlags, Version};
use poolbus_protocol::pump::{Program, PumpStatus};

/// A value decoded from a chlorinator reply
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChlorinatorTelemetry {
    Version(Version),
    /// Raw device units
    WaterTemperature(u8),
    Status {
        salt_ppm: u16,
        errors: ErrorFlags,
        /// Output percent most recently commanded by this controller
        last_set_percent: u8,
    },
    Takeover {
        status: u8,
    },
}

/// One published update
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Telemetry {
    Chlorinator(ChlorinatorTelemetry),
    Pump(PumpStatus),
}

/// Consumer of decoded telemetry
pub trait TelemetrySink {
    fn publish(&mut self, telemetry: &Telemetry);
}

impl<F> TelemetrySink for F
where
    F: FnMut(&Telemetry),
{
    fn publish(&mut self, telemetry: &Telemetry) {
        self(telemetry)
    }
}

/// Last known chlorinator values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChlorinatorSnapshot {
    pub version: Option<Version>,
    pub water_temperature: Option<u8>,
    pub salt_ppm: Option<u16>,
    pub errors: Option<ErrorFlags>,
    pub last_set_percent: Option<u8>,
    pub takeover_status: Option<u8>,
}

/// Last known pump values
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PumpSnapshot {
    pub running: Option<bool>,
    pub program: Option<Program>,
    pub power: Option<u16>,
    pub rpm: Option<u16>,
    pub flow: Option<f32>,
    pub pressure: Option<f32>,
    pub time_remaining: Option<u16>,
    pub clock: Option<u16>,
}

/// Sink that keeps the last published value of every field
///
/// A pump status carrying an unknown running or program code leaves the
/// previous value in place.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySnapshot {
    pub chlorinator: ChlorinatorSnapshot,
    pub pump: PumpSnapshot,
    /// Updates received so far
    pub updates: u32,
}

impl TelemetrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TelemetrySink for TelemetrySnapshot {
    fn publish(&mut self, telemetry: &Telemetry) {
        self.updates = self.updates.wrapping_add(1);

        match telemetry {
            Telemetry::Chlorinator(update) => {
                let c = &mut self.chlorinator;
                match update {
                    ChlorinatorTelemetry::Version(version) => c.version = Some(version.clone()),
                    ChlorinatorTelemetry::WaterTemperature(t) => c.water_temperature = Some(*t),
                    ChlorinatorTelemetry::Status {
                        salt_ppm,
                        errors,
                        last_set_percent,
                    } => {
                        c.salt_ppm = Some(*salt_ppm);
                        c.errors = Some(*errors);
                        c.last_set_percent = Some(*last_set_percent);
                    }
                    ChlorinatorTelemetry::Takeover { status } => c.takeover_status = Some(*status),
                }
            }
            Telemetry::Pump(status) => {
                let p = &mut self.pump;
                if status.running.is_some() {
                    p.running = status.running;
                }
                if status.program.is_some() {
                    p.program = status.program;
                }
                p.power = Some(status.power);
                p.rpm = Some(status.rpm);
                p.flow = Some(status.flow);
                p.pressure = Some(status.pressure);
                p.time_remaining = Some(status.time_remaining);
                p.clock = Some(status.clock);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pump_status(running: Option<bool>, program: Option<Program>) -> PumpStatus {
        PumpStatus {
            running,
            program,
            power: 300,
            rpm: 2000,
            flow: 10.0,
            pressure: 2.0,
            time_remaining: 90,
            clock: 785,
        }
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = 0;
        let mut sink = |_: &Telemetry| seen += 1;
        sink.publish(&Telemetry::Chlorinator(
            ChlorinatorTelemetry::WaterTemperature(70),
        ));
        sink.publish(&Telemetry::Pump(pump_status(Some(true), None)));
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_snapshot_records_chlorinator_fields() {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.publish(&Telemetry::Chlorinator(ChlorinatorTelemetry::Status {
            salt_ppm: 3000,
            errors: ErrorFlags(0b0000_0010),
            last_set_percent: 40,
        }));
        snapshot.publish(&Telemetry::Chlorinator(
            ChlorinatorTelemetry::WaterTemperature(72),
        ));

        let c = &snapshot.chlorinator;
        assert_eq!(c.salt_ppm, Some(3000));
        assert_eq!(c.errors, Some(ErrorFlags(0b0000_0010)));
        assert_eq!(c.last_set_percent, Some(40));
        assert_eq!(c.water_temperature, Some(72));
        assert_eq!(c.version, None);
        assert_eq!(snapshot.updates, 2);
    }

    #[test]
    fn test_snapshot_keeps_pump_fields_on_unknown_codes() {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.publish(&Telemetry::Pump(pump_status(
            Some(true),
            Some(Program::Local2),
        )));
        let mut later = pump_status(None, None);
        later.rpm = 1500;
        snapshot.publish(&Telemetry::Pump(later));

        assert_eq!(snapshot.pump.running, Some(true));
        assert_eq!(snapshot.pump.program, Some(Program::Local2));
        assert_eq!(snapshot.pump.rpm, Some(1500));
    }
}
