//! Configuration types
//!
//! Every field has a default matching the timings the pool equipment was
//! observed to tolerate. A board only needs to override what differs.

pub mod toml;

use poolbus_hal::UartConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::time::Duration;

/// Bus-quiet thresholds; the gate opens only when all three are exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingConfig {
    /// Since the last chlorinator command (ms)
    pub command_quiet_ms: u32,
    /// Since the last transmission of either protocol (ms)
    pub transmit_quiet_ms: u32,
    /// Since the last received byte (ms)
    pub receive_quiet_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            command_quiet_ms: 100,
            transmit_quiet_ms: 150,
            receive_quiet_ms: 100,
        }
    }
}

impl TimingConfig {
    pub fn command_quiet(&self) -> Duration {
        Duration::from_millis(self.command_quiet_ms)
    }

    pub fn transmit_quiet(&self) -> Duration {
        Duration::from_millis(self.transmit_quiet_ms)
    }

    pub fn receive_quiet(&self) -> Duration {
        Duration::from_millis(self.receive_quiet_ms)
    }
}

/// Chlorinator control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChlorinatorConfig {
    /// Start in takeover mode
    pub takeover: bool,
    /// Initial generator output, 0-100 %
    pub percent: u8,
    /// Minimum time between refreshes (ms)
    pub refresh_interval_ms: u32,
}

impl Default for ChlorinatorConfig {
    fn default() -> Self {
        Self {
            takeover: false,
            percent: 0,
            refresh_interval_ms: 25_000,
        }
    }
}

/// Pump polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PumpConfig {
    /// Delay from an update to the pump poll (ms)
    pub poll_delay_ms: u32,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self { poll_delay_ms: 500 }
    }
}

/// Update cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PollingConfig {
    /// Interval between `update` calls (ms)
    pub update_interval_ms: u32,
    /// Interval between ticks (ms)
    pub tick_interval_ms: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 30_000,
            tick_interval_ms: 10,
        }
    }
}

/// Complete bus configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfig {
    pub serial: UartConfig,
    pub timing: TimingConfig,
    pub chlorinator: ChlorinatorConfig,
    pub pump: PumpConfig,
    pub polling: PollingConfig,
}

impl BusConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
