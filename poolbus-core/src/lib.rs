//! Board-agnostic bus engine
//!
//! Everything between the UART and the telemetry consumer that does not
//! depend on a specific chip:
//!
//! - Wrap-safe millisecond time
//! - Transmit queue shared by both protocols
//! - Transmit arbiter with bus-quiet gating and chlorinator retries
//! - Polling schedule
//! - Telemetry sink
//! - Configuration types and parser
//!
//! [`BusController`] ties these together and is driven by a periodic tick.

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod arbiter;
pub mod config;
pub mod controller;
pub mod error;
pub mod port;
pub mod queue;
pub mod schedule;
pub mod telemetry;
pub mod time;

pub use controller::BusController;
pub use error::{BusError, CommandError};
pub use port::SerialPort;
pub use telemetry::{Telemetry, TelemetrySink, TelemetrySnapshot};
pub use time::{Duration, Instant};
