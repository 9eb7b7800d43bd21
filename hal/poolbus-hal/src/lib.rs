//! Poolbus Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the bus engine is written against,
//! so the same protocol code runs on the RP2040 firmware and under host tests
//! with mock peripherals.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  poolbus-core (controller, arbiter)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  poolbus-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ firmware      │       │ test mocks    │
//! │ (embassy-rp)  │       │               │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`] - RS-485 transmit enable
//! - [`uart::UartTx`], [`uart::UartRx`] - Half-duplex serial line

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use gpio::{NoPin, OutputPin};
pub use uart::{UartConfig, UartRx, UartTx};
