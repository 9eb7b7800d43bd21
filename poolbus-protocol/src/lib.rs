//! Pentair RS-485 wire protocols
//!
//! An IntelliChlor salt chlorinator and an IntelliFlo pump share one
//! half-duplex line. Their frames never overlap, and the first byte of each
//! frame says which protocol it belongs to:
//!
//! ```text
//! IntelliChlor   10 02 │ command + payload │ checksum │ 10 03
//! IntelliFlo     FF 00 FF │ A5 ver dst src cmd n │ payload │ sum-hi sum-lo
//! ```
//!
//! [`Framer`] accumulates received bytes one at a time and hands each
//! buffer to the matching parser. The [`chlorinator`] and [`pump`] modules
//! decode completed frames and build outbound command frames.

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod chlorinator;
pub mod frame;
pub mod framer;
pub mod pump;

pub use frame::{Frame, FrameError, ParseStatus, Protocol, ReceiveBuffer, TxFrame, MAX_FRAME_SIZE};
pub use framer::{FrameEvent, Framer};
