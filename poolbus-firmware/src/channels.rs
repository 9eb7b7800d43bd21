//! Inter-task communication
//!
//! The receive task pushes raw bytes into a pipe; the bus task drains it
//! without waiting on every tick.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;

/// Pipe capacity in bytes, several full frames
pub const RX_PIPE_SIZE: usize = 256;

/// Bytes received from the RS-485 line, in arrival order
pub static RX_PIPE: Pipe<CriticalSectionRawMutex, RX_PIPE_SIZE> = Pipe::new();
