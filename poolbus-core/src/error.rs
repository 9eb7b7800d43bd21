//! Engine error types

use poolbus_protocol::FrameError;

/// A command could not be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Transmit queue is at capacity
    QueueFull,
    /// Frame could not be encoded
    Frame(FrameError),
}

impl From<FrameError> for CommandError {
    fn from(e: FrameError) -> Self {
        CommandError::Frame(e)
    }
}

/// Serial line failure during a tick
///
/// Carries the receiver and transmitter error types of the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError<R, W> {
    /// Reading received bytes failed
    Read(R),
    /// Writing a frame failed
    Write(W),
}
