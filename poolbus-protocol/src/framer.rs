//! Byte framer and protocol dispatcher
//!
//! Both devices share one half-duplex line, so only one frame is ever in
//! flight. The first byte of a frame fixes which parser judges every byte
//! after it:
//!
//! ```text
//!            0x10 / 0xFF                     Complete / Invalid / ceiling
//!   Empty ───────────────▶ Accumulating(p) ──────────────────────────────▶ Empty
//!     │ other byte: noise        │ Building
//!     └──────◀───────────        └──────◀───────
//! ```

use core::mem;

use crate::chlorinator;
use crate::frame::{Frame, FrameError, ParseStatus, Protocol, ReceiveBuffer, MAX_FRAME_SIZE};
use crate::pump;

/// Outcome of feeding one byte to the framer
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameEvent {
    /// Byte arrived between frames and was not a start marker
    Noise(u8),
    /// Byte was added to the frame in progress
    Building,
    /// A frame completed and the buffer is empty again
    Complete(Frame),
    /// The frame in progress was discarded and the buffer is empty again
    Rejected(FrameError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Empty,
    Accumulating(Protocol),
}

/// Incremental framer for the shared bus
#[derive(Debug, Clone)]
pub struct Framer {
    state: State,
    buffer: ReceiveBuffer,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self {
            state: State::Empty,
            buffer: ReceiveBuffer::new(),
        }
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = State::Empty;
        self.buffer.clear();
    }

    /// Protocol of the frame in progress, if any
    pub fn in_progress(&self) -> Option<Protocol> {
        match self.state {
            State::Empty => None,
            State::Accumulating(protocol) => Some(protocol),
        }
    }

    /// Bytes accumulated for the frame in progress
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Feed a single byte, in arrival order
    pub fn push(&mut self, byte: u8) -> FrameEvent {
        let protocol = match self.state {
            State::Empty => {
                return match Protocol::from_lead_byte(byte) {
                    Some(protocol) => {
                        trace!("Starting new packet with byte {=u8:02X}", byte);
                        // Buffer is empty here, the push cannot fail
                        let _ = self.buffer.push(byte);
                        self.state = State::Accumulating(protocol);
                        FrameEvent::Building
                    }
                    None => {
                        trace!("Ignoring unexpected byte {=u8:02X}", byte);
                        FrameEvent::Noise(byte)
                    }
                };
            }
            State::Accumulating(protocol) => protocol,
        };

        if self.buffer.push(byte).is_err() {
            return self.reject(FrameError::Overflow);
        }

        let status = match protocol {
            Protocol::Chlorinator => chlorinator::parse(&self.buffer),
            Protocol::Pump => pump::parse(&self.buffer),
        };

        match status {
            ParseStatus::Building if self.buffer.len() >= MAX_FRAME_SIZE => {
                warn!("Clearing {} buffered bytes, no frame end", self.buffer.len());
                self.reject(FrameError::Overflow)
            }
            ParseStatus::Building => FrameEvent::Building,
            ParseStatus::Complete => {
                let bytes = mem::take(&mut self.buffer);
                self.state = State::Empty;
                info!("{} package received: {=[u8]:02X}", protocol, bytes.as_slice());
                FrameEvent::Complete(Frame { protocol, bytes })
            }
            ParseStatus::Invalid(error) => self.reject(error),
        }
    }

    fn reject(&mut self, error: FrameError) -> FrameEvent {
        debug!("Frame rejected: {}", error);
        self.reset();
        FrameEvent::Rejected(error)
    }
}
