//! Shared frame types for both bus protocols.
//!
//! Receive-side parsing is incremental: the framer appends one byte to the
//! receive buffer and asks the protocol parser for a [`ParseStatus`].

use heapless::Vec;

/// Receive buffer ceiling. A frame still incomplete at this length is
/// treated as line corruption.
pub const MAX_FRAME_SIZE: usize = 64;

/// Largest outbound frame either encoder produces
pub const MAX_TX_FRAME_SIZE: usize = 24;

/// Bytes of a frame being received
pub type ReceiveBuffer = Vec<u8, MAX_FRAME_SIZE>;

/// Encoded bytes of an outbound command
pub type TxFrame = Vec<u8, MAX_TX_FRAME_SIZE>;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// A fixed header byte did not match the protocol
    InvalidHeader,
    /// Receive buffer reached [`MAX_FRAME_SIZE`] without a complete frame
    Overflow,
    /// Pump frame checksum mismatch
    InvalidChecksum { expected: u16, received: u16 },
    /// Encoded frame failed its own checksum verification
    SelfCheckFailed,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// Result of feeding one more byte to a protocol parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseStatus {
    /// More bytes are needed
    Building,
    /// The buffer holds one complete, valid frame
    Complete,
    /// The buffer can never become a valid frame
    Invalid(FrameError),
}

/// Protocol selected by the first byte of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    /// IntelliChlor salt chlorinator (`0x10 0x02 ... 0x10 0x03`)
    Chlorinator,
    /// IntelliFlo variable speed pump (`0xFF 0x00 0xFF 0xA5 ...`)
    Pump,
}

impl Protocol {
    /// Classify the leading byte of a new frame
    pub fn from_lead_byte(byte: u8) -> Option<Self> {
        match byte {
            crate::chlorinator::FRAME_HEADER_0 => Some(Protocol::Chlorinator),
            crate::pump::PREAMBLE_0 => Some(Protocol::Pump),
            _ => None,
        }
    }
}

/// A complete frame removed from the receive buffer
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    /// Protocol fixed by the first byte
    pub protocol: Protocol,
    /// Raw frame bytes as received, leading marker included
    pub bytes: ReceiveBuffer,
}

impl Frame {
    /// Bytes handed to the protocol decoder
    ///
    /// Pump frames drop their `FF 00 FF` preamble; chlorinator frames are
    /// decoded as received.
    pub fn body(&self) -> &[u8] {
        match self.protocol {
            Protocol::Chlorinator => self.bytes.as_slice(),
            Protocol::Pump => self.bytes.get(crate::pump::PREAMBLE.len()..).unwrap_or(&[]),
        }
    }
}

/// Append `bytes` to an outbound frame
pub(crate) fn extend(frame: &mut TxFrame, bytes: &[u8]) -> Result<(), FrameError> {
    frame
        .extend_from_slice(bytes)
        .map_err(|_| FrameError::BufferTooSmall)
}
