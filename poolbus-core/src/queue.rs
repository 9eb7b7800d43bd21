//! Transmit queue shared by both protocols
//!
//! One FIFO holds every outbound frame in the order it was requested. The
//! arbiter only ever looks at the front entry, so a chlorinator command
//! waiting for its reply holds back everything queued after it.

use heapless::Deque;

use poolbus_protocol::{Protocol, TxFrame};

use crate::error::CommandError;

/// Maximum queued commands
pub const QUEUE_CAPACITY: usize = 16;

/// An outbound frame waiting for the bus
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingCommand {
    /// Request/response command, resent until answered or exhausted
    Chlorinator {
        /// Retransmissions allowed after the first send
        retries: u8,
        /// Times sent so far, wide enough for `retries + 1`
        attempts: u16,
        frame: TxFrame,
    },
    /// Fire-and-forget command, removed once written
    Pump { frame: TxFrame },
}

impl PendingCommand {
    /// New chlorinator entry that has not been sent yet
    pub fn chlorinator(frame: TxFrame, retries: u8) -> Self {
        PendingCommand::Chlorinator {
            retries,
            attempts: 0,
            frame,
        }
    }

    pub fn pump(frame: TxFrame) -> Self {
        PendingCommand::Pump { frame }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            PendingCommand::Chlorinator { .. } => Protocol::Chlorinator,
            PendingCommand::Pump { .. } => Protocol::Pump,
        }
    }

    /// Wire bytes
    pub fn frame(&self) -> &[u8] {
        match self {
            PendingCommand::Chlorinator { frame, .. } | PendingCommand::Pump { frame } => frame,
        }
    }
}

/// Bounded FIFO of pending commands
#[derive(Debug, Clone, Default)]
pub struct TransmitQueue {
    entries: Deque<PendingCommand, QUEUE_CAPACITY>,
}

impl TransmitQueue {
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
        }
    }

    /// Append to the back of the queue
    pub fn push(&mut self, command: PendingCommand) -> Result<(), CommandError> {
        self.entries.push_back(command).map_err(|dropped| {
            warn!(
                "Send queue full, dropping {} command: {=[u8]:02X}",
                dropped.protocol(),
                dropped.frame()
            );
            CommandError::QueueFull
        })
    }

    pub fn front(&self) -> Option<&PendingCommand> {
        self.entries.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut PendingCommand> {
        self.entries.front_mut()
    }

    pub fn pop_front(&mut self) -> Option<PendingCommand> {
        self.entries.pop_front()
    }

    /// Remove the front entry if it is a chlorinator command
    ///
    /// Called for every completed chlorinator frame. The reply is not
    /// matched against the command it answers.
    pub fn ack_chlorinator(&mut self) -> Option<PendingCommand> {
        match self.entries.front() {
            Some(PendingCommand::Chlorinator { .. }) => self.entries.pop_front(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Entries that can still be pushed
    pub fn available(&self) -> usize {
        QUEUE_CAPACITY - self.entries.len()
    }

    /// Entries from front to back
    pub fn iter(&self) -> impl Iterator<Item = &PendingCommand> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
