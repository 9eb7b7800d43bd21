//! IntelliFlo variable speed pump protocol.
//!
//! Frame format:
//! ```text
//! ┌──────────┬──────┬─────┬──────┬─────┬─────┬────┬───────────┬──────────┐
//! │ FF 00 FF │ 0xA5 │ VER │ DEST │ SRC │ CMD │ N  │ PAYLOAD   │ CHECKSUM │
//! │ preamble │ 1B   │ 1B  │ 1B   │ 1B  │ 1B  │ 1B │ N bytes   │ 2B (BE)  │
//! └──────────┴──────┴─────┴──────┴─────┴─────┴────┴───────────┴──────────┘
//! ```
//!
//! The checksum is the 16-bit sum of every byte from `0xA5` through the last
//! payload byte. Decoders work on the frame with its preamble stripped, so
//! `0xA5` sits at message offset 0.

use heapless::Vec;

use crate::frame::{extend, FrameError, ParseStatus, TxFrame};

/// First preamble byte, which also classifies a new frame
pub const PREAMBLE_0: u8 = 0xFF;
/// Line preamble preceding every frame
pub const PREAMBLE: [u8; 3] = [PREAMBLE_0, 0x00, 0xFF];
/// Start-of-message byte following the preamble
pub const MESSAGE_START: u8 = 0xA5;

/// Fixed leading bytes, checked one by one as they arrive
const LEADER: [u8; 4] = [PREAMBLE[0], PREAMBLE[1], PREAMBLE[2], MESSAGE_START];
/// Offset of the payload length byte in a raw frame
const LENGTH_OFFSET: usize = 8;
/// Bytes in a raw frame besides the payload, less one: index of the last
/// checksum byte is `n + LAST_BYTE_BASE`
const LAST_BYTE_BASE: usize = 10;

/// Pump bus address
pub const ADDR_PUMP: u8 = 0x60;
/// Controller bus address
pub const ADDR_CONTROLLER: u8 = 0x10;

// Pump actions
const ACTION_REMOTE_WRITE: u8 = 0x01;
const ACTION_SET_CLOCK: u8 = 0x03;
const ACTION_CONTROL: u8 = 0x04;
const ACTION_PROGRAM: u8 = 0x05;
const ACTION_POWER: u8 = 0x06;
pub const ACTION_STATUS: u8 = 0x07;
const ACTION_FLOW: u8 = 0x09;

const POWER_ON: u8 = 0x0A;
const POWER_OFF: u8 = 0x04;
const CONTROL_LOCAL: u8 = 0x00;
const CONTROL_REMOTE: u8 = 0xFF;

/// Largest message any command builder produces
pub const MAX_MESSAGE_SIZE: usize = 10;

/// Outbound message bytes, without preamble or checksum
pub type Message = Vec<u8, MAX_MESSAGE_SIZE>;

/// Check whether `buf` holds a complete, checksummed pump frame
///
/// Header bytes fail fast: any mismatch in the first four positions aborts
/// the frame as soon as the byte arrives.
pub fn parse(buf: &[u8]) -> ParseStatus {
    let Some(at) = buf.len().checked_sub(1) else {
        return ParseStatus::Building;
    };

    if at < LEADER.len() {
        return if buf[at] == LEADER[at] {
            ParseStatus::Building
        } else {
            warn!("IF invalid header byte {=u8:02X} at {}", buf[at], at);
            ParseStatus::Invalid(FrameError::InvalidHeader)
        };
    }

    if at <= LENGTH_OFFSET {
        return ParseStatus::Building;
    }

    let payload_len = buf[LENGTH_OFFSET] as usize;
    let last = payload_len + LAST_BYTE_BASE;
    if at < last {
        return ParseStatus::Building;
    }

    let expected = checksum(&buf[PREAMBLE.len()..last - 1]);
    let received = u16::from_be_bytes([buf[last - 1], buf[last]]);
    if expected != received {
        warn!(
            "IF checksum mismatch: expected {=u16:04X}, received {=u16:04X}",
            expected, received
        );
        return ParseStatus::Invalid(FrameError::InvalidChecksum { expected, received });
    }

    ParseStatus::Complete
}

/// 16-bit wrapping sum of message bytes
pub fn checksum(message: &[u8]) -> u16 {
    message
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
}

/// Wrap a message into a frame and verify the result before handing it out
pub fn encode(message: &[u8]) -> Result<TxFrame, FrameError> {
    let sum = checksum(message);
    let mut frame = TxFrame::new();
    extend(&mut frame, &PREAMBLE)?;
    extend(&mut frame, message)?;
    extend(&mut frame, &sum.to_be_bytes())?;

    if !verify(&frame) {
        warn!("IF asked to queue malformed packet: {=[u8]:02X}", frame.as_slice());
        return Err(FrameError::SelfCheckFailed);
    }
    Ok(frame)
}

/// Recompute the checksum of an assembled outbound frame
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() < PREAMBLE.len() + 2 {
        return false;
    }
    let split = frame.len() - 2;
    let stored = u16::from_be_bytes([frame[split], frame[split + 1]]);
    checksum(&frame[PREAMBLE.len()..split]) == stored
}

/// Pump program reported in status frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Program {
    None,
    Local1,
    Local2,
    Local3,
    Local4,
    External1,
    External2,
    External3,
    External4,
    TimeOut,
    Priming,
    QuickClean,
}

impl Program {
    /// Map a status frame program code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Program::None),
            0x01 => Some(Program::Local1),
            0x02 => Some(Program::Local2),
            0x03 => Some(Program::Local3),
            0x04 => Some(Program::Local4),
            0x09 => Some(Program::External1),
            0x0A => Some(Program::External2),
            0x0B => Some(Program::External3),
            0x0C => Some(Program::External4),
            0x0D => Some(Program::QuickClean),
            0x0E => Some(Program::TimeOut),
            0x11 => Some(Program::Priming),
            _ => None,
        }
    }

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            Program::None => "",
            Program::Local1 => "Local 1",
            Program::Local2 => "Local 2",
            Program::Local3 => "Local 3",
            Program::Local4 => "Local 4",
            Program::External1 => "External 1",
            Program::External2 => "External 2",
            Program::External3 => "External 3",
            Program::External4 => "External 4",
            Program::TimeOut => "Time Out",
            Program::Priming => "Priming",
            Program::QuickClean => "Quick Clean",
        }
    }
}

/// Decoded pump status broadcast
///
/// `running` and `program` are `None` when the pump reported a code this
/// decoder does not know; the previously published value should stand.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PumpStatus {
    pub running: Option<bool>,
    pub program: Option<Program>,
    /// Watts
    pub power: u16,
    pub rpm: u16,
    /// m³/h
    pub flow: f32,
    /// bar
    pub pressure: f32,
    /// Minutes
    pub time_remaining: u16,
    /// Minutes since midnight
    pub clock: u16,
}

/// Shortest status message carrying every field
const STATUS_MESSAGE_LEN: usize = 21;

impl PumpStatus {
    /// Decode a message (preamble stripped) if it is a pump status reply
    pub fn from_message(message: &[u8]) -> Option<Self> {
        if message.get(3) != Some(&ADDR_PUMP) || message.get(4) != Some(&ACTION_STATUS) {
            return None;
        }
        if message.len() < STATUS_MESSAGE_LEN {
            warn!("IF status message too short: {} bytes", message.len());
            return None;
        }

        let running = match message[6] {
            POWER_ON => Some(true),
            POWER_OFF => Some(false),
            other => {
                warn!("IF received unknown running value {=u8:02X}", other);
                None
            }
        };

        let program = Program::from_code(message[7]);
        if program.is_none() {
            warn!("IF received unknown program value {=u8:02X}", message[7]);
        }

        Some(Self {
            running,
            program,
            power: u16::from_be_bytes([message[9], message[10]]),
            rpm: u16::from_be_bytes([message[11], message[12]]),
            flow: message[13] as f32 * 0.227,
            pressure: message[14] as f32 / 14.504,
            time_remaining: message[17] as u16 * 60 + message[18] as u16,
            clock: message[19] as u16 * 60 + message[20] as u16,
        })
    }
}

/// Commands the controller can send to the pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Ask for a status broadcast
    RequestStatus,
    /// Hand control back to the pump's own panel
    LocalControl,
    /// Take control from the pump's panel
    RemoteControl,
    Run,
    Stop,
    /// Run local program 0-3 (pump programs 1-4)
    LocalProgram(u8),
    /// Run external program 1-4
    ExternalProgram(u8),
    /// Store a speed value for an external program
    SaveProgramValue { program: u8, value: u16 },
    SetRpm(u16),
    /// Flow target in tenths of m³/h
    SetFlow(u8),
    SetClock { hour: u8, minute: u8 },
}

impl Command {
    /// Message bytes, without preamble or checksum
    pub fn message(&self) -> Message {
        let mut message = Message::new();
        // Head plus the longest body is exactly MAX_MESSAGE_SIZE
        let _ = message.extend_from_slice(&[MESSAGE_START, 0x00, ADDR_PUMP, ADDR_CONTROLLER]);
        let _ = match *self {
            Command::RequestStatus => message.extend_from_slice(&[ACTION_STATUS, 0x00]),
            Command::LocalControl => {
                message.extend_from_slice(&[ACTION_CONTROL, 0x01, CONTROL_LOCAL])
            }
            Command::RemoteControl => {
                message.extend_from_slice(&[ACTION_CONTROL, 0x01, CONTROL_REMOTE])
            }
            Command::Run => message.extend_from_slice(&[ACTION_POWER, 0x01, POWER_ON]),
            Command::Stop => message.extend_from_slice(&[ACTION_POWER, 0x01, POWER_OFF]),
            Command::LocalProgram(program) => {
                message.extend_from_slice(&[ACTION_PROGRAM, 0x01, program.wrapping_add(1)])
            }
            Command::ExternalProgram(program) => message.extend_from_slice(&[
                ACTION_REMOTE_WRITE,
                0x04,
                0x03,
                0x21,
                0x00,
                program.wrapping_mul(8),
            ]),
            Command::SaveProgramValue { program, value } => {
                let [hi, lo] = value.to_be_bytes();
                message.extend_from_slice(&[
                    ACTION_REMOTE_WRITE,
                    0x04,
                    0x03,
                    0x26u8.wrapping_add(program),
                    hi,
                    lo,
                ])
            }
            Command::SetRpm(rpm) => {
                let [hi, lo] = rpm.to_be_bytes();
                message.extend_from_slice(&[ACTION_REMOTE_WRITE, 0x04, 0x02, 0xC4, hi, lo])
            }
            Command::SetFlow(flow) => {
                message.extend_from_slice(&[ACTION_FLOW, 0x04, 0x02, 0xC4, 0x00, flow])
            }
            Command::SetClock { hour, minute } => {
                message.extend_from_slice(&[ACTION_SET_CLOCK, 0x02, hour, minute])
            }
        };
        message
    }

    /// Encode into a complete, self-checked wire frame
    pub fn encode(&self) -> Result<TxFrame, FrameError> {
        encode(&self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a raw frame with a valid checksum around `message`
    fn frame(message: &[u8]) -> Vec<u8, 64> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&PREAMBLE).unwrap();
        bytes.extend_from_slice(message).unwrap();
        bytes.extend_from_slice(&checksum(message).to_be_bytes()).unwrap();
        bytes
    }

    fn status_message(running: u8, program: u8) -> [u8; 21] {
        [
            0xA5, 0x00, 0x10, 0x60, 0x07, 0x0F, // header, 15 payload bytes
            running, program, 0x02, // running, program, mode
            0x01, 0x2C, // 300 W
            0x07, 0xD0, // 2000 rpm
            0x2C, // flow 44
            0x1D, // pressure 29
            0x00, 0x00, // unused
            0x01, 0x1E, // 1h30 remaining
            0x0D, 0x05, // 13:05
        ]
    }

    fn feed(bytes: &[u8]) -> ParseStatus {
        let mut status = ParseStatus::Building;
        for len in 1..=bytes.len() {
            status = parse(&bytes[..len]);
            if status != ParseStatus::Building {
                assert_eq!(len, bytes.len(), "frame ended early at {}", len);
            }
        }
        status
    }

    #[test]
    fn test_encode_status_request() {
        let frame = Command::RequestStatus.encode().unwrap();
        // 0xA5 + 0x60 + 0x10 + 0x07 = 0x011C
        assert_eq!(
            frame.as_slice(),
            &[0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x60, 0x10, 0x07, 0x00, 0x01, 0x1C]
        );
    }

    #[test]
    fn test_command_messages() {
        assert_eq!(
            Command::LocalControl.message().as_slice(),
            &[0xA5, 0x00, 0x60, 0x10, 0x04, 0x01, 0x00]
        );
        assert_eq!(
            Command::RemoteControl.message().as_slice(),
            &[0xA5, 0x00, 0x60, 0x10, 0x04, 0x01, 0xFF]
        );
        assert_eq!(
            Command::Run.message().as_slice(),
            &[0xA5, 0x00, 0x60, 0x10, 0x06, 0x01, 0x0A]
        );
        assert_eq!(
            Command::Stop.message().as_slice(),
            &[0xA5, 0x00, 0x60, 0x10, 0x06, 0x01, 0x04]
        );
        assert_eq!(
            Command::LocalProgram(2).message().as_slice(),
            &[0xA5, 0x00, 0x60, 0x10, 0x05, 0x01, 0x03]
        );
        assert_eq!(
            Command::ExternalProgram(3).message().as_slice(),
            &[0xA5, 0x00, 0x60, 0x10, 0x01, 0x04, 0x03, 0x21, 0x00, 0x18]
        );
        assert_eq!(
            Command::SaveProgramValue { program: 1, value: 1750 }.message().as_slice(),
            &[0xA5, 0x00, 0x60, 0x10, 0x01, 0x04, 0x03, 0x27, 0x06, 0xD6]
        );
        assert_eq!(
            Command::SetRpm(2400).message().as_slice(),
            &[0xA5, 0x00, 0x60, 0x10, 0x01, 0x04, 0x02, 0xC4, 0x09, 0x60]
        );
        assert_eq!(
            Command::SetFlow(35).message().as_slice(),
            &[0xA5, 0x00, 0x60, 0x10, 0x09, 0x04, 0x02, 0xC4, 0x00, 35]
        );
        assert_eq!(
            Command::SetClock { hour: 14, minute: 30 }.message().as_slice(),
            &[0xA5, 0x00, 0x60, 0x10, 0x03, 0x02, 14, 30]
        );
    }

    #[test]
    fn test_every_command_passes_self_check() {
        let commands = [
            Command::RequestStatus,
            Command::LocalControl,
            Command::RemoteControl,
            Command::Run,
            Command::Stop,
            Command::LocalProgram(0),
            Command::ExternalProgram(4),
            Command::SaveProgramValue { program: 3, value: 0xFFFF },
            Command::SetRpm(3450),
            Command::SetFlow(255),
            Command::SetClock { hour: 23, minute: 59 },
        ];
        for command in commands {
            let frame = command.encode().unwrap();
            assert!(verify(&frame));
        }
    }

    #[test]
    fn test_verify_rejects_corruption() {
        let mut frame = Command::Run.encode().unwrap();
        frame[5] ^= 0x01;
        assert!(!verify(&frame));
        assert!(!verify(&[0xFF, 0x00]));
    }

    #[test]
    fn test_parse_valid_status_frame() {
        let bytes = frame(&status_message(0x0A, 0x01));
        assert_eq!(bytes.len(), 15 + 11);
        assert_eq!(feed(&bytes), ParseStatus::Complete);
    }

    #[test]
    fn test_parse_checksum_mismatch() {
        let mut bytes = frame(&status_message(0x0A, 0x01));
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            feed(&bytes),
            ParseStatus::Invalid(FrameError::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn test_parse_header_fails_fast() {
        assert_eq!(parse(&[0xFF]), ParseStatus::Building);
        assert_eq!(
            parse(&[0xFF, 0x01]),
            ParseStatus::Invalid(FrameError::InvalidHeader)
        );
        assert_eq!(
            parse(&[0xFF, 0x00, 0x00]),
            ParseStatus::Invalid(FrameError::InvalidHeader)
        );
        assert_eq!(
            parse(&[0xFF, 0x00, 0xFF, 0xA4]),
            ParseStatus::Invalid(FrameError::InvalidHeader)
        );
        // Offsets 4..=8 are not checked
        assert_eq!(
            parse(&[0xFF, 0x00, 0xFF, 0xA5, 0xEE, 0xEE, 0xEE, 0xEE, 0x00]),
            ParseStatus::Building
        );
    }

    #[test]
    fn test_decode_status_running() {
        let status = PumpStatus::from_message(&status_message(0x0A, 0x01)).unwrap();
        assert_eq!(status.running, Some(true));
        assert_eq!(status.program, Some(Program::Local1));
        assert_eq!(status.power, 300);
        assert_eq!(status.rpm, 2000);
        assert!((status.flow - 44.0 * 0.227).abs() < 1e-4);
        assert!((status.pressure - 29.0 / 14.504).abs() < 1e-4);
        assert_eq!(status.time_remaining, 90);
        assert_eq!(status.clock, 13 * 60 + 5);
    }

    #[test]
    fn test_decode_status_stopped() {
        let status = PumpStatus::from_message(&status_message(0x04, 0x00)).unwrap();
        assert_eq!(status.running, Some(false));
        assert_eq!(status.program, Some(Program::None));
    }

    #[test]
    fn test_decode_status_unknown_codes() {
        let status = PumpStatus::from_message(&status_message(0x0B, 0x42)).unwrap();
        assert_eq!(status.running, None);
        assert_eq!(status.program, None);
        // Remaining fields still decode
        assert_eq!(status.rpm, 2000);
    }

    #[test]
    fn test_decode_ignores_other_messages() {
        // Reply to a remote control request
        let ack = [0xA5, 0x00, 0x10, 0x60, 0x04, 0x01, 0xFF];
        assert!(PumpStatus::from_message(&ack).is_none());
    }

    #[test]
    fn test_decode_short_status_is_ignored() {
        let message = status_message(0x0A, 0x01);
        assert!(PumpStatus::from_message(&message[..12]).is_none());
    }

    #[test]
    fn test_program_labels() {
        assert_eq!(Program::from_code(0x0E).map(Program::label), Some("Time Out"));
        assert_eq!(Program::from_code(0x11).map(Program::label), Some("Priming"));
        assert_eq!(Program::from_code(0x0D).map(Program::label), Some("Quick Clean"));
        assert_eq!(Program::from_code(0x0C).map(Program::label), Some("External 4"));
        assert_eq!(Program::from_code(0x05), None);
    }
}
