//! IntelliChlor salt chlorinator protocol.
//!
//! Frame format:
//! ```text
//! ┌──────┬──────┬─────────────────────┬──────────┬──────┬──────┐
//! │ 0x10 │ 0x02 │ COMMAND + PAYLOAD   │ CHECKSUM │ 0x10 │ 0x03 │
//! └──────┴──────┴─────────────────────┴──────────┴──────┴──────┘
//! ```
//!
//! The checksum is the low byte of the sum of the header and command bytes.
//! It is written on send but never checked on receive: the chlorinator's
//! replies are accepted on framing alone.

use heapless::{String, Vec};

use crate::frame::{extend, FrameError, ParseStatus, TxFrame, MAX_FRAME_SIZE};

/// First header byte (DLE)
pub const FRAME_HEADER_0: u8 = 0x10;
/// Second header byte (STX)
pub const FRAME_HEADER_1: u8 = 0x02;
/// Frame header
pub const FRAME_HEADER: [u8; 2] = [FRAME_HEADER_0, FRAME_HEADER_1];
/// Frame footer (DLE ETX)
pub const FRAME_FOOTER: [u8; 2] = [0x10, 0x03];

/// Destination byte of controller-originated commands
const DEST_CHLORINATOR: u8 = 0x50;

// Command codes (controller → chlorinator)
const CMD_TAKEOVER: u8 = 0x00;
const CMD_SET_PERCENT: u8 = 0x11;
const CMD_GET_VERSION: u8 = 0x14;
const CMD_GET_TEMPERATURE: u8 = 0x15;

// Response codes at offset 3 (chlorinator → controller)
pub const RESP_TAKEOVER: u8 = 0x01;
// NOTE: 0x03 doubles as the footer byte and does not pair with
// CMD_GET_VERSION (0x14). Dispatch kept as the original component does it.
pub const RESP_VERSION: u8 = 0x03;
pub const RESP_STATUS: u8 = 0x12;
pub const RESP_TEMPERATURE: u8 = 0x16;

/// Salt reading unit, in ppm
const SALT_PPM_PER_UNIT: u16 = 50;

/// Longest version string a 64 byte frame can carry, two UTF-8 bytes per
/// received byte
pub const MAX_VERSION_LEN: usize = 2 * MAX_FRAME_SIZE;

/// Decoded firmware version text
pub type Version = String<MAX_VERSION_LEN>;

/// Check whether `buf` holds a complete chlorinator frame
///
/// A bad second header byte is tolerated until the receive ceiling, in case
/// the line resynchronises.
pub fn parse(buf: &[u8]) -> ParseStatus {
    if buf.len() < 2 {
        return ParseStatus::Building;
    }

    if buf[0] != FRAME_HEADER_0 {
        warn!("IC invalid header: {=u8:02X}", buf[0]);
        return ParseStatus::Invalid(FrameError::InvalidHeader);
    }

    if buf[1] != FRAME_HEADER_1 {
        if buf.len() >= MAX_FRAME_SIZE {
            warn!("IC buffer overflow after bad header");
            return ParseStatus::Invalid(FrameError::Overflow);
        }
        return ParseStatus::Building;
    }

    if buf.len() >= 4 && buf[2..].windows(2).any(|w| w == &FRAME_FOOTER[..]) {
        return ParseStatus::Complete;
    }

    if buf.len() >= MAX_FRAME_SIZE {
        warn!("IC clearing buffer after error: {=[u8]:02X}", buf);
        return ParseStatus::Invalid(FrameError::Overflow);
    }

    ParseStatus::Building
}

/// Chlorinator fault bits, in error field bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    NoFlow,
    LowSalt,
    HighSalt,
    Clean,
    HighCurrent,
    LowVolts,
    LowTemperature,
    CheckPcb,
}

impl Fault {
    /// All faults, indexed by bit position
    pub const ALL: [Fault; 8] = [
        Fault::NoFlow,
        Fault::LowSalt,
        Fault::HighSalt,
        Fault::Clean,
        Fault::HighCurrent,
        Fault::LowVolts,
        Fault::LowTemperature,
        Fault::CheckPcb,
    ];

    /// Bit position within the error field
    pub fn bit(self) -> u8 {
        self as u8
    }

    /// Short name used when publishing
    pub fn name(self) -> &'static str {
        match self {
            Fault::NoFlow => "no_flow",
            Fault::LowSalt => "low_salt",
            Fault::HighSalt => "high_salt",
            Fault::Clean => "clean",
            Fault::HighCurrent => "high_current",
            Fault::LowVolts => "low_volts",
            Fault::LowTemperature => "low_temp",
            Fault::CheckPcb => "check_pcb",
        }
    }
}

/// Raw error field from a status response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorFlags(pub u8);

impl ErrorFlags {
    /// Check a single fault bit
    pub fn is_set(self, fault: Fault) -> bool {
        self.0 & (1 << fault.bit()) != 0
    }

    /// Iterate every fault with its current state
    pub fn iter(self) -> impl Iterator<Item = (Fault, bool)> {
        Fault::ALL.into_iter().map(move |f| (f, self.is_set(f)))
    }

    /// True if no fault bit is set
    pub fn is_clear(self) -> bool {
        self.0 == 0
    }
}

/// A decoded chlorinator reply
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// Firmware version text
    Version(Version),
    /// Water temperature, raw device units
    Temperature(u8),
    /// Reply to a percent set: salt level and fault bits
    Status { salt_ppm: u16, errors: ErrorFlags },
    /// Takeover acknowledgement
    Takeover { status: u8 },
}

impl Response {
    /// Decode a complete frame by its offset-3 response code
    ///
    /// Returns `None` for frames too short to carry a response and for
    /// unknown codes. Such frames still count as a reply on the bus.
    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        // Shortest decodable frame reaches offset 4
        if frame.len() < 5 {
            return None;
        }

        match frame[3] {
            RESP_VERSION => {
                // Text sits between the code byte pair and checksum + footer
                let text = frame.get(5..frame.len() - 3).unwrap_or(&[]);
                let mut version = Version::new();
                for &byte in text {
                    // Capacity covers the worst case, this cannot fail
                    let _ = version.push(char::from(byte));
                }
                debug!("IC version response: {=str}", version.as_str());
                Some(Response::Version(version))
            }
            RESP_TEMPERATURE => {
                let temperature = frame[4];
                debug!("IC temperature response: {}", temperature);
                Some(Response::Temperature(temperature))
            }
            RESP_STATUS => {
                let salt_ppm = frame[4] as u16 * SALT_PPM_PER_UNIT;
                let errors = ErrorFlags(*frame.get(5)?);
                debug!("IC status response salt:{} error:{=u8:02X}", salt_ppm, errors.0);
                Some(Response::Status { salt_ppm, errors })
            }
            RESP_TAKEOVER => {
                let status = frame[3];
                debug!("IC takeover response status:{=u8:02X}", status);
                Some(Response::Takeover { status })
            }
            _ => None,
        }
    }
}

/// Commands the controller sends to the chlorinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Take control away from an automation panel
    Takeover,
    /// Set generator output, 0-100 %
    SetPercent(u8),
    /// Ask for the firmware version
    GetVersion,
    /// Ask for the water temperature
    GetTemperature,
}

impl Command {
    /// Command bytes between header and checksum
    pub fn payload(&self) -> Vec<u8, 4> {
        let mut payload = Vec::new();
        // At most four bytes, always fits
        let _ = match *self {
            Command::Takeover => payload.extend_from_slice(&[DEST_CHLORINATOR, CMD_TAKEOVER, 0x00]),
            // Percent 16 collides with DLE; the device expects a padding byte
            Command::SetPercent(16) => {
                payload.extend_from_slice(&[DEST_CHLORINATOR, CMD_SET_PERCENT, 16, 0x00])
            }
            Command::SetPercent(percent) => {
                payload.extend_from_slice(&[DEST_CHLORINATOR, CMD_SET_PERCENT, percent])
            }
            Command::GetVersion => {
                payload.extend_from_slice(&[DEST_CHLORINATOR, CMD_GET_VERSION, 0x00])
            }
            Command::GetTemperature => {
                payload.extend_from_slice(&[DEST_CHLORINATOR, CMD_GET_TEMPERATURE, 0x00])
            }
        };
        payload
    }

    /// Retries after the first transmission before giving up
    pub fn retries(&self) -> u8 {
        match self {
            Command::GetVersion => 1,
            Command::Takeover | Command::SetPercent(_) | Command::GetTemperature => 3,
        }
    }

    /// Encode into a complete wire frame
    pub fn encode(&self) -> Result<TxFrame, FrameError> {
        encode(&self.payload())
    }
}

/// Low byte of the header plus command bytes
pub fn checksum(command: &[u8]) -> u8 {
    FRAME_HEADER
        .iter()
        .chain(command)
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Wrap raw command bytes into a frame
pub fn encode(command: &[u8]) -> Result<TxFrame, FrameError> {
    let mut frame = TxFrame::new();
    extend(&mut frame, &FRAME_HEADER)?;
    extend(&mut frame, command)?;
    extend(&mut frame, &[checksum(command)])?;
    extend(&mut frame, &FRAME_FOOTER)?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_encode_get_version() {
        let frame = Command::GetVersion.encode().unwrap();
        // 0x10 + 0x02 + 0x50 + 0x14 + 0x00 = 0x76
        assert_eq!(
            frame.as_slice(),
            &[0x10, 0x02, 0x50, 0x14, 0x00, 0x76, 0x10, 0x03]
        );
    }

    #[test]
    fn test_encode_set_percent_sixteen_pads() {
        let frame = Command::SetPercent(16).encode().unwrap();
        assert_eq!(
            frame.as_slice(),
            &[0x10, 0x02, 0x50, 0x11, 0x10, 0x00, 0x83, 0x10, 0x03]
        );

        let frame = Command::SetPercent(50).encode().unwrap();
        assert_eq!(frame.len(), 8);
        assert_eq!(frame[4], 50);
    }

    #[test]
    fn test_retry_limits() {
        assert_eq!(Command::GetVersion.retries(), 1);
        assert_eq!(Command::GetTemperature.retries(), 3);
        assert_eq!(Command::Takeover.retries(), 3);
        assert_eq!(Command::SetPercent(40).retries(), 3);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0xFF]), 0x10u8.wrapping_add(0x02).wrapping_add(0xFE));
    }

    #[test]
    fn test_parse_version_frame_ignores_checksum() {
        for checksum in [0x00, 0x5A, 0xFF] {
            let bytes = [
                0x10, 0x02, 0x00, 0x03, 0x00, b'A', b'1', b'.', b'0', checksum, 0x10, 0x03,
            ];
            assert_eq!(feed(&bytes), ParseStatus::Complete);
            let response = Response::from_frame(&bytes).unwrap();
            match response {
                Response::Version(v) => assert_eq!(v.as_str(), "A1.0"),
                other => panic!("unexpected response {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_temperature_frame() {
        let bytes = [0x10, 0x02, 0x00, 0x16, 0x4E, 0x00, 0x10, 0x03];
        assert_eq!(feed(&bytes), ParseStatus::Complete);
        assert_eq!(Response::from_frame(&bytes), Some(Response::Temperature(0x4E)));
    }

    #[test]
    fn test_parse_status_frame() {
        let bytes = [0x10, 0x02, 0x00, 0x12, 0x3C, 0b1000_0011, 0x00, 0x10, 0x03];
        assert_eq!(feed(&bytes), ParseStatus::Complete);
        let response = Response::from_frame(&bytes).unwrap();
        assert_eq!(
            response,
            Response::Status {
                salt_ppm: 3000,
                errors: ErrorFlags(0b1000_0011),
            }
        );
        if let Response::Status { errors, .. } = response {
            assert!(errors.is_set(Fault::NoFlow));
            assert!(errors.is_set(Fault::LowSalt));
            assert!(!errors.is_set(Fault::HighSalt));
            assert!(errors.is_set(Fault::CheckPcb));
            assert_eq!(errors.iter().filter(|(_, on)| *on).count(), 3);
        }
    }

    #[test]
    fn test_parse_takeover_frame() {
        let bytes = [0x10, 0x02, 0x00, 0x01, 0x00, 0x00, 0x13, 0x10, 0x03];
        assert_eq!(feed(&bytes), ParseStatus::Complete);
        assert_eq!(
            Response::from_frame(&bytes),
            Some(Response::Takeover { status: 0x01 })
        );
    }

    #[test]
    fn test_unknown_response_code() {
        let bytes = [0x10, 0x02, 0x00, 0x42, 0x00, 0x10, 0x03];
        assert_eq!(feed(&bytes), ParseStatus::Complete);
        assert_eq!(Response::from_frame(&bytes), None);
    }

    #[test]
    fn test_shortest_frame_completes_without_response() {
        let bytes = [0x10, 0x02, 0x10, 0x03];
        assert_eq!(feed(&bytes), ParseStatus::Complete);
        assert_eq!(Response::from_frame(&bytes), None);
    }

    #[test]
    fn test_bad_second_byte_tolerated_until_ceiling() {
        let mut bytes = [0u8; MAX_FRAME_SIZE];
        bytes[0] = 0x10;
        bytes[1] = 0x99;
        // Even a footer does not complete a frame with a bad header
        bytes[2] = 0x10;
        bytes[3] = 0x03;
        for len in 2..MAX_FRAME_SIZE {
            assert_eq!(parse(&bytes[..len]), ParseStatus::Building);
        }
        assert_eq!(parse(&bytes), ParseStatus::Invalid(FrameError::Overflow));
    }

    #[test]
    fn test_missing_footer_overflows() {
        let mut bytes = [0x55u8; MAX_FRAME_SIZE];
        bytes[0] = 0x10;
        bytes[1] = 0x02;
        assert_eq!(parse(&bytes[..MAX_FRAME_SIZE - 1]), ParseStatus::Building);
        assert_eq!(parse(&bytes), ParseStatus::Invalid(FrameError::Overflow));
    }

    #[test]
    fn test_wrong_lead_byte_is_invalid() {
        assert_eq!(
            parse(&[0xFF, 0x02]),
            ParseStatus::Invalid(FrameError::InvalidHeader)
        );
    }
}
