//! Simple TOML parser for bus configuration
//!
//! Handles only the subset the bus configuration needs, without allocating.
//! It does NOT support the full TOML spec.
//!
//! Supported features:
//! - [section] headers
//! - Key = value pairs (string, integer, boolean)
//! - Comments (# ...), whole-line or trailing
//!
//! Unknown keys are ignored; unknown sections are an error.

use poolbus_hal::uart::{DataBits, Parity, StopBits};

use super::BusConfig;

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Invalid or unknown section header
    InvalidSection,
    /// Value has the wrong type or does not parse
    InvalidValue,
    /// Value parses but is outside its allowed range
    OutOfRange,
    /// Line is neither a header nor a key = value pair
    InvalidLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Serial,
    Timing,
    Chlorinator,
    Pump,
    Polling,
}

/// Parse TOML configuration into a [`BusConfig`]
///
/// Missing sections and keys keep their defaults.
pub fn parse_config(input: &str) -> Result<BusConfig, ParseError> {
    let mut config = BusConfig::default();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let header = strip_comment(header)
                .strip_suffix(']')
                .ok_or(ParseError::InvalidSection)?;
            section = parse_section_header(header)?;
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ParseError::InvalidLine)?;
        apply_value(section, key, value, &mut config)?;
    }

    validate(&config)?;
    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    match header.trim() {
        "serial" => Ok(Section::Serial),
        "timing" => Ok(Section::Timing),
        "chlorinator" => Ok(Section::Chlorinator),
        "pump" => Ok(Section::Pump),
        "polling" => Ok(Section::Polling),
        _ => Err(ParseError::InvalidSection),
    }
}

/// Drop a trailing comment that is not inside a string
fn strip_comment(s: &str) -> &str {
    match s.find('#') {
        Some(hash_pos) if s[..hash_pos].matches('"').count() % 2 == 0 => s[..hash_pos].trim(),
        _ => s.trim(),
    }
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = strip_comment(value);

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    // TOML allows underscores as digit separators
    let mut digits = heapless::String::<16>::new();
    for c in value.chars().filter(|&c| c != '_') {
        digits.push(c).map_err(|_| ParseError::InvalidValue)?;
    }
    digits.parse().map_err(|_| ParseError::InvalidValue)
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

fn parse_data_bits(value: &str) -> Result<DataBits, ParseError> {
    match parse_int::<u8>(value)? {
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(ParseError::OutOfRange),
    }
}

fn parse_parity(value: &str) -> Result<Parity, ParseError> {
    match parse_string(value) {
        "none" => Ok(Parity::None),
        "even" => Ok(Parity::Even),
        "odd" => Ok(Parity::Odd),
        _ => Err(ParseError::InvalidValue),
    }
}

fn parse_stop_bits(value: &str) -> Result<StopBits, ParseError> {
    match parse_int::<u8>(value)? {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(ParseError::OutOfRange),
    }
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut BusConfig,
) -> Result<(), ParseError> {
    match section {
        Section::Root => {
            debug!("Ignoring top-level key {=str}", key);
        }
        Section::Serial => match key {
            "baudrate" => config.serial.baudrate = parse_int(value)?,
            "data_bits" => config.serial.data_bits = parse_data_bits(value)?,
            "parity" => config.serial.parity = parse_parity(value)?,
            "stop_bits" => config.serial.stop_bits = parse_stop_bits(value)?,
            _ => {} // Ignore unknown keys
        },
        Section::Timing => match key {
            "command_quiet_ms" => config.timing.command_quiet_ms = parse_int(value)?,
            "transmit_quiet_ms" => config.timing.transmit_quiet_ms = parse_int(value)?,
            "receive_quiet_ms" => config.timing.receive_quiet_ms = parse_int(value)?,
            _ => {}
        },
        Section::Chlorinator => match key {
            "takeover" => config.chlorinator.takeover = parse_bool(value)?,
            "percent" => config.chlorinator.percent = parse_int(value)?,
            "refresh_interval_ms" => config.chlorinator.refresh_interval_ms = parse_int(value)?,
            _ => {}
        },
        Section::Pump => match key {
            "poll_delay_ms" => config.pump.poll_delay_ms = parse_int(value)?,
            _ => {}
        },
        Section::Polling => match key {
            "update_interval_ms" => config.polling.update_interval_ms = parse_int(value)?,
            "tick_interval_ms" => config.polling.tick_interval_ms = parse_int(value)?,
            _ => {}
        },
    }
    Ok(())
}

fn validate(config: &BusConfig) -> Result<(), ParseError> {
    if config.serial.baudrate == 0
        || config.chlorinator.percent > 100
        || config.polling.tick_interval_ms == 0
    {
        return Err(ParseError::OutOfRange);
    }
    Ok(())
}
