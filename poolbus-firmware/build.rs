//! Build script for poolbus-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates bus.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sections the firmware understands, with their integer keys
const SECTIONS: &[(&str, &[&str])] = &[
    ("serial", &["baudrate", "data_bits", "stop_bits"]),
    (
        "timing",
        &["command_quiet_ms", "transmit_quiet_ms", "receive_quiet_ms"],
    ),
    ("chlorinator", &["percent", "refresh_interval_ms"]),
    ("pump", &["poll_delay_ms"]),
    ("polling", &["update_interval_ms", "tick_interval_ms"]),
];

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate bus.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=bus.toml");

    let config_path = Path::new("bus.toml");

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read bus.toml                                  ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    // Parse and validate TOML syntax
    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in bus.toml                          ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_sections(&config, &mut errors);
    validate_ranges(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid bus configuration                                ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=bus.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every top-level entry must be a known section, and numeric keys must be
/// non-negative integers
fn validate_sections(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(root) = config.as_table() else {
        errors.push("bus.toml must be a table".to_string());
        return;
    };

    for (name, section) in root {
        let Some(&(_, int_keys)) = SECTIONS.iter().find(|(s, _)| *s == name.as_str()) else {
            errors.push(format!("unknown section [{}]", name));
            continue;
        };
        let Some(table) = section.as_table() else {
            errors.push(format!("[{}] must be a table", name));
            continue;
        };

        for key in int_keys {
            match table.get(*key) {
                None => {}
                Some(toml::Value::Integer(v)) if *v >= 0 && *v <= u32::MAX as i64 => {}
                Some(_) => errors.push(format!("[{}] {} must be a u32 integer", name, key)),
            }
        }
    }
}

fn validate_ranges(config: &toml::Value, errors: &mut Vec<String>) {
    let get = |section: &str, key: &str| config.get(section).and_then(|s| s.get(key)).cloned();

    if let Some(toml::Value::Integer(percent)) = get("chlorinator", "percent") {
        if percent > 100 {
            errors.push("[chlorinator] percent must be 0-100".to_string());
        }
    }

    match get("chlorinator", "takeover") {
        None | Some(toml::Value::Boolean(_)) => {}
        Some(_) => errors.push("[chlorinator] takeover must be true or false".to_string()),
    }

    if let Some(toml::Value::Integer(bits)) = get("serial", "data_bits") {
        if bits != 7 && bits != 8 {
            errors.push("[serial] data_bits must be 7 or 8".to_string());
        }
    }

    if let Some(toml::Value::Integer(bits)) = get("serial", "stop_bits") {
        if bits != 1 && bits != 2 {
            errors.push("[serial] stop_bits must be 1 or 2".to_string());
        }
    }

    match get("serial", "parity") {
        None => {}
        Some(toml::Value::String(p)) if ["none", "even", "odd"].contains(&p.as_str()) => {}
        Some(_) => errors.push("[serial] parity must be 'none', 'even' or 'odd'".to_string()),
    }

    if let Some(toml::Value::Integer(0)) = get("serial", "baudrate") {
        errors.push("[serial] baudrate must be non-zero".to_string());
    }

    if let Some(toml::Value::Integer(0)) = get("polling", "tick_interval_ms") {
        errors.push("[polling] tick_interval_ms must be non-zero".to_string());
    }
}
