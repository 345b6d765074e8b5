#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Station config schema for the weighing acquisition core.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Global problems fail `Config::validate`; a single bad device entry is
//!   reported by `DeviceEntry::validate` so the rest of the station can run.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Baud rates accepted for a scale line.
pub const STANDARD_BAUD_RATES: [u32; 9] = [1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200];

/// One scale on the station.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Channel id; readings are published under this name.
    pub name: String,
    /// OS port identifier (e.g. "/dev/ttyUSB0", "COM3").
    pub port: String,
    pub baud_rate: u32,
    /// Inactive devices are kept in the file but never opened.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Some indicator firmwares transmit the digits of each reading reversed.
    #[serde(default, alias = "site_orientation")]
    pub reverse_digits: bool,
}

fn default_true() -> bool {
    true
}

impl DeviceEntry {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.name.trim().is_empty() {
            eyre::bail!("device name must not be empty");
        }
        if self.port.trim().is_empty() {
            eyre::bail!("device {}: port must not be empty", self.name);
        }
        if !STANDARD_BAUD_RATES.contains(&self.baud_rate) {
            eyre::bail!(
                "device {}: baud_rate {} is not a standard rate",
                self.name,
                self.baud_rate
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AcquisitionSection {
    /// Read-loop polling period per channel (ms).
    pub poll_ms: u64,
    /// Max wait for a single port read (ms).
    pub read_timeout_ms: u64,
    /// Period of the reconnection scan (ms).
    pub reconnect_interval_ms: u64,
    /// Outstanding frames above which producers and consumer pause.
    pub queue_soft_limit: usize,
    /// Length of one backpressure pause (ms).
    pub backpressure_pause_ms: u64,
    /// Tokens kept per channel for the majority vote.
    pub history_capacity: usize,
}

impl Default for AcquisitionSection {
    fn default() -> Self {
        Self {
            poll_ms: 100,
            read_timeout_ms: 500,
            reconnect_interval_ms: 5_000,
            queue_soft_limit: 100,
            backpressure_pause_ms: 10,
            history_capacity: 4,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
    #[serde(default)]
    pub acquisition: AcquisitionSection,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Devices
        if self.devices.is_empty() {
            eyre::bail!("at least one [[devices]] entry is required");
        }
        let mut seen = HashSet::new();
        for d in &self.devices {
            if !seen.insert(d.name.trim()) {
                eyre::bail!("duplicate device name: {}", d.name);
            }
        }

        // Acquisition
        let a = &self.acquisition;
        if a.poll_ms == 0 {
            eyre::bail!("acquisition.poll_ms must be >= 1");
        }
        if a.poll_ms > 60_000 {
            eyre::bail!("acquisition.poll_ms is unreasonably large (>1min)");
        }
        if a.read_timeout_ms == 0 {
            eyre::bail!("acquisition.read_timeout_ms must be >= 1");
        }
        if a.read_timeout_ms > 60_000 {
            eyre::bail!("acquisition.read_timeout_ms is unreasonably large (>1min)");
        }
        if a.reconnect_interval_ms == 0 {
            eyre::bail!("acquisition.reconnect_interval_ms must be >= 1");
        }
        if a.reconnect_interval_ms > 60 * 60 * 1000 {
            eyre::bail!("acquisition.reconnect_interval_ms is unreasonably large (>1h)");
        }
        if a.queue_soft_limit == 0 {
            eyre::bail!("acquisition.queue_soft_limit must be >= 1");
        }
        if a.backpressure_pause_ms > 10_000 {
            eyre::bail!("acquisition.backpressure_pause_ms is unreasonably large (>10s)");
        }
        if a.history_capacity == 0 {
            eyre::bail!("acquisition.history_capacity must be >= 1");
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref() {
            if !matches!(rotation, "never" | "daily" | "hourly") {
                eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rotation}");
            }
        }

        Ok(())
    }

    /// Devices marked active, in file order.
    pub fn active_devices(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.devices.iter().filter(|d| d.active)
    }
}
