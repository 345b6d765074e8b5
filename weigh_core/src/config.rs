//! Runtime configuration types for the acquisition engine.
//!
//! These are the types `Acquisition` works with. They are separate from the
//! TOML-deserialized config in `weigh_config`; see `conversions`.

use std::time::Duration;

use weigh_config::STANDARD_BAUD_RATES;
use weigh_traits::PortSettings;

use crate::error::DeviceRejected;
use crate::types::ChannelId;

/// One scale as handed to `Acquisition::start`. Immutable once acquisition runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub name: String,
    pub port: String,
    pub baud_rate: u32,
    pub active: bool,
    /// Read the numeric part of each reading back to front.
    pub reverse_digits: bool,
}

impl DeviceConfig {
    /// Active device with normal digit orientation.
    pub fn new(name: impl Into<String>, port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            name: name.into(),
            port: port.into(),
            baud_rate,
            active: true,
            reverse_digits: false,
        }
    }

    pub fn with_reverse_digits(mut self, reverse: bool) -> Self {
        self.reverse_digits = reverse;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(self.name.clone())
    }

    pub fn port_settings(&self, read_timeout: Duration) -> PortSettings {
        PortSettings::new(self.port.clone(), self.baud_rate, read_timeout)
    }

    /// Checks the caller was supposed to do; a failing entry is skipped at start.
    pub fn validate(&self) -> Result<(), DeviceRejected> {
        let reject = |reason: &str| DeviceRejected {
            name: self.name.clone(),
            reason: reason.to_owned(),
        };
        if self.name.trim().is_empty() {
            return Err(reject("empty device name"));
        }
        if self.port.trim().is_empty() {
            return Err(reject("empty port name"));
        }
        if !STANDARD_BAUD_RATES.contains(&self.baud_rate) {
            return Err(DeviceRejected {
                name: self.name.clone(),
                reason: format!("invalid baud rate {}", self.baud_rate),
            });
        }
        Ok(())
    }
}

/// Timing and sizing of the acquisition pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionCfg {
    /// Per-channel read loop period.
    pub poll_period: Duration,
    /// Max wait for a single port read.
    pub read_timeout: Duration,
    /// Period of the reconnection scan.
    pub reconnect_interval: Duration,
    /// Outstanding frames above which producers and the consumer pause.
    pub queue_soft_limit: usize,
    /// One backpressure pause.
    pub backpressure_pause: Duration,
    /// Tokens kept per channel for the majority vote.
    pub history_capacity: usize,
}

impl Default for AcquisitionCfg {
    fn default() -> Self {
        Self {
            poll_period: Duration::from_millis(100),
            read_timeout: Duration::from_millis(500),
            reconnect_interval: Duration::from_secs(5),
            queue_soft_limit: 100,
            backpressure_pause: Duration::from_millis(10),
            history_capacity: crate::stabilizer::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_port_and_odd_baud() {
        let err = DeviceConfig::new("B1", "", 9600).validate().unwrap_err();
        assert_eq!(err.reason, "empty port name");
        let err = DeviceConfig::new("B1", "COM1", 9601).validate().unwrap_err();
        assert_eq!(err.reason, "invalid baud rate 9601");
        assert!(DeviceConfig::new("B1", "COM1", 9600).validate().is_ok());
    }

    #[test]
    fn port_settings_carry_timeout() {
        let s = DeviceConfig::new("B1", "COM1", 4800).port_settings(Duration::from_millis(500));
        assert_eq!(s.port, "COM1");
        assert_eq!(s.baud_rate, 4800);
        assert_eq!(s.read_timeout, Duration::from_millis(500));
    }
}
