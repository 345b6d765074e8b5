//! `From` implementations bridging `weigh_config` types to `weigh_core` types.

use std::time::Duration;

use crate::config::{AcquisitionCfg, DeviceConfig};

// ── DeviceConfig ─────────────────────────────────────────────────────────────

impl From<&weigh_config::DeviceEntry> for DeviceConfig {
    fn from(d: &weigh_config::DeviceEntry) -> Self {
        Self {
            name: d.name.trim().to_owned(),
            port: d.port.trim().to_owned(),
            baud_rate: d.baud_rate,
            active: d.active,
            reverse_digits: d.reverse_digits,
        }
    }
}

// ── AcquisitionCfg ───────────────────────────────────────────────────────────

impl From<&weigh_config::AcquisitionSection> for AcquisitionCfg {
    fn from(a: &weigh_config::AcquisitionSection) -> Self {
        Self {
            poll_period: Duration::from_millis(a.poll_ms),
            read_timeout: Duration::from_millis(a.read_timeout_ms),
            reconnect_interval: Duration::from_millis(a.reconnect_interval_ms),
            queue_soft_limit: a.queue_soft_limit,
            backpressure_pause: Duration::from_millis(a.backpressure_pause_ms),
            history_capacity: a.history_capacity,
        }
    }
}

/// All devices of a station config, in file order.
pub fn devices_from(cfg: &weigh_config::Config) -> Vec<DeviceConfig> {
    cfg.devices.iter().map(DeviceConfig::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_station_file_into_runtime_types() {
        let cfg = weigh_config::load_toml(
            r#"
[[devices]]
name = " B1 "
port = "COM3"
baud_rate = 9600
reverse_digits = true

[acquisition]
poll_ms = 50
reconnect_interval_ms = 1000
"#,
        )
        .unwrap();
        let devices = devices_from(&cfg);
        assert_eq!(devices[0].name, "B1");
        assert!(devices[0].reverse_digits);
        let acq = AcquisitionCfg::from(&cfg.acquisition);
        assert_eq!(acq.poll_period, Duration::from_millis(50));
        assert_eq!(acq.reconnect_interval, Duration::from_secs(1));
        assert_eq!(acq.read_timeout, Duration::from_millis(500));
    }
}
