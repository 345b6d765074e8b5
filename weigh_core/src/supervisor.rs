//! Periodic reconnection of dead channels.
//!
//! Every interval the supervisor walks the registry; each device whose channel is
//! missing or reports closed has the old channel closed and a fresh one opened
//! from its original config. Failures are logged and the scan moves on.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::Result;
use crate::registry::{ChannelOpener, ChannelRegistry};
use crate::shutdown::ShutdownSignal;

/// Outcome of one pass over the registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub checked: usize,
    pub reopened: usize,
    pub failed: usize,
}

/// One pass: close and reopen every unhealthy channel.
pub fn scan_once(
    registry: &ChannelRegistry,
    opener: &ChannelOpener,
    shutdown: &ShutdownSignal,
) -> ScanReport {
    let mut report = ScanReport::default();
    let mut slots = registry.lock();
    for (id, slot) in slots.iter_mut() {
        if shutdown.is_triggered() {
            break;
        }
        report.checked += 1;
        if slot.is_healthy() {
            continue;
        }
        if let Some(mut dead) = slot.channel.take() {
            if let Some(e) = dead.last_error() {
                slot.last_error = Some(e);
            }
            dead.close();
        }
        slot.reconnects = slot.reconnects.saturating_add(1);
        match opener.open(&slot.config) {
            Ok(ch) => {
                tracing::info!(channel = %id, attempt = slot.reconnects, "channel reconnected");
                slot.channel = Some(ch);
                slot.last_error = None;
                report.reopened += 1;
            }
            Err(e) => {
                tracing::warn!(channel = %id, port = %slot.config.port, error = %e, "reconnect failed");
                slot.last_error = Some(e.to_string());
                report.failed += 1;
            }
        }
    }
    report
}

pub struct ReconnectionSupervisor {
    join_handle: Option<JoinHandle<()>>,
}

impl ReconnectionSupervisor {
    /// Scan every `interval` until `shutdown` fires. The first scan runs one interval after start.
    pub fn spawn(
        registry: Arc<ChannelRegistry>,
        opener: ChannelOpener,
        interval: Duration,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        let join_handle = std::thread::Builder::new()
            .name("weigh-supervisor".into())
            .spawn(move || {
                while !shutdown.wait(interval) {
                    let report = scan_once(&registry, &opener, &shutdown);
                    if report.reopened + report.failed > 0 {
                        tracing::debug!(?report, "reconnection scan");
                    }
                }
                tracing::trace!("supervisor exiting cleanly");
            })?;
        Ok(Self {
            join_handle: Some(join_handle),
        })
    }

    /// Join the thread. The shutdown signal must already be triggered.
    pub fn stop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.join() {
                tracing::warn!(?e, "supervisor thread panicked");
            }
        }
    }
}

impl Drop for ReconnectionSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AcquisitionCfg, DeviceConfig};
    use crate::ingest::FrameIngestQueue;
    use crate::shutdown::Shutdown;
    use weigh_hardware::SimulatedConnector;
    use weigh_traits::MonotonicClock;

    #[test]
    fn reopens_a_device_once_it_comes_back() {
        let conn = SimulatedConnector::new();
        let port = conn.add_port("COM1");
        port.fail_next_opens(1);
        let (tx, _rx) = FrameIngestQueue::new(100, Duration::from_millis(1)).split();
        let shutdown = Shutdown::new();
        let opener = ChannelOpener {
            connector: Arc::new(conn),
            frames: tx,
            cfg: AcquisitionCfg::default(),
            shutdown: shutdown.signal(),
            clock: Arc::new(MonotonicClock::new()),
        };
        let reg = ChannelRegistry::new();
        reg.insert(DeviceConfig::new("B1", "COM1", 9600), None, None);

        let first = scan_once(&reg, &opener, &shutdown.signal());
        assert_eq!((first.checked, first.reopened, first.failed), (1, 0, 1));
        let second = scan_once(&reg, &opener, &shutdown.signal());
        assert_eq!(second.reopened, 1);
        let third = scan_once(&reg, &opener, &shutdown.signal());
        assert_eq!((third.reopened, third.failed), (0, 0));

        let st = reg.status();
        assert!(st[0].connected);
        assert_eq!(st[0].reconnect_attempts, 2);
        assert_eq!(port.open_count(), 1);
        shutdown.trigger();
        reg.close_all();
    }
}
