//! The channel registry: configured device → live channel, behind one lock.
//!
//! Start-up inserts, the supervisor replaces dead channels, `stop` closes all.
//! Every replacement happens with the lock held, so a status read never sees a
//! half-swapped slot.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use weigh_traits::{Clock, LinkConnector};

use crate::channel::DeviceChannel;
use crate::config::{AcquisitionCfg, DeviceConfig};
use crate::error::Result;
use crate::hw_error::map_link_error;
use crate::ingest::FrameSender;
use crate::shutdown::ShutdownSignal;
use crate::status::ChannelStatus;
use crate::types::ChannelId;

/// Everything needed to (re)open a channel. Shared by start-up and the supervisor.
#[derive(Clone)]
pub struct ChannelOpener {
    pub(crate) connector: Arc<dyn LinkConnector + Send + Sync>,
    pub(crate) frames: FrameSender,
    pub(crate) cfg: AcquisitionCfg,
    pub(crate) shutdown: ShutdownSignal,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
}

impl ChannelOpener {
    pub fn open(&self, device: &DeviceConfig) -> Result<DeviceChannel> {
        let settings = device.port_settings(self.cfg.read_timeout);
        let link = self
            .connector
            .open(&settings)
            .map_err(|e| eyre::Report::new(map_link_error(e.as_ref())))?;
        let channel = DeviceChannel::spawn(
            device.channel_id(),
            link,
            self.frames.clone(),
            self.cfg.poll_period,
            self.shutdown.clone(),
            self.clock.clone(),
        )?;
        tracing::info!(
            channel = %device.name,
            port = %device.port,
            baud = device.baud_rate,
            "channel opened"
        );
        Ok(channel)
    }
}

#[derive(Debug)]
pub(crate) struct ChannelSlot {
    pub(crate) config: DeviceConfig,
    pub(crate) channel: Option<DeviceChannel>,
    pub(crate) reconnects: u32,
    pub(crate) last_error: Option<String>,
}

impl ChannelSlot {
    pub(crate) fn is_healthy(&self) -> bool {
        self.channel.as_ref().is_some_and(DeviceChannel::is_open)
    }
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    slots: Mutex<BTreeMap<ChannelId, ChannelSlot>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BTreeMap<ChannelId, ChannelSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a device with its channel, or `None` if the first open failed.
    pub fn insert(
        &self,
        config: DeviceConfig,
        channel: Option<DeviceChannel>,
        last_error: Option<String>,
    ) {
        let slot = ChannelSlot {
            config,
            channel,
            reconnects: 0,
            last_error,
        };
        if let Some(mut old) = self.lock().insert(slot.config.channel_id(), slot) {
            if let Some(ch) = old.channel.as_mut() {
                ch.close();
            }
        }
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Health of every registered device, ordered by name.
    pub fn status(&self) -> Vec<ChannelStatus> {
        self.lock()
            .values()
            .map(|slot| ChannelStatus {
                name: slot.config.name.clone(),
                port: slot.config.port.clone(),
                connected: slot.is_healthy(),
                reconnect_attempts: slot.reconnects,
                last_error: slot
                    .channel
                    .as_ref()
                    .and_then(DeviceChannel::last_error)
                    .or_else(|| slot.last_error.clone()),
            })
            .collect()
    }

    /// Close every channel. The devices stay registered (disconnected).
    pub fn close_all(&self) {
        let mut slots = self.lock();
        for slot in slots.values_mut() {
            if let Some(mut ch) = slot.channel.take() {
                ch.close();
            }
        }
    }

    /// Forget every device, closing its channel first.
    pub fn clear(&self) {
        self.close_all();
        self.lock().clear();
    }
}
