//! The acquisition facade: start devices, stabilize, fan out, stop.
//!
//! Threads per running acquisition: one read loop per open device, one
//! stabilization consumer, one reconnection supervisor. Read loops and the
//! supervisor observe a single shutdown signal. The consumer keeps going until
//! they are joined, then drains what is queued and exits.

use crossbeam_channel as xch;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;

use weigh_traits::{Clock, LinkConnector};

use crate::builder::{AcquisitionBuilder, Missing};
use crate::bus::{SubscriptionId, WeightEventBus};
use crate::config::{AcquisitionCfg, DeviceConfig};
use crate::error::{AcquisitionError, DeviceRejected, Result};
use crate::ingest::{FrameIngestQueue, FrameReceiver, FrameSender};
use crate::registry::{ChannelOpener, ChannelRegistry};
use crate::shutdown::{Shutdown, ShutdownSignal};
use crate::stabilizer::StabilizationEngine;
use crate::status::ChannelStatus;
use crate::supervisor::ReconnectionSupervisor;
use crate::types::{RawFrame, WeightEvent};

type Readings = Arc<RwLock<BTreeMap<String, Decimal>>>;

/// What `start` did with each configured device.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// Opened and reading.
    pub started: Vec<String>,
    /// Registered, but the first open failed; the supervisor keeps retrying.
    pub disconnected: Vec<String>,
    /// Invalid entries, not registered.
    pub rejected: Vec<DeviceRejected>,
    /// Inactive entries.
    pub skipped: Vec<String>,
}

struct Running {
    shutdown: Shutdown,
    /// Fired once every producer is joined; the consumer then drains and exits.
    producers_done: Shutdown,
    frames: FrameSender,
    consumer: Option<JoinHandle<()>>,
    supervisor: ReconnectionSupervisor,
}

pub struct Acquisition {
    connector: Arc<dyn LinkConnector + Send + Sync>,
    cfg: AcquisitionCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    bus: Arc<WeightEventBus>,
    readings: Readings,
    registry: Arc<ChannelRegistry>,
    running: Option<Running>,
}

impl std::fmt::Debug for Acquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquisition")
            .field("cfg", &self.cfg)
            .field("running", &self.running.is_some())
            .field("channels", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Acquisition {
    pub fn builder() -> AcquisitionBuilder<Missing> {
        AcquisitionBuilder::default()
    }

    pub(crate) fn from_parts(
        connector: Arc<dyn LinkConnector + Send + Sync>,
        cfg: AcquisitionCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            connector,
            cfg,
            clock,
            bus: Arc::new(WeightEventBus::new()),
            readings: Arc::new(RwLock::new(BTreeMap::new())),
            registry: Arc::new(ChannelRegistry::new()),
            running: None,
        }
    }

    pub fn config(&self) -> &AcquisitionCfg {
        &self.cfg
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Open every active, valid device and start the pipeline.
    ///
    /// Invalid or duplicate entries are rejected without affecting the rest; a
    /// device that fails to open is kept for the supervisor to retry. Fails only
    /// when already running or when no device is left to register.
    pub fn start(&mut self, devices: &[DeviceConfig]) -> Result<StartReport> {
        if self.running.is_some() {
            return Err(eyre::Report::new(AcquisitionError::State(
                "acquisition already running".into(),
            )));
        }

        let mut report = StartReport::default();
        let mut engine = StabilizationEngine::new(self.cfg.history_capacity);
        let mut names = HashSet::new();
        let mut accepted = Vec::new();
        for device in devices {
            if !device.active {
                tracing::debug!(channel = %device.name, "inactive device skipped");
                report.skipped.push(device.name.clone());
                continue;
            }
            let checked = device.validate().and_then(|()| {
                if names.insert(device.name.clone()) {
                    Ok(())
                } else {
                    Err(DeviceRejected {
                        name: device.name.clone(),
                        reason: "duplicate device name".into(),
                    })
                }
            });
            if let Err(rejected) = checked {
                tracing::warn!(channel = %rejected.name, reason = %rejected.reason, "device rejected");
                report.rejected.push(rejected);
                continue;
            }
            engine.register(device.channel_id(), device.reverse_digits);
            accepted.push(device.clone());
        }
        if accepted.is_empty() {
            return Err(eyre::Report::new(AcquisitionError::NoDevices));
        }

        self.registry.clear();
        self.readings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let shutdown = Shutdown::new();
        let producers_done = Shutdown::new();
        let (frames, receiver) =
            FrameIngestQueue::new(self.cfg.queue_soft_limit, self.cfg.backpressure_pause).split();
        let consumer = spawn_consumer(
            engine,
            receiver,
            producers_done.signal(),
            self.bus.clone(),
            self.readings.clone(),
        )?;

        let opener = ChannelOpener {
            connector: self.connector.clone(),
            frames: frames.clone(),
            cfg: self.cfg.clone(),
            shutdown: shutdown.signal(),
            clock: self.clock.clone(),
        };
        for device in accepted {
            match opener.open(&device) {
                Ok(channel) => {
                    report.started.push(device.name.clone());
                    self.registry.insert(device, Some(channel), None);
                }
                Err(e) => {
                    tracing::warn!(
                        channel = %device.name,
                        port = %device.port,
                        error = %e,
                        "open failed; will retry"
                    );
                    report.disconnected.push(device.name.clone());
                    self.registry.insert(device, None, Some(e.to_string()));
                }
            }
        }

        let supervisor = ReconnectionSupervisor::spawn(
            self.registry.clone(),
            opener,
            self.cfg.reconnect_interval,
            shutdown.signal(),
        );
        let supervisor = match supervisor {
            Ok(s) => s,
            Err(e) => {
                shutdown.trigger();
                frames.close();
                self.registry.close_all();
                producers_done.trigger();
                let _ = consumer.join();
                return Err(e);
            }
        };

        tracing::info!(
            started = report.started.len(),
            disconnected = report.disconnected.len(),
            rejected = report.rejected.len(),
            "acquisition started"
        );
        self.running = Some(Running {
            shutdown,
            producers_done,
            frames,
            consumer: Some(consumer),
            supervisor,
        });
        Ok(report)
    }

    /// Cancel every loop, process frames already queued, join all threads and
    /// close all transports. Safe to call twice; also run on drop.
    pub fn stop(&mut self) {
        let Some(mut run) = self.running.take() else {
            return;
        };
        run.shutdown.trigger();
        run.frames.close();
        run.supervisor.stop();
        self.registry.close_all();
        // No producer is left; whatever is queued now is everything accepted.
        run.producers_done.trigger();
        if let Some(consumer) = run.consumer.take() {
            if let Err(e) = consumer.join() {
                tracing::warn!(?e, "stabilizer thread panicked");
            }
        }
        tracing::info!("acquisition stopped");
    }

    /// Latest stable weight per channel name.
    pub fn latest_readings(&self) -> BTreeMap<String, Decimal> {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Callback on every weight change; runs on the stabilization thread.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&WeightEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Weight events as a channel, for consumers on their own thread. Dropping
    /// the receiver unsubscribes it at the next published event.
    pub fn events(&self) -> xch::Receiver<WeightEvent> {
        self.bus.channel().1
    }

    pub fn channel_status(&self) -> Vec<ChannelStatus> {
        self.registry.status()
    }

    pub fn bus(&self) -> &Arc<WeightEventBus> {
        &self.bus
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_consumer(
    mut engine: StabilizationEngine,
    frames: FrameReceiver,
    producers_done: ShutdownSignal,
    bus: Arc<WeightEventBus>,
    readings: Readings,
) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("weigh-stabilizer".into())
        .spawn(move || {
            let mut handle_frame = |frame: RawFrame| {
                let Some(weight) = engine.process(&frame) else {
                    return;
                };
                let snapshot = {
                    let mut map = readings.write().unwrap_or_else(PoisonError::into_inner);
                    map.insert(weight.channel.to_string(), weight.value);
                    map.clone()
                };
                bus.publish(&WeightEvent {
                    weight,
                    readings: snapshot,
                });
            };

            let incoming = frames.receiver().clone();
            let finished = producers_done.receiver().clone();
            loop {
                xch::select! {
                    recv(incoming) -> msg => match msg {
                        Ok(frame) => handle_frame(frame),
                        Err(_) => break,
                    },
                    recv(finished) -> _ => break,
                }
                frames.pause_if_congested();
            }

            let mut drained = 0usize;
            while let Some(frame) = frames.try_recv() {
                handle_frame(frame);
                drained += 1;
            }
            tracing::debug!(drained, "stabilizer exiting");
        })?;
    Ok(handle)
}
