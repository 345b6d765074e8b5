//! One scale line and its read loop.
//!
//! Each `DeviceChannel` owns one open transport and exactly one thread. Every
//! poll period the thread drains whatever text arrived, clears the device buffers
//! and pushes non-blank text onto the frame queue. Transport errors are swallowed
//! and retried on the next tick; the reconnection supervisor notices a dead line
//! through `is_open`.
//!
//! The thread is stopped and joined when the channel is closed or dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use weigh_traits::{Clock, SerialLink};

use crate::error::Result;
use crate::hw_error::map_link_error;
use crate::ingest::{FrameSender, PushError};
use crate::shutdown::{Shutdown, ShutdownSignal};
use crate::types::{ChannelId, RawFrame};

type SharedLink = Arc<Mutex<Box<dyn SerialLink + Send>>>;

fn lock_link(link: &SharedLink) -> MutexGuard<'_, Box<dyn SerialLink + Send>> {
    link.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct DeviceChannel {
    id: ChannelId,
    link: SharedLink,
    last_error: Arc<Mutex<Option<String>>>,
    /// Stops only this channel; the acquisition-wide signal stops all of them.
    stop: Shutdown,
    join_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for DeviceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceChannel")
            .field("id", &self.id)
            .field("running", &self.join_handle.is_some())
            .finish_non_exhaustive()
    }
}

impl DeviceChannel {
    /// Start the read loop on an already open link.
    pub fn spawn(
        id: ChannelId,
        link: Box<dyn SerialLink + Send>,
        frames: FrameSender,
        poll: Duration,
        global: ShutdownSignal,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        let link: SharedLink = Arc::new(Mutex::new(link));
        let last_error = Arc::new(Mutex::new(None));
        let stop = Shutdown::new();

        let thread_link = link.clone();
        let thread_error = last_error.clone();
        let local = stop.signal();
        let channel = id.clone();
        let join_handle = std::thread::Builder::new()
            .name(format!("weigh-ch-{id}"))
            .spawn(move || {
                let mut failing = false;
                loop {
                    if local.is_triggered() || global.is_triggered() {
                        break;
                    }

                    let read = {
                        let mut link = lock_link(&thread_link);
                        link.read_available().and_then(|text| {
                            link.clear_buffers()?;
                            Ok(text)
                        })
                    };

                    match read {
                        Ok(text) => {
                            failing = false;
                            if !text.trim().is_empty() {
                                let frame = RawFrame {
                                    channel: channel.clone(),
                                    text,
                                    received_at: clock.now(),
                                };
                                if let Err(PushError::Closed(_)) =
                                    frames.push_or_stop(frame, &global, &local)
                                {
                                    tracing::debug!(%channel, "frame not queued, read loop exiting");
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            let err = map_link_error(e.as_ref());
                            if !failing {
                                tracing::debug!(%channel, error = %err, "read failed; will retry");
                                failing = true;
                            }
                            *thread_error
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
                        }
                    }

                    if global.wait_either(&local, poll) {
                        break;
                    }
                }
                tracing::trace!(%channel, "read loop exiting cleanly");
            })?;

        Ok(Self {
            id,
            link,
            last_error,
            stop,
            join_handle: Some(join_handle),
        })
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    /// True while the loop runs on a transport that still reports open.
    pub fn is_open(&self) -> bool {
        self.join_handle.as_ref().is_some_and(|h| !h.is_finished())
            && lock_link(&self.link).is_open()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop the loop, join it and release the transport. Safe to call twice.
    pub fn close(&mut self) {
        self.stop.trigger();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::info!(channel = %self.id, "channel closed"),
                Err(e) => tracing::warn!(channel = %self.id, ?e, "read loop panicked"),
            }
        }
        lock_link(&self.link).close();
    }
}

impl Drop for DeviceChannel {
    fn drop(&mut self) {
        self.close();
    }
}
