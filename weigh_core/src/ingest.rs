//! Multi-producer / single-consumer queue of raw frames.
//!
//! Every `DeviceChannel` holds a `FrameSender`; the stabilization thread holds the
//! single `FrameReceiver`. Frames from one channel stay in order; channels
//! interleave freely. Nothing is dropped: above the soft limit producers wait in
//! short pauses instead, so memory stays bounded at roughly the soft limit plus
//! one frame per producer.

use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::shutdown::ShutdownSignal;
use crate::types::RawFrame;

/// Why a frame was not accepted; the frame is handed back.
#[derive(Debug)]
pub enum PushError {
    /// The queue was closed for shutdown.
    Closed(RawFrame),
}

impl PushError {
    pub fn into_frame(self) -> RawFrame {
        match self {
            PushError::Closed(f) => f,
        }
    }
}

pub struct FrameIngestQueue {
    sender: FrameSender,
    receiver: FrameReceiver,
}

impl FrameIngestQueue {
    pub fn new(soft_limit: usize, pause: Duration) -> Self {
        let (tx, rx) = xch::unbounded();
        let closed = Arc::new(AtomicBool::new(false));
        let soft_limit = soft_limit.max(1);
        Self {
            sender: FrameSender {
                tx,
                closed: closed.clone(),
                soft_limit,
                pause,
            },
            receiver: FrameReceiver {
                rx,
                closed,
                soft_limit,
                pause,
            },
        }
    }

    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    pub fn split(self) -> (FrameSender, FrameReceiver) {
        (self.sender, self.receiver)
    }
}

#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: xch::Sender<RawFrame>,
    closed: Arc<AtomicBool>,
    soft_limit: usize,
    pause: Duration,
}

impl FrameSender {
    /// Enqueue a frame, pausing while the backlog is above the soft limit.
    pub fn push(&self, frame: RawFrame, shutdown: &ShutdownSignal) -> Result<(), PushError> {
        self.push_with(frame, |pause| shutdown.wait(pause))
    }

    /// Like `push`, but a parked producer also gives up when `local` fires, so
    /// one channel can be closed while the queue is congested.
    pub fn push_or_stop(
        &self,
        frame: RawFrame,
        global: &ShutdownSignal,
        local: &ShutdownSignal,
    ) -> Result<(), PushError> {
        self.push_with(frame, |pause| global.wait_either(local, pause))
    }

    fn push_with(&self, frame: RawFrame, wait: impl Fn(Duration) -> bool) -> Result<(), PushError> {
        let mut congested = false;
        while self.tx.len() > self.soft_limit {
            if !congested {
                tracing::warn!(
                    channel = %frame.channel,
                    backlog = self.tx.len(),
                    "frame queue congested; producer pausing"
                );
                congested = true;
            }
            if self.is_closed() || wait(self.pause) {
                return Err(PushError::Closed(frame));
            }
        }
        if self.is_closed() {
            return Err(PushError::Closed(frame));
        }
        self.tx
            .send(frame)
            .map_err(|e| PushError::Closed(e.into_inner()))
    }

    /// Stop accepting frames. Frames already queued stay readable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn backlog(&self) -> usize {
        self.tx.len()
    }
}

#[derive(Debug)]
pub struct FrameReceiver {
    rx: xch::Receiver<RawFrame>,
    closed: Arc<AtomicBool>,
    soft_limit: usize,
    pause: Duration,
}

impl FrameReceiver {
    pub fn receiver(&self) -> &xch::Receiver<RawFrame> {
        &self.rx
    }

    pub fn try_recv(&self) -> Option<RawFrame> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, d: Duration) -> Option<RawFrame> {
        self.rx.recv_timeout(d).ok()
    }

    pub fn backlog(&self) -> usize {
        self.rx.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The consumer side of the backpressure policy: one short pause when congested.
    /// Returns true if it paused.
    pub fn pause_if_congested(&self) -> bool {
        if self.rx.len() > self.soft_limit {
            tracing::debug!(backlog = self.rx.len(), "frame queue congested; consumer pausing");
            std::thread::sleep(self.pause);
            true
        } else {
            false
        }
    }
}
