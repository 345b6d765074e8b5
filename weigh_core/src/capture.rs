//! Two-phase weighing: first reading is the gross, second settles gross vs tare.
//!
//! The larger of the two readings always ends up as `bruto`, so `tara <= bruto`
//! holds after a completed capture and `neto = bruto - tara` is never negative.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::bus::{SubscriptionId, WeightEventBus};
use crate::types::{ChannelId, StableWeight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No gross captured yet.
    New,
    /// Gross set, tare still 0.
    FirstCaptured,
    /// Both readings taken; terminal until `reset`.
    SecondCaptured,
}

/// What a reading did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    FirstCapture,
    SecondCapture,
    IgnoredOtherChannel,
    IgnoredComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSnapshot {
    pub state: CaptureState,
    pub bruto: Option<Decimal>,
    pub tara: Decimal,
    /// `bruto - tara`; `None` until the first capture.
    pub neto: Option<Decimal>,
}

/// One weighing ticket bound to one channel.
#[derive(Debug, Clone)]
pub struct CaptureStateMachine {
    channel: ChannelId,
    state: CaptureState,
    bruto: Option<Decimal>,
    tara: Decimal,
}

impl CaptureStateMachine {
    pub fn new(channel: impl Into<ChannelId>) -> Self {
        Self {
            channel: channel.into(),
            state: CaptureState::New,
            bruto: None,
            tara: Decimal::ZERO,
        }
    }

    /// Feed a stable weight from the bus. Readings for other channels are ignored.
    pub fn on_weight(&mut self, w: &StableWeight) -> CaptureOutcome {
        if w.channel != self.channel {
            return CaptureOutcome::IgnoredOtherChannel;
        }
        self.capture(w.value)
    }

    /// Apply one reading of the bound channel.
    pub fn capture(&mut self, w: Decimal) -> CaptureOutcome {
        match (self.state, self.bruto) {
            (CaptureState::New, _) | (CaptureState::FirstCaptured, None) => {
                self.bruto = Some(w);
                self.tara = Decimal::ZERO;
                self.state = CaptureState::FirstCaptured;
                tracing::info!(channel = %self.channel, bruto = %w, "first capture");
                CaptureOutcome::FirstCapture
            }
            (CaptureState::FirstCaptured, Some(bruto)) => {
                if w > bruto {
                    self.tara = bruto;
                    self.bruto = Some(w);
                } else {
                    self.tara = w;
                }
                self.state = CaptureState::SecondCaptured;
                tracing::info!(
                    channel = %self.channel,
                    bruto = ?self.bruto,
                    tara = %self.tara,
                    "second capture"
                );
                CaptureOutcome::SecondCapture
            }
            (CaptureState::SecondCaptured, _) => {
                tracing::debug!(channel = %self.channel, weight = %w, "capture complete; reading ignored");
                CaptureOutcome::IgnoredComplete
            }
        }
    }

    /// Manual capture from a `latest_readings` map. `None` if the bound channel has no reading yet.
    pub fn capture_reading(&mut self, readings: &BTreeMap<String, Decimal>) -> Option<CaptureOutcome> {
        let w = *readings.get(self.channel.as_str())?;
        Some(self.capture(w))
    }

    /// Start a new ticket on the same channel.
    pub fn reset(&mut self) {
        self.state = CaptureState::New;
        self.bruto = None;
        self.tara = Decimal::ZERO;
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            state: self.state,
            bruto: self.bruto,
            tara: self.tara,
            neto: self.neto(),
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn bruto(&self) -> Option<Decimal> {
        self.bruto
    }

    pub fn tara(&self) -> Decimal {
        self.tara
    }

    pub fn neto(&self) -> Option<Decimal> {
        self.bruto.map(|b| b.saturating_sub(self.tara))
    }

    pub fn has_first_capture(&self) -> bool {
        self.state != CaptureState::New
    }

    pub fn is_complete(&self) -> bool {
        self.state == CaptureState::SecondCaptured
    }

    /// Drive a shared machine from a bus; callbacks run on the stabilization thread.
    pub fn attach(machine: &Arc<Mutex<Self>>, bus: &WeightEventBus) -> SubscriptionId {
        let machine = Arc::clone(machine);
        bus.subscribe(move |ev| {
            machine
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .on_weight(&ev.weight);
        })
    }
}
