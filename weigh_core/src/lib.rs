#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Weight acquisition core (transport-agnostic).
//!
//! Scales are reached through `weigh_traits::LinkConnector`; everything else is
//! plain threads and crossbeam channels.
//!
//! ## Pipeline
//!
//! ```text
//! DeviceChannel (1 thread / scale) ─┐
//! DeviceChannel ────────────────────┼─> FrameIngestQueue ─> StabilizationEngine ─> WeightEventBus ─> subscribers
//! DeviceChannel ────────────────────┘         (1 consumer thread)                      (e.g. CaptureStateMachine)
//!
//! ReconnectionSupervisor (1 thread) ── scans ChannelRegistry, reopens dead channels
//! ```
//!
//! ## Weights
//!
//! Weights are exact decimals (`rust_decimal::Decimal`) parsed in an invariant
//! format: no float rounding, no locale.
//!
//! ## Example
//!
//! ```no_run
//! use weigh_core::{Acquisition, DeviceConfig};
//! use weigh_hardware::SerialPortConnector;
//!
//! # fn main() -> eyre::Result<()> {
//! let mut acq = Acquisition::builder()
//!     .with_connector(SerialPortConnector)
//!     .build()?;
//! acq.subscribe(|ev| println!("{} = {}", ev.weight.channel, ev.weight.value));
//! let report = acq.start(&[DeviceConfig::new("B1", "/dev/ttyUSB0", 9600)])?;
//! println!("started: {:?}", report.started);
//! acq.stop();
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod builder;
pub mod bus;
pub mod capture;
pub mod channel;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod ingest;
pub mod mocks;
pub mod registry;
pub mod shutdown;
pub mod stabilizer;
pub mod status;
pub mod supervisor;
pub mod types;

pub use acquisition::{Acquisition, StartReport};
pub use builder::AcquisitionBuilder;
pub use bus::{SubscriptionId, WeightEventBus};
pub use capture::{CaptureOutcome, CaptureSnapshot, CaptureState, CaptureStateMachine};
pub use channel::DeviceChannel;
pub use config::{AcquisitionCfg, DeviceConfig};
pub use error::{AcquisitionError, BuildError, DeviceRejected, Report, Result};
pub use ingest::{FrameIngestQueue, FrameReceiver, FrameSender, PushError};
pub use registry::ChannelRegistry;
pub use rust_decimal::Decimal;
pub use stabilizer::{StabilizationEngine, TokenHistory};
pub use status::ChannelStatus;
pub use supervisor::ReconnectionSupervisor;
pub use types::{ChannelId, RawFrame, StableWeight, WeightEvent};
