//! Values flowing through the pipeline: raw frames in, stable weights out.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// Identity of one scale channel (the configured device name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One drained chunk of text from a device.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub channel: ChannelId,
    pub text: String,
    pub received_at: Instant,
}

/// A confirmed weight, emitted once per change of a channel's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableWeight {
    pub channel: ChannelId,
    pub value: Decimal,
    pub at: Instant,
}

/// What subscribers receive: the reading that changed plus every channel's latest value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightEvent {
    pub weight: StableWeight,
    pub readings: BTreeMap<String, Decimal>,
}
