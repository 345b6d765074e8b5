pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// Error type carried across the transport trait boundary.
pub type LinkError = Box<dyn std::error::Error + Send + Sync>;

/// Everything needed to open one scale's serial line (8-N-1 is implied).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    pub port: String,
    pub baud_rate: u32,
    /// Upper bound for a single blocking read.
    pub read_timeout: Duration,
}

impl PortSettings {
    pub fn new(port: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout,
        }
    }
}

/// An open transport to one scale.
pub trait SerialLink {
    /// Drain whatever text is currently buffered; an empty string means nothing arrived.
    fn read_available(&mut self) -> Result<String, LinkError>;
    /// Discard pending input and output in the device buffers.
    fn clear_buffers(&mut self) -> Result<(), LinkError>;
    /// False once the line was closed or went broken.
    fn is_open(&self) -> bool;
    /// Release the transport. Calling it twice is a no-op.
    fn close(&mut self);
}

/// Opens transports; shared by the acquisition start path and the reconnection supervisor.
pub trait LinkConnector {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialLink + Send>, LinkError>;
}

impl<T: LinkConnector + ?Sized> LinkConnector for std::sync::Arc<T> {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialLink + Send>, LinkError> {
        (**self).open(settings)
    }
}
