//! Test and helper mocks for weigh_core

use weigh_traits::{LinkConnector, LinkError, PortSettings, SerialLink};

/// A link that is open but never has anything to say.
#[derive(Debug, Default)]
pub struct NoopLink {
    closed: bool,
}

impl SerialLink for NoopLink {
    fn read_available(&mut self) -> Result<String, LinkError> {
        if self.closed {
            return Err(Box::new(std::io::Error::other("noop link closed")));
        }
        Ok(String::new())
    }

    fn clear_buffers(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// A connector that refuses every port, e.g. for building an acquisition that only
/// exercises the disconnected path.
#[derive(Debug, Default, Clone, Copy)]
pub struct RefusingConnector;

impl LinkConnector for RefusingConnector {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialLink + Send>, LinkError> {
        Err(Box::new(std::io::Error::other(format!(
            "{}: connection refused",
            settings.port
        ))))
    }
}

/// A connector handing out `NoopLink`s for any port.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConnector;

impl LinkConnector for NoopConnector {
    fn open(&self, _settings: &PortSettings) -> Result<Box<dyn SerialLink + Send>, LinkError> {
        Ok(Box::new(NoopLink::default()))
    }
}
