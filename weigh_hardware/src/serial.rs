//! Scale lines over a real serial port.
//!
//! Ports are opened 8-N-1 without flow control. A read drains the bytes the
//! driver reports as buffered until it reports none left, so a poll never waits
//! on a silent scale longer than the configured read timeout.

use std::io::Read;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use weigh_traits::{LinkConnector, LinkError, PortSettings, SerialLink};

use crate::error::{HwError, Result};

/// Bytes requested per read call while draining.
const READ_CHUNK: usize = 4096;

/// Read until `pending` reports nothing buffered. A timeout after some data
/// ends the drain; a timeout before any data is an error.
fn drain_all<R: Read>(
    reader: &mut R,
    mut pending: impl FnMut(&mut R) -> Result<u32>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let available = usize::try_from(pending(reader)?).unwrap_or(READ_CHUNK);
        if available == 0 {
            break;
        }
        let start = out.len();
        out.resize(start + available.min(READ_CHUNK), 0);
        let n = match reader.read(&mut out[start..]) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut && start > 0 => 0,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Err(HwError::Timeout),
            Err(e) => return Err(HwError::Io(e)),
        };
        out.truncate(start + n);
        if n == 0 {
            break;
        }
    }
    Ok(out)
}

pub struct SerialPortLink {
    name: String,
    port: Option<Box<dyn SerialPort>>,
    broken: bool,
}

impl SerialPortLink {
    pub fn open(settings: &PortSettings) -> Result<Self> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| HwError::Open {
                port: settings.port.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(port = %settings.port, baud = settings.baud_rate, "serial port opened");
        Ok(Self {
            name: settings.port.clone(),
            port: Some(port),
            broken: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn drain(&mut self) -> Result<String> {
        let port = self.port.as_mut().ok_or(HwError::Closed)?;
        let bytes = drain_all(port, |p| Ok(p.bytes_to_read()?))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Timeouts are expected on a quiet line; anything else means the line is gone.
    fn note_failure(&mut self, e: &HwError) {
        if !matches!(e, HwError::Timeout) {
            self.broken = true;
        }
    }
}

impl SerialLink for SerialPortLink {
    fn read_available(&mut self) -> std::result::Result<String, LinkError> {
        self.drain().map_err(|e| {
            self.note_failure(&e);
            Box::new(e) as LinkError
        })
    }

    fn clear_buffers(&mut self) -> std::result::Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(HwError::Closed)?;
        port.clear(ClearBuffer::All).map_err(|e| {
            let e = HwError::from(e);
            self.note_failure(&e);
            Box::new(e) as LinkError
        })
    }

    fn is_open(&self) -> bool {
        self.port.is_some() && !self.broken
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!(port = %self.name, "serial port closed");
        }
    }
}

impl Drop for SerialPortLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens `SerialPortLink`s by port name.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortConnector;

impl LinkConnector for SerialPortConnector {
    fn open(
        &self,
        settings: &PortSettings,
    ) -> std::result::Result<Box<dyn SerialLink + Send>, LinkError> {
        let link = SerialPortLink::open(settings)?;
        Ok(Box::new(link))
    }
}

/// Port names the OS currently exposes.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
