//! Transports for scale lines: real serial ports and scripted simulations.
pub mod error;
pub mod serial;
pub mod simulated;

pub use error::HwError;
pub use serial::{SerialPortConnector, SerialPortLink, available_ports};
pub use simulated::{SimulatedConnector, SimulatedLink, SimulatedPort};
