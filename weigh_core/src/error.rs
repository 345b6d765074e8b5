use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timeout waiting for scale")]
    Timeout,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("channel closed")]
    Closed,
    #[error("no device could be started")]
    NoDevices,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing link connector")]
    MissingConnector,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// A device entry refused at start; the remaining devices still run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("device {name} rejected: {reason}")]
pub struct DeviceRejected {
    pub name: String,
    pub reason: String,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
