use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("open {port}: {reason}")]
    Open { port: String, reason: String },
    #[error("serial read timeout")]
    Timeout,
    #[error("serial line closed")]
    Closed,
    #[error("serial: {0}")]
    Serial(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serialport::Error> for HwError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => HwError::Closed,
            serialport::ErrorKind::Io(std::io::ErrorKind::TimedOut) => HwError::Timeout,
            _ => HwError::Serial(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
