//! Per-channel health as seen by callers.

/// Connection state of one configured device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub name: String,
    pub port: String,
    /// A read loop is running on an open transport.
    pub connected: bool,
    /// Reopen attempts made by the supervisor since start.
    pub reconnect_attempts: u32,
    /// Last open or transport failure, if any.
    pub last_error: Option<String>,
}
