//! Scripted scale lines for tests, demos and the CLI `--simulate` mode.
//!
//! A `SimulatedPort` stands in for one physical port: chunks pushed into it are
//! handed out one per read, it can be unplugged and replugged, and it can be told
//! to refuse the next N opens. Each successful open bumps the port generation so
//! a link from before an unplug never comes back to life.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use weigh_traits::{LinkConnector, LinkError, PortSettings, SerialLink};

use crate::error::HwError;

#[derive(Debug, Default)]
struct PortState {
    pending: VecDeque<String>,
    present: bool,
    generation: u64,
    fail_opens: u32,
    opens: u32,
    clears: u32,
    last_baud: Option<u32>,
}

/// Control handle for one simulated port; clones share the same port.
#[derive(Debug, Clone)]
pub struct SimulatedPort {
    state: Arc<Mutex<PortState>>,
}

impl Default for SimulatedPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPort {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PortState {
                present: true,
                ..PortState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PortState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue one transmission; it is delivered by a single read.
    pub fn push(&self, chunk: impl Into<String>) {
        self.lock().pending.push_back(chunk.into());
    }

    /// Queue several transmissions in order.
    pub fn push_all<I, S>(&self, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut st = self.lock();
        st.pending.extend(chunks.into_iter().map(Into::into));
    }

    /// Cable pulled: the open link reports closed and opens fail until `replug`.
    pub fn unplug(&self) {
        self.lock().present = false;
    }

    pub fn replug(&self) {
        self.lock().present = true;
    }

    /// Refuse the next `n` open attempts even if the port is present.
    pub fn fail_next_opens(&self, n: u32) {
        self.lock().fail_opens = n;
    }

    /// Successful opens so far.
    pub fn open_count(&self) -> u32 {
        self.lock().opens
    }

    /// Buffer clears issued by readers so far.
    pub fn clear_count(&self) -> u32 {
        self.lock().clears
    }

    /// Transmissions not yet read.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn last_baud(&self) -> Option<u32> {
        self.lock().last_baud
    }

    fn open_link(&self, settings: &PortSettings) -> Result<SimulatedLink, HwError> {
        let mut st = self.lock();
        if !st.present {
            return Err(HwError::Open {
                port: settings.port.clone(),
                reason: "device not present".into(),
            });
        }
        if st.fail_opens > 0 {
            st.fail_opens -= 1;
            return Err(HwError::Open {
                port: settings.port.clone(),
                reason: "port busy".into(),
            });
        }
        st.generation += 1;
        st.opens += 1;
        st.last_baud = Some(settings.baud_rate);
        Ok(SimulatedLink {
            port: self.clone(),
            generation: st.generation,
            closed: false,
        })
    }
}

/// An open simulated line.
#[derive(Debug)]
pub struct SimulatedLink {
    port: SimulatedPort,
    generation: u64,
    closed: bool,
}

impl SimulatedLink {
    fn alive(&self, st: &PortState) -> bool {
        !self.closed && st.present && st.generation == self.generation
    }
}

impl SerialLink for SimulatedLink {
    fn read_available(&mut self) -> Result<String, LinkError> {
        let mut st = self.port.lock();
        if !self.alive(&st) {
            return Err(Box::new(HwError::Closed));
        }
        Ok(st.pending.pop_front().unwrap_or_default())
    }

    fn clear_buffers(&mut self) -> Result<(), LinkError> {
        let mut st = self.port.lock();
        if !self.alive(&st) {
            return Err(Box::new(HwError::Closed));
        }
        st.clears += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        let st = self.port.lock();
        self.alive(&st)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Connector over a set of named simulated ports.
#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    ports: Arc<Mutex<HashMap<String, SimulatedPort>>>,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port name and return its control handle. Re-adding returns the existing port.
    pub fn add_port(&self, name: impl Into<String>) -> SimulatedPort {
        let mut ports = self.ports.lock().unwrap_or_else(PoisonError::into_inner);
        ports.entry(name.into()).or_default().clone()
    }

    pub fn port(&self, name: &str) -> Option<SimulatedPort> {
        let ports = self.ports.lock().unwrap_or_else(PoisonError::into_inner);
        ports.get(name).cloned()
    }
}

impl LinkConnector for SimulatedConnector {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialLink + Send>, LinkError> {
        let port = self.port(&settings.port).ok_or_else(|| HwError::Open {
            port: settings.port.clone(),
            reason: "no such port".into(),
        })?;
        let link = port.open_link(settings)?;
        tracing::trace!(port = %settings.port, "simulated port opened");
        Ok(Box::new(link))
    }
}
