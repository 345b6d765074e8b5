//! Type-state builder for `Acquisition`.
//!
//! `build()` is only available once a connector is set; `try_build()` is always
//! available and reports `BuildError::MissingConnector` at runtime instead.

use std::marker::PhantomData;
use std::sync::Arc;

use weigh_traits::{Clock, LinkConnector, MonotonicClock};

use crate::acquisition::Acquisition;
use crate::config::AcquisitionCfg;
use crate::error::{BuildError, Result};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct AcquisitionBuilder<C> {
    connector: Option<Arc<dyn LinkConnector + Send + Sync>>,
    config: Option<AcquisitionCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _c: PhantomData<C>,
}

impl Default for AcquisitionBuilder<Missing> {
    fn default() -> Self {
        Self {
            connector: None,
            config: None,
            clock: None,
            _c: PhantomData,
        }
    }
}

impl<C> AcquisitionBuilder<C> {
    /// Transport used to open every device (serial ports, simulation, mocks).
    pub fn with_connector<L>(self, connector: L) -> AcquisitionBuilder<Set>
    where
        L: LinkConnector + Send + Sync + 'static,
    {
        self.with_shared_connector(Arc::new(connector))
    }

    /// Like `with_connector`, keeping a handle for the caller.
    pub fn with_shared_connector(
        self,
        connector: Arc<dyn LinkConnector + Send + Sync>,
    ) -> AcquisitionBuilder<Set> {
        AcquisitionBuilder {
            connector: Some(connector),
            config: self.config,
            clock: self.clock,
            _c: PhantomData,
        }
    }

    pub fn with_config(mut self, config: AcquisitionCfg) -> Self {
        self.config = Some(config);
        self
    }

    /// Clock used to timestamp frames. Defaults to `MonotonicClock`.
    pub fn with_clock<K>(mut self, clock: K) -> Self
    where
        K: Clock + Send + Sync + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Build, checking at runtime that a connector was provided.
    pub fn try_build(self) -> Result<Acquisition> {
        let connector = self
            .connector
            .ok_or_else(|| eyre::Report::new(BuildError::MissingConnector))?;
        validate_and_build(connector, self.config.unwrap_or_default(), self.clock)
    }
}

impl AcquisitionBuilder<Set> {
    pub fn build(self) -> Result<Acquisition> {
        self.try_build()
    }
}

fn validate_and_build(
    connector: Arc<dyn LinkConnector + Send + Sync>,
    cfg: AcquisitionCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<Acquisition> {
    if cfg.poll_period.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "poll period must be > 0",
        )));
    }
    if cfg.read_timeout.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "read timeout must be > 0",
        )));
    }
    if cfg.reconnect_interval.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "reconnect interval must be > 0",
        )));
    }
    if cfg.queue_soft_limit == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "queue soft limit must be >= 1",
        )));
    }
    if cfg.history_capacity == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "history capacity must be >= 1",
        )));
    }
    let clock = clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
    Ok(Acquisition::from_parts(connector, cfg, clock))
}
