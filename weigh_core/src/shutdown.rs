//! Cancellation shared by every acquisition thread.
//!
//! The trigger side holds the only `Sender`; it never sends. Dropping it
//! disconnects every cloned `Receiver`, which wakes any thread parked in
//! `wait` or in a `select!` immediately instead of at its next tick.

use crossbeam_channel as xch;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    trigger: Mutex<Option<xch::Sender<()>>>,
    rx: xch::Receiver<()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = xch::bounded(0);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            trigger: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// A handle that observes this shutdown.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            flag: self.flag.clone(),
            rx: self.rx.clone(),
        }
    }

    /// Cancel. Safe to call more than once.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
        let sender = self
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    rx: xch::Receiver<()>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleep up to `d`; returns true as soon as shutdown is observed.
    pub fn wait(&self, d: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        match self.rx.recv_timeout(d) {
            Err(xch::RecvTimeoutError::Disconnected) => true,
            _ => self.is_triggered(),
        }
    }

    /// Like `wait`, but also wakes when `other` fires.
    pub fn wait_either(&self, other: &ShutdownSignal, d: Duration) -> bool {
        if self.is_triggered() || other.is_triggered() {
            return true;
        }
        xch::select! {
            recv(self.rx) -> _ => true,
            recv(other.rx) -> _ => true,
            default(d) => self.is_triggered() || other.is_triggered(),
        }
    }

    /// Receiver that disconnects on shutdown, for use in `select!`.
    pub fn receiver(&self) -> &xch::Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn wait_times_out_while_untriggered() {
        let s = Shutdown::new();
        let sig = s.signal();
        let t0 = Instant::now();
        assert!(!sig.wait(Duration::from_millis(20)));
        assert!(t0.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn trigger_wakes_waiters_promptly() {
        let s = Shutdown::new();
        let sig = s.signal();
        let waiter = std::thread::spawn(move || {
            let t0 = Instant::now();
            let fired = sig.wait(Duration::from_secs(10));
            (fired, t0.elapsed())
        });
        std::thread::sleep(Duration::from_millis(20));
        s.trigger();
        s.trigger();
        let (fired, waited) = waiter.join().unwrap();
        assert!(fired);
        assert!(waited < Duration::from_secs(2));
    }

    #[test]
    fn wait_either_observes_both_sides() {
        let global = Shutdown::new();
        let local = Shutdown::new();
        local.trigger();
        assert!(global.signal().wait_either(&local.signal(), Duration::from_secs(5)));
        assert!(!global.is_triggered());
    }
}
