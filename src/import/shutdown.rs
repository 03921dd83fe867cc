//! Pipeline shutdown signal
//!
//! A single-writer, multi-reader flag that moves from `Running` to `Draining`
//! exactly once. Consumers stop only when the signal is draining *and* their
//! source channel is empty, so nothing already queued is lost.

use std::sync::Arc;

use tokio::sync::watch;

/// Pipeline lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Producers may still enqueue work
    Running,
    /// Intake has stopped growing; consumers finish what is queued
    Draining,
}

/// Cloneable handle to the shared shutdown state
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<ShutdownState>>,
    rx: watch::Receiver<ShutdownState>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ShutdownState::Running);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Move to `Draining`. Returns `true` only for the call that made the transition.
    pub fn begin_draining(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ShutdownState::Draining {
                false
            } else {
                *state = ShutdownState::Draining;
                true
            }
        })
    }

    pub fn state(&self) -> ShutdownState {
        *self.rx.borrow()
    }

    pub fn is_draining(&self) -> bool {
        self.state() == ShutdownState::Draining
    }

    /// Resolves once the signal is draining (immediately if it already is)
    pub async fn draining(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|state| *state == ShutdownState::Draining).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
