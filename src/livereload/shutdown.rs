//! Cooperative cancellation.
//!
//! One channel carries no messages at all: cancelling drops its only sender,
//! so every receiver (the watcher loop and each stream) observes the
//! disconnect inside its `select!` and returns.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

/// Cancels the live-reload engine. Cancelling more than once is a no-op.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: Mutex<Option<Sender<()>>>,
}

/// Observes cancellation.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

/// Create a connected trigger / signal pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = channel::bounded(0);
    (
        ShutdownTrigger {
            tx: Mutex::new(Some(tx)),
        },
        ShutdownSignal { rx },
    )
}

impl ShutdownTrigger {
    pub fn cancel(&self) {
        if self.tx.lock().take().is_some() {
            crate::debug!("reload"; "live reload cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl ShutdownSignal {
    /// Receiver to use in `select!`; it only ever yields a disconnect.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.rx.try_recv(),
            Err(channel::TryRecvError::Disconnected)
        )
    }
}
