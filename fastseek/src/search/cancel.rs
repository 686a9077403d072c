use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Signal raised by [`CancellationGate::checkpoint`] once a search has been
/// canceled. Propagated with `?` through every traversal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation canceled")]
pub struct Canceled;

/// Shared one-way cancellation flag for a single search.
///
/// Clones share the same flag. Once [`request`](Self::request) has been
/// called the gate stays canceled; there is no way back to live.
#[derive(Debug, Clone, Default)]
pub struct CancellationGate {
    canceled: Arc<AtomicBool>,
}

impl CancellationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the gate. Repeated calls are no-ops.
    pub fn request(&self) {
        if !self.canceled.swap(true, Ordering::AcqRel) {
            debug!("Cancellation requested");
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Returns `Err(Canceled)` once the gate has been tripped
    pub fn checkpoint(&self) -> Result<(), Canceled> {
        if self.is_canceled() {
            Err(Canceled)
        } else {
            Ok(())
        }
    }
}

/// Caller-side handle that stops a running search
#[derive(Debug, Clone)]
pub struct StopHandle {
    gate: CancellationGate,
}

impl StopHandle {
    pub(crate) fn new(gate: CancellationGate) -> Self {
        Self { gate }
    }

    /// Requests cancellation. Does nothing if the search already finished
    /// or was already stopped.
    pub fn stop(&self) {
        self.gate.request();
    }

    pub fn is_stopped(&self) -> bool {
        self.gate.is_canceled()
    }
}
