//! Cancellable handle to a running monitoring loop

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tokio::sync::Notify;
use tokio::task::{JoinError, JoinHandle};

/// Observable state of a monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// The loop is (or is about to start) checking for updates
    Running,
    /// The loop observed a cancellation request and stopped
    Cancelled,
    /// The store-build gate disabled monitoring at activation
    Gated,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Cancelled,
            2 => Self::Gated,
            _ => Self::Running,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Cancelled => 1,
            Self::Gated => 2,
        }
    }
}

/// State shared between a session handle and its loop
///
/// One per session; sessions never share flags.
#[derive(Debug, Default)]
pub(crate) struct SessionShared {
    cancel_requested: AtomicBool,
    wake: Notify,
    state: AtomicU8,
}

impl SessionShared {
    pub(crate) fn request_cancel(&self) {
        if !self.cancel_requested.swap(true, Ordering::SeqCst) {
            // notify_one keeps a permit when the loop is not sleeping yet
            self.wake.notify_one();
        }
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation has been requested
    pub(crate) async fn cancelled(&self) {
        while !self.cancel_requested() {
            self.wake.notified().await;
        }
    }

    pub(crate) fn finish(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

/// Handle to a running monitoring loop
///
/// Cancellation is cooperative: [`MonitorSession::cancel`] sets a flag the
/// loop observes before starting a check and before sleeping. A query that is
/// already in flight completes, and its update (if any) may still be delivered.
///
/// Dropping the handle does NOT stop the loop; only [`MonitorSession::cancel`]
/// does.
#[derive(Debug)]
pub struct MonitorSession {
    shared: Arc<SessionShared>,
    handle: JoinHandle<()>,
}

impl MonitorSession {
    pub(crate) fn new(shared: Arc<SessionShared>, handle: JoinHandle<()>) -> Self {
        Self { shared, handle }
    }

    /// Request the loop to stop
    ///
    /// Idempotent. Wakes the loop if it is waiting for the next check.
    pub fn cancel(&self) {
        self.shared.request_cancel();
    }

    /// Whether [`MonitorSession::cancel`] has been called
    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel_requested()
    }

    /// Current state as last recorded by the loop
    ///
    /// Stays `Running` after [`MonitorSession::cancel`] until the loop reaches
    /// its next control point.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Whether the loop task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to exit and return its final state
    ///
    /// Never returns for a session that was not cancelled or gated.
    /// Fails only if the update callback panicked.
    pub async fn wait(self) -> Result<SessionState, JoinError> {
        self.handle.await?;
        Ok(self.shared.state())
    }
}
