//! Shared cancellation signal.
//!
//! One [`ShutdownSignal`] is created per dev session and a clone is threaded
//! into every long-lived task: the watch loop, the synchronizer's in-flight
//! push, and each supervised process. Cancellation is cooperative — tasks
//! observe it at suspension points via [`ShutdownSignal::cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Clonable, level-triggered cancellation handle.
///
/// Unlike a bare broadcast channel, late subscribers still observe a signal
/// that fired before they started waiting. Calling [`cancel`] twice is a
/// no-op.
///
/// [`cancel`]: ShutdownSignal::cancel
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation has been requested. Safe to call after the
    /// fact; resolves immediately in that case.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
