//! Observable dev-session status.
//!
//! Small state container over a `tokio::sync::watch` channel. The manager
//! owns the single mutable [`DevSessionStatus`]; consumers hold receivers
//! and see immutable copies. Notifications fire only when an update actually
//! changes the merged state.

use tokio::sync::watch;

use stagehand_core::{DevSessionStatus, StatusPatch};

#[derive(Debug)]
pub struct StatusManager {
    tx: watch::Sender<DevSessionStatus>,
}

impl Default for StatusManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusManager {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(DevSessionStatus::default());
        Self { tx }
    }

    /// Merge `patch` field-by-field into the current state. Emits a change
    /// notification only when the merged result differs; otherwise a no-op
    /// (no notification, consumers' held copies untouched). Returns whether
    /// a notification was emitted.
    pub fn update(&self, patch: StatusPatch) -> bool {
        self.tx.send_if_modified(|current| {
            let merged = patch.apply(current);
            if merged == *current {
                false
            } else {
                tracing::debug!(
                    is_ready = merged.is_ready,
                    preview_url = merged.preview_url.as_deref().unwrap_or(""),
                    "dev session status changed"
                );
                *current = merged;
                true
            }
        })
    }

    /// Restore the initial state, emitting only if the prior state differed.
    pub fn reset(&self) -> bool {
        self.tx.send_if_modified(|current| {
            let initial = DevSessionStatus::default();
            if *current == initial {
                false
            } else {
                *current = initial;
                true
            }
        })
    }

    /// Read-only copy of the current state.
    pub fn current(&self) -> DevSessionStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DevSessionStatus> {
        self.tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
