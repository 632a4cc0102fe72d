//! Debounced watch loop and notify bridge.
//!
//! The loop consumes raw filesystem signals from an `mpsc` channel rather
//! than from notify directly, so tests (and demos) can drive it without a
//! real filesystem watcher. A burst of N raw signals arriving within the
//! coalescing window triggers exactly one rebuild+diff cycle, comparing the
//! snapshot before the burst to the snapshot after the burst settles.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use stagehand_core::{AppSnapshot, ChangeEvent, ExtensionLoader, ShutdownSignal};

use crate::classify;
use crate::error::WatchError;

/// Default coalescing window for filesystem signal bursts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// One raw filesystem signal, before debouncing and classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignal {
    pub path: PathBuf,
}

/// One settled watch cycle: the post-settle snapshot plus the events implied
/// by comparing it to the pre-burst snapshot.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub snapshot: Arc<AppSnapshot>,
    pub events: Vec<ChangeEvent>,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchConfig {
    pub debounce: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// The rebuild+diff coordinator.
///
/// Single owner of the previous [`AppSnapshot`]: the snapshot is replaced
/// wholesale each cycle, never patched in place, so consumers of emitted
/// events always see a complete, consistent value.
pub struct WatchLoop {
    loader: Arc<dyn ExtensionLoader>,
    events_tx: mpsc::Sender<WatchEvent>,
    subscribers: broadcast::Sender<WatchEvent>,
    config: WatchConfig,
}

impl WatchLoop {
    pub fn new(
        loader: Arc<dyn ExtensionLoader>,
        events_tx: mpsc::Sender<WatchEvent>,
        subscribers: broadcast::Sender<WatchEvent>,
        config: WatchConfig,
    ) -> Self {
        Self {
            loader,
            events_tx,
            subscribers,
            config,
        }
    }

    /// Run until the raw-signal channel closes or `shutdown` fires.
    ///
    /// Performs one initial rebuild immediately (`previous = None`, so every
    /// extension is reported as created) — this is what drives the initial
    /// session push downstream.
    pub async fn run(
        self,
        mut raw_rx: mpsc::UnboundedReceiver<RawSignal>,
        shutdown: ShutdownSignal,
    ) -> Result<(), WatchError> {
        let mut previous: Option<Arc<AppSnapshot>> = None;

        self.cycle(&mut previous).await?;

        'outer: loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = raw_rx.recv() => {
                    let Some(signal) = signal else { break };
                    tracing::trace!(path = %signal.path.display(), "raw filesystem signal");

                    // Burst began: absorb further signals until the stream
                    // has been quiet for one debounce window.
                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => break 'outer,
                            more = tokio::time::timeout(self.config.debounce, raw_rx.recv()) => {
                                match more {
                                    Ok(Some(_)) => continue,
                                    Ok(None) => break 'outer,
                                    Err(_elapsed) => break,
                                }
                            }
                        }
                    }

                    self.cycle(&mut previous).await?;
                }
            }
        }

        Ok(())
    }

    /// One rebuild+diff cycle. `LoadError` keeps the last good snapshot and
    /// the watch alive; only channel breakage is fatal.
    async fn cycle(&self, previous: &mut Option<Arc<AppSnapshot>>) -> Result<(), WatchError> {
        let snapshot = match self.loader.load().await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(err) => {
                tracing::warn!(error = %err, "extension reload failed; keeping last good snapshot");
                return Ok(());
            }
        };

        let events = classify::diff(previous.as_deref(), &snapshot);
        *previous = Some(snapshot.clone());

        if events.is_empty() {
            return Ok(());
        }

        tracing::debug!(events = events.len(), "watch cycle settled");
        let event = WatchEvent { snapshot, events };
        // No external subscribers is fine; the synchronizer channel closing
        // is not — the session is gone.
        let _ = self.subscribers.send(event.clone());
        self.events_tx
            .send(event)
            .await
            .map_err(|_| WatchError::ChannelClosed("watch events"))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notify bridge
// ---------------------------------------------------------------------------

/// Bridges a real notify watcher into the raw-signal channel. Keep the value
/// alive for as long as watching should continue.
pub struct FsBridge {
    _watcher: RecommendedWatcher,
}

impl FsBridge {
    /// Watch `root` recursively, forwarding relevant events as raw signals.
    pub fn start(root: &Path, tx: mpsc::UnboundedSender<RawSignal>) -> Result<Self, WatchError> {
        let mut watcher = recommended_watcher(move |event: notify::Result<Event>| {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "watcher event error");
                    return;
                }
            };
            for signal in raw_signals(&event) {
                let _ = tx.send(signal);
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), "watching extension tree");
        Ok(Self { _watcher: watcher })
    }
}

/// Filter a notify event down to the raw signals the loop cares about.
pub fn raw_signals(event: &Event) -> Vec<RawSignal> {
    if !is_relevant_event_kind(&event.kind) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .map(|path| RawSignal { path: path.clone() })
        .collect()
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
