//! Dev session synchronizer.
//!
//! Single-owner coordinator task: watch events arrive as messages, the push
//! runs inline, and anything that queued up during a push is collapsed down
//! to the latest snapshot afterwards. That enforces both invariants from one
//! place — at most one push in flight per app, and at most one pending
//! follow-up (never a queue) — and means a later cycle's push can never be
//! reordered behind an earlier one.

use std::sync::Arc;

use tokio::sync::mpsc;

use stagehand_core::{AppSnapshot, Backoff, ShutdownSignal, StatusPatch};
use stagehand_supervisor::OutputHandle;
use stagehand_watch::WatchEvent;

use crate::client::{PlatformClient, PushReceipt, SessionPayload};
use crate::error::RemoteSessionError;
use crate::status::StatusManager;

/// Synchronizer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Ready,
    Failed,
}

pub struct Synchronizer {
    client: Arc<dyn PlatformClient>,
    status: Arc<StatusManager>,
    backoff: Backoff,
    state: SyncState,
    ever_pushed: bool,
}

impl Synchronizer {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        status: Arc<StatusManager>,
        backoff: Backoff,
    ) -> Self {
        Self {
            client,
            status,
            backoff,
            state: SyncState::Idle,
            ever_pushed: false,
        }
    }

    /// Run until the event channel closes or `shutdown` fires.
    ///
    /// Cancellation aborts an in-flight push (and its backoff sleeps)
    /// promptly: the whole retry future races against the signal.
    pub async fn run(
        mut self,
        mut events_rx: mpsc::Receiver<WatchEvent>,
        shutdown: ShutdownSignal,
        output: OutputHandle,
    ) {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if event.events.is_empty() {
                continue;
            }

            let mut snapshot = event.snapshot;
            // Collapse any backlog that accumulated before we got scheduled.
            if let Some(latest) = drain_to_latest(&mut events_rx) {
                snapshot = latest;
            }

            loop {
                self.transition(SyncState::Syncing);
                let pushed = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    result = self.push_with_retry(&snapshot) => result,
                };

                match pushed {
                    Ok(receipt) => self.on_push_success(&receipt),
                    Err(err) => self.on_push_failure(err, &output).await,
                }

                // Exactly one follow-up push with whatever is newest now;
                // intermediate snapshots are dropped.
                match drain_to_latest(&mut events_rx) {
                    Some(latest) => snapshot = latest,
                    None => break,
                }
            }
        }
        tracing::debug!("synchronizer stopped");
    }

    fn on_push_success(&mut self, receipt: &PushReceipt) {
        self.transition(SyncState::Ready);
        self.ever_pushed = true;
        self.status
            .update(StatusPatch::ready(receipt.preview_url.clone()));
    }

    async fn on_push_failure(&mut self, err: RemoteSessionError, output: &OutputHandle) {
        self.transition(SyncState::Failed);
        // A single failed cycle does not invalidate a previously published
        // preview; the last-known-good session remains usable and the next
        // file change retries from scratch.
        tracing::warn!(error = %err, "dev session push failed; will retry on next change");
        output
            .write_line(format!("dev session update failed: {err}"))
            .await;
        if !self.ever_pushed {
            tracing::warn!("dev session has never been created; preview unavailable");
        }
    }

    /// One push cycle: retry retryable errors under the backoff budget, bail
    /// immediately on non-retryable ones.
    async fn push_with_retry(
        &self,
        snapshot: &AppSnapshot,
    ) -> Result<PushReceipt, RemoteSessionError> {
        let payload = SessionPayload::from_snapshot(snapshot);
        let mut delays = self.backoff.delays();
        let mut last_err = None;

        while let Some(delay) = delays.next() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.client.push_dev_session_update(&payload).await {
                Ok(receipt) => {
                    let report = delays.report();
                    tracing::debug!(
                        checksum = %payload.checksum,
                        attempts = report.iterations,
                        "dev session push accepted"
                    );
                    return Ok(receipt);
                }
                Err(err) if err.retryable() => {
                    tracing::debug!(error = %err, "push attempt failed; backing off");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            RemoteSessionError::transport("push budget exhausted before any attempt")
        }))
    }

    fn transition(&mut self, next: SyncState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "sync state transition");
            self.state = next;
        }
    }
}

/// Drain everything currently queued, keeping only the newest snapshot that
/// carries events.
fn drain_to_latest(events_rx: &mut mpsc::Receiver<WatchEvent>) -> Option<Arc<AppSnapshot>> {
    let mut latest = None;
    while let Ok(event) = events_rx.try_recv() {
        if !event.events.is_empty() {
            latest = Some(event.snapshot);
        }
    }
    latest
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use stagehand_core::{
        ChangeEvent, ChangeKind, Digest, ExtensionHandle, ExtensionKind, ExtensionSnapshot,
    };
    use stagehand_supervisor::OutputLine;

    struct MockClient {
        started: AtomicUsize,
        calls: Mutex<Vec<Digest>>,
        responses: Mutex<VecDeque<Result<PushReceipt, RemoteSessionError>>>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl MockClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                started: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
                responses: Mutex::new(VecDeque::new()),
                gate: Mutex::new(None),
            })
        }

        fn respond_with(&self, response: Result<PushReceipt, RemoteSessionError>) {
            self.responses.lock().expect("lock").push_back(response);
        }

        fn gate_first_call(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            *self.gate.lock().expect("lock") = Some(rx);
            tx
        }

        fn call_checksums(&self) -> Vec<Digest> {
            self.calls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl PlatformClient for MockClient {
        async fn push_dev_session_update(
            &self,
            payload: &SessionPayload,
        ) -> Result<PushReceipt, RemoteSessionError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().expect("lock").take();
            if let Some(rx) = gate {
                let _ = rx.await;
            }
            self.calls.lock().expect("lock").push(payload.checksum.clone());
            match self.responses.lock().expect("lock").pop_front() {
                Some(response) => response,
                None => Ok(PushReceipt {
                    preview_url: "https://preview.example".into(),
                }),
            }
        }
    }

    fn snapshot(config: &str) -> Arc<AppSnapshot> {
        let ext = ExtensionSnapshot {
            handle: ExtensionHandle::from("a"),
            kind: ExtensionKind::UiExtension,
            config_hash: Digest::of_str(config),
            source_hashes: BTreeMap::new(),
        };
        Arc::new(AppSnapshot::new("demo", "/tmp/demo", vec![ext]).expect("unique"))
    }

    fn watch_event(config: &str) -> WatchEvent {
        let snapshot = snapshot(config);
        let ext = snapshot
            .get(&ExtensionHandle::from("a"))
            .expect("ext")
            .clone();
        WatchEvent {
            events: vec![ChangeEvent::new(ChangeKind::Updated, ext)],
            snapshot,
        }
    }

    struct Harness {
        events_tx: mpsc::Sender<WatchEvent>,
        status: Arc<StatusManager>,
        shutdown: ShutdownSignal,
        lines_rx: mpsc::Receiver<OutputLine>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn start(client: Arc<MockClient>, backoff: Backoff) -> Harness {
        let (events_tx, events_rx) = mpsc::channel(16);
        let (lines_tx, lines_rx) = mpsc::channel(64);
        let status = Arc::new(StatusManager::new());
        let shutdown = ShutdownSignal::new();
        let synchronizer = Synchronizer::new(client, status.clone(), backoff);
        let output = OutputHandle::new("extensions", lines_tx);
        let handle = tokio::spawn(synchronizer.run(events_rx, shutdown.clone(), output));
        Harness {
            events_tx,
            status,
            shutdown,
            lines_rx,
            handle,
        }
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn successful_push_transitions_to_ready_with_preview_url() {
        let client = MockClient::new();
        let harness = start(client.clone(), Backoff::default());
        let mut status_rx = harness.status.subscribe();
        assert!(!harness.status.current().is_ready);

        harness.events_tx.send(watch_event("v1")).await.expect("send");

        status_rx.changed().await.expect("status change");
        let status = status_rx.borrow().clone();
        assert!(status.is_ready);
        assert_eq!(status.preview_url.as_deref(), Some("https://preview.example"));

        harness.shutdown.cancel();
        harness.handle.await.expect("join");
    }

    #[tokio::test]
    async fn pushes_requested_while_in_flight_collapse_to_latest() {
        let client = MockClient::new();
        let release = client.gate_first_call();
        let harness = start(client.clone(), Backoff::default());

        harness.events_tx.send(watch_event("v1")).await.expect("send");
        wait_for(|| client.started.load(Ordering::SeqCst) == 1).await;

        // Two more changes arrive while the first push is blocked.
        harness.events_tx.send(watch_event("v2")).await.expect("send");
        harness.events_tx.send(watch_event("v3")).await.expect("send");
        release.send(()).expect("release gate");

        wait_for(|| client.call_checksums().len() == 2).await;
        // Let any extra pushes surface before asserting.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let calls = client.call_checksums();
        assert_eq!(calls.len(), 2, "intermediate request must be collapsed");
        assert_eq!(calls[0], SessionPayload::from_snapshot(&snapshot("v1")).checksum);
        assert_eq!(calls[1], SessionPayload::from_snapshot(&snapshot("v3")).checksum);

        harness.shutdown.cancel();
        harness.handle.await.expect("join");
    }

    #[tokio::test]
    async fn retryable_failure_is_retried_under_backoff() {
        let client = MockClient::new();
        client.respond_with(Err(RemoteSessionError::transport("connection reset")));
        client.respond_with(Err(RemoteSessionError::transport("connection reset")));
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_millis(1));
        let harness = start(client.clone(), backoff);

        harness.events_tx.send(watch_event("v1")).await.expect("send");
        wait_for(|| harness.status.current().is_ready).await;
        assert_eq!(client.call_checksums().len(), 3);

        harness.shutdown.cancel();
        harness.handle.await.expect("join");
    }

    #[tokio::test]
    async fn non_retryable_failure_abandons_the_cycle() {
        let client = MockClient::new();
        client.respond_with(Err(RemoteSessionError::Unauthorized));
        let mut harness = start(client.clone(), Backoff::default());

        harness.events_tx.send(watch_event("v1")).await.expect("send");

        let line = harness.lines_rx.recv().await.expect("failure surfaced");
        assert!(line.line.contains("dev session update failed"));
        assert_eq!(client.call_checksums().len(), 1, "no retry for auth errors");
        assert!(!harness.status.current().is_ready);

        harness.shutdown.cancel();
        harness.handle.await.expect("join");
    }

    #[tokio::test]
    async fn failure_after_success_keeps_last_known_good_preview() {
        let client = MockClient::new();
        let harness = start(client.clone(), Backoff::default());

        harness.events_tx.send(watch_event("v1")).await.expect("send");
        wait_for(|| harness.status.current().is_ready).await;

        client.respond_with(Err(RemoteSessionError::Platform {
            message: "invalid config".into(),
            retryable: false,
        }));
        harness.events_tx.send(watch_event("v2")).await.expect("send");
        wait_for(|| client.call_checksums().len() == 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let status = harness.status.current();
        assert!(status.is_ready, "one failed cycle must not clear readiness");
        assert_eq!(status.preview_url.as_deref(), Some("https://preview.example"));

        harness.shutdown.cancel();
        harness.handle.await.expect("join");
    }

    #[tokio::test]
    async fn empty_event_lists_are_ignored() {
        let client = MockClient::new();
        let harness = start(client.clone(), Backoff::default());

        harness
            .events_tx
            .send(WatchEvent {
                snapshot: snapshot("v1"),
                events: Vec::new(),
            })
            .await
            .expect("send");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(client.call_checksums().is_empty());
        assert!(!harness.status.current().is_ready);

        harness.shutdown.cancel();
        harness.handle.await.expect("join");
    }

    #[tokio::test]
    async fn cancellation_aborts_an_in_flight_push() {
        let client = MockClient::new();
        let _release = client.gate_first_call();
        let harness = start(client.clone(), Backoff::default());

        harness.events_tx.send(watch_event("v1")).await.expect("send");
        wait_for(|| client.started.load(Ordering::SeqCst) == 1).await;

        harness.shutdown.cancel();
        // The blocked push is dropped, not awaited to completion.
        tokio::time::timeout(Duration::from_secs(1), harness.handle)
            .await
            .expect("synchronizer must stop promptly")
            .expect("join");
        assert!(client.call_checksums().is_empty());
    }
}
