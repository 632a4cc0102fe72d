//! The dev engine: start/stop lifecycle around one supervised session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use stagehand_core::{
    Backoff, DevSessionStatus, ExtensionLoader, ShutdownSignal,
};
use stagehand_session::{PlatformClient, StatusManager, Synchronizer};
use stagehand_supervisor::{
    LineSink, ProcessDescriptor, Supervisor, SupervisorError, TaskContext, TaskError,
    TaskFuture, TaskOutcome,
};
use stagehand_watch::{FsBridge, RawSignal, WatchConfig, WatchEvent, WatchLoop};

use crate::error::EngineError;

const EVENT_CHANNEL_CAPACITY: usize = 16;
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 64;

/// Configuration for one dev session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory whose extension tree is watched with a real filesystem
    /// watcher. `None` leaves the engine driven purely by injected raw
    /// signals (tests, demos).
    pub watch_root: Option<PathBuf>,
    pub watch: WatchConfig,
    pub backoff: Backoff,
    /// Grace period the supervisor gives sibling tasks after a failure.
    pub grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            watch_root: None,
            watch: WatchConfig::default(),
            backoff: Backoff::default(),
            grace: stagehand_supervisor::DEFAULT_GRACE,
        }
    }
}

/// A running dev session.
///
/// Everything inside shares one [`ShutdownSignal`]; [`DevEngine::stop`]
/// cancels it and joins the whole task set. Dropping the engine without
/// stopping leaves the supervised tasks to observe the signal on their own.
pub struct DevEngine {
    shutdown: ShutdownSignal,
    status: Arc<StatusManager>,
    subscribers: broadcast::Sender<WatchEvent>,
    raw_tx: mpsc::UnboundedSender<RawSignal>,
    runner: Option<JoinHandle<Result<Vec<TaskOutcome>, SupervisorError>>>,
    _bridge: Option<FsBridge>,
}

impl DevEngine {
    /// Start watching, synchronizing, and every auxiliary process.
    pub fn start(
        loader: Arc<dyn ExtensionLoader>,
        client: Arc<dyn PlatformClient>,
        sink: Arc<dyn LineSink>,
        auxiliary: Vec<ProcessDescriptor>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let shutdown = ShutdownSignal::new();
        let status = Arc::new(StatusManager::new());
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (subscribers, _) = broadcast::channel(SUBSCRIBER_CHANNEL_CAPACITY);

        let bridge = match &config.watch_root {
            Some(root) => Some(FsBridge::start(root, raw_tx.clone())?),
            None => None,
        };

        let watch_loop = WatchLoop::new(loader, events_tx, subscribers.clone(), config.watch);
        let synchronizer = Synchronizer::new(client, status.clone(), config.backoff);

        let mut descriptors = Vec::with_capacity(auxiliary.len() + 2);
        descriptors.push(ProcessDescriptor::new(
            "file-watcher",
            "watcher",
            move |ctx: TaskContext| {
                Box::pin(async move {
                    watch_loop
                        .run(raw_rx, ctx.shutdown)
                        .await
                        .map_err(|err| TaskError::fatal(err.to_string()))
                }) as TaskFuture
            },
        ));
        descriptors.push(ProcessDescriptor::new(
            "dev-session",
            "extensions",
            move |ctx: TaskContext| {
                Box::pin(async move {
                    synchronizer.run(events_rx, ctx.shutdown, ctx.output).await;
                    Ok(())
                }) as TaskFuture
            },
        ));
        descriptors.extend(auxiliary);

        let supervisor = Supervisor::new(shutdown.clone(), sink).with_grace(config.grace);
        let runner = tokio::spawn(supervisor.run(descriptors));
        tracing::info!("dev session engine started");

        Ok(Self {
            shutdown,
            status,
            subscribers,
            raw_tx,
            runner: Some(runner),
            _bridge: bridge,
        })
    }

    /// Read-only copy of the current session status.
    pub fn status(&self) -> DevSessionStatus {
        self.status.current()
    }

    /// Subscription that wakes only when the status actually changes.
    pub fn on_status_change(&self) -> watch::Receiver<DevSessionStatus> {
        self.status.subscribe()
    }

    /// Subscription to settled change-event batches (loggers, demos).
    pub fn on_change_events(&self) -> broadcast::Receiver<WatchEvent> {
        self.subscribers.subscribe()
    }

    /// Manual raw-signal injection: drives the debounced watch loop without
    /// a filesystem watcher.
    pub fn raw_signal_sender(&self) -> mpsc::UnboundedSender<RawSignal> {
        self.raw_tx.clone()
    }

    /// Clone of the session's cancellation signal, for external triggers
    /// (ctrl-c handlers).
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Cancel the session and join every task. Calling stop twice is a
    /// no-op.
    pub async fn stop(&mut self) -> Result<(), EngineError> {
        self.shutdown.cancel();
        let Some(runner) = self.runner.take() else {
            return Ok(());
        };
        let outcomes = runner
            .await
            .map_err(|err| EngineError::Join(err.to_string()))??;
        tracing::info!(tasks = outcomes.len(), "dev session stopped");
        Ok(())
    }

    /// Wait for the session to end on its own (task failure or external
    /// cancel). Surfaces the originating task error.
    pub async fn join(mut self) -> Result<(), EngineError> {
        let Some(runner) = self.runner.take() else {
            return Ok(());
        };
        runner
            .await
            .map_err(|err| EngineError::Join(err.to_string()))??;
        Ok(())
    }
}
