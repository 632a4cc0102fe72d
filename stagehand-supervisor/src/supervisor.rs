//! Concurrent task runner.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use stagehand_core::ShutdownSignal;

use crate::error::SupervisorError;
use crate::output::{drain_lines, LineSink, OutputHandle};
use crate::process::{Outcome, ProcessDescriptor, TaskContext, TaskError, TaskOutcome};

/// How long tasks get to observe cancellation after a sibling failure before
/// the supervisor aborts them outright.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Runs registered processes concurrently under one shared cancellation
/// signal.
pub struct Supervisor {
    shutdown: ShutdownSignal,
    sink: Arc<dyn LineSink>,
    grace: Duration,
}

impl Supervisor {
    pub fn new(shutdown: ShutdownSignal, sink: Arc<dyn LineSink>) -> Self {
        Self {
            shutdown,
            sink,
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Start every descriptor and wait for all of them to finish.
    ///
    /// The first task error (while cancellation had not yet been requested)
    /// cancels the shared signal, waits up to the grace period for the
    /// remaining tasks to exit cooperatively, aborts stragglers, and is
    /// re-raised as [`SupervisorError::TaskFailed`]. Tasks that exit because
    /// of an external cancel are reported as [`Outcome::Cancelled`], never
    /// as failures.
    pub async fn run(
        self,
        descriptors: Vec<ProcessDescriptor>,
    ) -> Result<Vec<TaskOutcome>, SupervisorError> {
        let (line_tx, line_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let sink_task = tokio::spawn(drain_lines(line_rx, self.sink.clone()));

        let mut set = JoinSet::new();
        let mut names: HashMap<tokio::task::Id, String> = HashMap::new();
        for descriptor in descriptors {
            let (id, prefix, run) = descriptor.into_parts();
            let ctx = TaskContext {
                shutdown: self.shutdown.clone(),
                output: OutputHandle::new(prefix, line_tx.clone()),
            };
            tracing::debug!(task = %id, "starting supervised task");
            let handle = set.spawn(run(ctx));
            names.insert(handle.id(), id);
        }
        // The supervisor holds no writer of its own; the sink drains once
        // every task (and its OutputHandle) is gone.
        drop(line_tx);

        let mut outcomes = Vec::new();
        let mut failure: Option<(String, TaskError)> = None;
        let mut join_failure: Option<(String, String)> = None;
        let mut aborted = false;

        loop {
            let next = if failure.is_some() && !aborted {
                match tokio::time::timeout(self.grace, set.join_next_with_id()).await {
                    Ok(next) => next,
                    Err(_elapsed) => {
                        tracing::warn!(
                            grace_ms = self.grace.as_millis() as u64,
                            "grace period elapsed; aborting remaining tasks"
                        );
                        set.abort_all();
                        aborted = true;
                        continue;
                    }
                }
            } else {
                set.join_next_with_id().await
            };
            let Some(joined) = next else { break };

            match joined {
                Ok((task_id, Ok(()))) => {
                    let id = names.remove(&task_id).unwrap_or_default();
                    let outcome = if self.shutdown.is_cancelled() {
                        Outcome::Cancelled
                    } else {
                        Outcome::Completed
                    };
                    tracing::debug!(task = %id, outcome = ?outcome, "supervised task exited");
                    outcomes.push(TaskOutcome { id, outcome });
                }
                Ok((task_id, Err(err))) => {
                    let id = names.remove(&task_id).unwrap_or_default();
                    outcomes.push(TaskOutcome {
                        id: id.clone(),
                        outcome: Outcome::Failed(err.to_string()),
                    });
                    if failure.is_none() && !self.shutdown.is_cancelled() {
                        tracing::error!(task = %id, error = %err, "supervised task failed; cancelling session");
                        self.shutdown.cancel();
                        failure = Some((id, err));
                    } else {
                        tracing::warn!(task = %id, error = %err, "task failed during shutdown");
                    }
                }
                Err(join_err) => {
                    let id = names.remove(&join_err.id()).unwrap_or_default();
                    if join_err.is_cancelled() {
                        outcomes.push(TaskOutcome {
                            id,
                            outcome: Outcome::Cancelled,
                        });
                    } else {
                        outcomes.push(TaskOutcome {
                            id: id.clone(),
                            outcome: Outcome::Failed(join_err.to_string()),
                        });
                        if failure.is_none() && join_failure.is_none() {
                            self.shutdown.cancel();
                            join_failure = Some((id, join_err.to_string()));
                        }
                    }
                }
            }
        }

        // Flush any output still in flight before reporting.
        let _ = sink_task.await;

        if let Some((id, source)) = failure {
            return Err(SupervisorError::TaskFailed { id, source });
        }
        if let Some((id, message)) = join_failure {
            return Err(SupervisorError::Join { id, message });
        }
        Ok(outcomes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
