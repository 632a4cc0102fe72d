//! Process descriptors and task outcomes.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use stagehand_core::ShutdownSignal;

use crate::output::OutputHandle;

/// The boxed future a task body produces.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;

/// Everything a supervised task receives: the shared cancellation signal and
/// its labeled output writer. Cancellation is cooperative — the task must
/// observe `shutdown` at its suspension points.
pub struct TaskContext {
    pub shutdown: ShutdownSignal,
    pub output: OutputHandle,
}

/// Error a supervised task can die with.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Fatal(String),
}

impl TaskError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }
}

/// A named long-lived task. Immutable after registration; the supervisor
/// owns the collection for the lifetime of one dev session.
pub struct ProcessDescriptor {
    id: String,
    prefix: String,
    run: Box<dyn FnOnce(TaskContext) -> TaskFuture + Send>,
}

impl ProcessDescriptor {
    pub fn new(
        id: impl Into<String>,
        prefix: impl Into<String>,
        run: impl FnOnce(TaskContext) -> TaskFuture + Send + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            prefix: prefix.into(),
            run: Box::new(run),
        }
    }

    pub(crate) fn into_parts(self) -> (String, String, Box<dyn FnOnce(TaskContext) -> TaskFuture + Send>) {
        (self.id, self.prefix, self.run)
    }
}

impl std::fmt::Debug for ProcessDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessDescriptor")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// How a single task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Ran to completion without an error before any cancellation.
    Completed,
    /// Exited after observing the shared cancellation signal. Expected on
    /// user-initiated stop; never a failure.
    Cancelled,
    /// Died with an error (the message is kept; the originating error is
    /// re-raised through [`SupervisorError`]).
    ///
    /// [`SupervisorError`]: crate::SupervisorError
    Failed(String),
}

/// Aggregate per-task result of one supervisor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub id: String,
    pub outcome: Outcome,
}
