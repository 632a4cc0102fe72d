//! # stagehand-supervisor
//!
//! Runs a set of named long-lived tasks concurrently under one shared
//! cancellation signal, multiplexing labeled line output and surfacing
//! per-task failure. The first unrecoverable task error cancels the shared
//! signal, waits a bounded grace period for the rest to exit, and is then
//! re-raised to the caller.

pub mod error;
pub mod output;
pub mod process;
pub mod supervisor;

pub use error::SupervisorError;
pub use output::{LineSink, OutputHandle, OutputLine};
pub use process::{Outcome, ProcessDescriptor, TaskContext, TaskError, TaskFuture, TaskOutcome};
pub use supervisor::{Supervisor, DEFAULT_GRACE};
