use thiserror::Error;

use crate::process::TaskError;

/// Error surface for a supervisor run.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A supervised task died; fatal to the whole session.
    #[error("task '{id}' failed: {source}")]
    TaskFailed {
        id: String,
        #[source]
        source: TaskError,
    },

    /// Task join plumbing failure (panicked task, runtime teardown).
    #[error("task '{id}' join failure: {message}")]
    Join { id: String, message: String },
}
