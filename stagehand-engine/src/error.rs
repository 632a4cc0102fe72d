use thiserror::Error;

/// Error surface for engine startup and teardown.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("watch error: {0}")]
    Watch(#[from] stagehand_watch::WatchError),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] stagehand_supervisor::SupervisorError),

    #[error("engine join failure: {0}")]
    Join(String),
}
