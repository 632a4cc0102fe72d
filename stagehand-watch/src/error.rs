use thiserror::Error;

/// Error surface for the watch loop and the notify bridge.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("load error: {0}")]
    Load(#[from] stagehand_core::LoadError),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}
