use thiserror::Error;

/// Network/platform failure while pushing a dev session update.
///
/// Retryable errors are retried under one backoff run; non-retryable errors
/// abandon the current cycle (not the session — the next file change pushes
/// again from scratch).
#[derive(Debug, Error)]
pub enum RemoteSessionError {
    /// Transport-level failure (connection refused, timeout, 5xx).
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The platform rejected the update.
    #[error("platform rejected dev session update: {message}")]
    Platform { message: String, retryable: bool },

    /// The session token was rejected; retrying without a new token is
    /// pointless.
    #[error("session token rejected by the platform")]
    Unauthorized,
}

impl RemoteSessionError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn retryable(&self) -> bool {
        match self {
            RemoteSessionError::Transport { .. } => true,
            RemoteSessionError::Platform { retryable, .. } => *retryable,
            RemoteSessionError::Unauthorized => false,
        }
    }
}
