//! Error types for stagehand-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ExtensionHandle;

/// All errors that can arise while loading extension definitions from disk.
///
/// Load failures are propagated, never swallowed: the caller decides whether
/// to keep the previous snapshot and keep watching, or abort.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error in an extension config file.
    #[error("failed to parse extension config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Two extensions declared the same handle.
    #[error("duplicate extension handle '{handle}'")]
    DuplicateHandle { handle: ExtensionHandle },

    /// Loader task plumbing failure (blocking task join, etc.).
    #[error("loader internal error: {0}")]
    Internal(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> LoadError {
    LoadError::Io {
        path: path.into(),
        source,
    }
}
