//! stagehand core library — domain types, loader, backoff, shutdown signal.
//!
//! Public API surface:
//! - [`types`] — snapshot model, change events, session status
//! - [`error`] — [`LoadError`]
//! - [`backoff`] — capped exponential retry delays
//! - [`loader`] — [`ExtensionLoader`] trait + filesystem implementation
//! - [`shutdown`] — [`ShutdownSignal`] shared cancellation handle

pub mod backoff;
pub mod error;
pub mod loader;
pub mod shutdown;
pub mod types;

pub use backoff::{Backoff, BackoffReport};
pub use error::LoadError;
pub use loader::{ExtensionLoader, FsExtensionLoader};
pub use shutdown::ShutdownSignal;
pub use types::{
    AppSnapshot, ChangeEvent, ChangeKind, DevSessionStatus, Digest, ExtensionHandle,
    ExtensionKind, ExtensionSnapshot, StatusPatch,
};
