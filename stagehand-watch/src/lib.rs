//! # stagehand-watch
//!
//! Filesystem activity → typed change events.
//!
//! [`classify::diff`] compares two app snapshots; [`watcher::WatchLoop`]
//! coalesces bursts of raw filesystem signals into single rebuild+diff
//! cycles and emits [`WatchEvent`]s; [`watcher::FsBridge`] feeds it from a
//! real notify watcher.

pub mod classify;
pub mod error;
pub mod watcher;

pub use classify::diff;
pub use error::WatchError;
pub use watcher::{FsBridge, RawSignal, WatchConfig, WatchEvent, WatchLoop};
