//! # stagehand-session
//!
//! Keeps a remote dev session in sync with local extension state.
//!
//! The [`Synchronizer`] consumes settled watch events and performs
//! idempotent full-state pushes through a [`PlatformClient`]; the
//! [`StatusManager`] publishes observable readiness with change-only
//! notification.

pub mod client;
pub mod error;
pub mod status;
pub mod sync;

pub use client::{PlatformClient, PushReceipt, SessionManifest, SessionPayload};
pub use error::RemoteSessionError;
pub use status::StatusManager;
pub use sync::{SyncState, Synchronizer};
