//! # stagehand-engine
//!
//! Composition root for one dev session: wires the debounced watch loop,
//! the dev-session synchronizer, and any auxiliary processes (tunnel, log
//! polling) into a single supervised run under one cancellation signal.

mod engine;
mod error;

pub use engine::{DevEngine, EngineConfig};
pub use error::EngineError;
