//! Platform client seam and push payload.
//!
//! The remote session always receives full current state, never a per-event
//! patch: pushes are idempotent by content, which makes synchronization
//! self-healing after a missed or failed push. The payload carries a content
//! digest so a repeated push of identical state is a legal no-op at the
//! remote boundary.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stagehand_core::{AppSnapshot, Digest, ExtensionKind};

use crate::error::RemoteSessionError;

/// Full-state manifest of one app snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub app: String,
    pub extensions: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub handle: String,
    pub kind: ExtensionKind,
    pub config_hash: Digest,
    pub source_hashes: BTreeMap<PathBuf, Digest>,
}

impl SessionManifest {
    pub fn from_snapshot(snapshot: &AppSnapshot) -> Self {
        Self {
            app: snapshot.name.clone(),
            extensions: snapshot
                .extensions
                .values()
                .map(|ext| ManifestEntry {
                    handle: ext.handle.0.clone(),
                    kind: ext.kind.clone(),
                    config_hash: ext.config_hash.clone(),
                    source_hashes: ext.source_hashes.clone(),
                })
                .collect(),
        }
    }
}

/// What actually goes over the wire: the serialized manifest plus its
/// content digest (the bundle identity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPayload {
    pub manifest: SessionManifest,
    pub checksum: Digest,
}

impl SessionPayload {
    pub fn from_snapshot(snapshot: &AppSnapshot) -> Self {
        let manifest = SessionManifest::from_snapshot(snapshot);
        // BTreeMap-backed manifest serializes deterministically, so the
        // checksum is stable for identical content.
        let serialized =
            serde_json::to_string(&manifest).unwrap_or_else(|_| String::from("{}"));
        Self {
            manifest,
            checksum: Digest::of_str(&serialized),
        }
    }
}

/// Successful push acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushReceipt {
    pub preview_url: String,
}

/// Pushes dev session updates to the remote platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn push_dev_session_update(
        &self,
        payload: &SessionPayload,
    ) -> Result<PushReceipt, RemoteSessionError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
