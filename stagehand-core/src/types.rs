//! Domain types for the stagehand snapshot model.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem
//! paths. Snapshots are immutable: a change produces a new value, never a
//! mutation in place.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed extension handle — unique within one [`AppSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtensionHandle(pub String);

impl fmt::Display for ExtensionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ExtensionHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExtensionHandle {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Lowercase SHA-256 hex digest of file content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest(pub String);

impl Digest {
    /// Digest of a byte slice.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Digest of a UTF-8 string.
    pub fn of_str(content: &str) -> Self {
        Self::of_bytes(content.as_bytes())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The category of an extension. Categories only — the platform's business
/// semantics (what a valid config of each kind looks like) live server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    #[default]
    UiExtension,
    Function,
    FlowAction,
    ThemeApp,
    Unknown,
}

impl ExtensionKind {
    /// Parse a config-file `type` string; unrecognized values map to
    /// [`ExtensionKind::Unknown`] rather than failing the whole load.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "ui_extension" => ExtensionKind::UiExtension,
            "function" => ExtensionKind::Function,
            "flow_action" => ExtensionKind::FlowAction,
            "theme_app" => ExtensionKind::ThemeApp,
            _ => ExtensionKind::Unknown,
        }
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionKind::UiExtension => write!(f, "ui_extension"),
            ExtensionKind::Function => write!(f, "function"),
            ExtensionKind::FlowAction => write!(f, "flow_action"),
            ExtensionKind::ThemeApp => write!(f, "theme_app"),
            ExtensionKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// The type of a change detected between two snapshots.
///
/// `Updated` means only the configuration changed; `UpdatedSourceFile` means
/// a source file changed and a rebuild is required before the next push. The
/// two must never be collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Deleted,
    Updated,
    UpdatedSourceFile,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Updated => write!(f, "updated"),
            ChangeKind::UpdatedSourceFile => write!(f, "updated_source_file"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot model
// ---------------------------------------------------------------------------

/// Point-in-time model of a single extension: its config digest and the
/// digest of every source file, keyed by path relative to the extension root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSnapshot {
    pub handle: ExtensionHandle,
    pub kind: ExtensionKind,
    pub config_hash: Digest,
    pub source_hashes: BTreeMap<PathBuf, Digest>,
}

impl ExtensionSnapshot {
    /// True when both config and source digests match.
    pub fn content_eq(&self, other: &ExtensionSnapshot) -> bool {
        self.config_hash == other.config_hash && self.source_hashes == other.source_hashes
    }
}

/// Point-in-time model of all extensions in an app. Rebuilt wholesale on
/// every watch tick; the previous snapshot is retained only long enough to
/// compute a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSnapshot {
    pub name: String,
    /// Absolute path to the app root on disk.
    pub root: PathBuf,
    pub extensions: BTreeMap<ExtensionHandle, ExtensionSnapshot>,
}

impl AppSnapshot {
    /// Build a snapshot, enforcing handle uniqueness.
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        extensions: Vec<ExtensionSnapshot>,
    ) -> Result<Self, LoadError> {
        let mut map = BTreeMap::new();
        for ext in extensions {
            let handle = ext.handle.clone();
            if map.insert(handle.clone(), ext).is_some() {
                return Err(LoadError::DuplicateHandle { handle });
            }
        }
        Ok(Self {
            name: name.into(),
            root: root.into(),
            extensions: map,
        })
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn get(&self, handle: &ExtensionHandle) -> Option<&ExtensionSnapshot> {
        self.extensions.get(handle)
    }
}

/// A single typed change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub extension: ExtensionSnapshot,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, extension: ExtensionSnapshot) -> Self {
        Self {
            kind,
            extension,
            at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session status
// ---------------------------------------------------------------------------

/// Observable dev-session state. Consumers receive read-only copies; the
/// status manager owns the single mutable instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DevSessionStatus {
    pub is_ready: bool,
    pub preview_url: Option<String>,
}

/// Field-by-field partial update for [`DevSessionStatus`]. Absent fields
/// leave the current value untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusPatch {
    pub is_ready: Option<bool>,
    pub preview_url: Option<String>,
}

impl StatusPatch {
    pub fn ready(preview_url: impl Into<String>) -> Self {
        Self {
            is_ready: Some(true),
            preview_url: Some(preview_url.into()),
        }
    }

    /// Merge this patch over `current`, returning the merged value.
    pub fn apply(&self, current: &DevSessionStatus) -> DevSessionStatus {
        DevSessionStatus {
            is_ready: self.is_ready.unwrap_or(current.is_ready),
            preview_url: self
                .preview_url
                .clone()
                .or_else(|| current.preview_url.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(handle: &str, config: &str) -> ExtensionSnapshot {
        ExtensionSnapshot {
            handle: ExtensionHandle::from(handle),
            kind: ExtensionKind::UiExtension,
            config_hash: Digest::of_str(config),
            source_hashes: BTreeMap::new(),
        }
    }

    #[test]
    fn digest_is_stable_lowercase_hex() {
        let d = Digest::of_str("hello");
        assert_eq!(d, Digest::of_bytes(b"hello"));
        assert_eq!(d.0.len(), 64);
        assert_eq!(d.0, d.0.to_lowercase());
    }

    #[test]
    fn snapshot_rejects_duplicate_handles() {
        let err = AppSnapshot::new("app", "/tmp/app", vec![ext("a", "x"), ext("a", "y")])
            .expect_err("duplicate handles must fail");
        assert!(matches!(err, LoadError::DuplicateHandle { handle } if handle.0 == "a"));
    }

    #[test]
    fn content_eq_ignores_kind() {
        let mut a = ext("a", "cfg");
        let mut b = ext("a", "cfg");
        a.kind = ExtensionKind::Function;
        b.kind = ExtensionKind::UiExtension;
        assert!(a.content_eq(&b));
    }

    #[test]
    fn status_patch_merges_field_by_field() {
        let current = DevSessionStatus {
            is_ready: false,
            preview_url: Some("https://old.example".into()),
        };
        let merged = StatusPatch {
            is_ready: Some(true),
            preview_url: None,
        }
        .apply(&current);
        assert!(merged.is_ready);
        assert_eq!(merged.preview_url.as_deref(), Some("https://old.example"));
    }

    #[test]
    fn kind_parse_falls_back_to_unknown() {
        assert_eq!(ExtensionKind::parse("function"), ExtensionKind::Function);
        assert_eq!(ExtensionKind::parse("hologram"), ExtensionKind::Unknown);
    }
}
