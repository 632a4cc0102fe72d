//! Extension definition loading.
//!
//! # Project layout
//!
//! ```text
//! <root>/
//!   extensions/
//!     <handle>/
//!       extension.toml      (config — digested as `config_hash`)
//!       src/…               (source files — digested per relative path)
//! ```
//!
//! [`ExtensionLoader`] is the seam the watch loop rebuilds snapshots
//! through; [`FsExtensionLoader`] is the production implementation. Tests
//! substitute in-memory loaders.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{io_err, LoadError};
use crate::types::{AppSnapshot, Digest, ExtensionHandle, ExtensionKind, ExtensionSnapshot};

/// Config file name expected in every extension directory.
pub const CONFIG_FILE: &str = "extension.toml";

/// Directories never treated as extension sources.
const IGNORED_DIRS: &[&str] = &["node_modules", "dist", "target", "build"];

/// Loads the current extension definitions as one [`AppSnapshot`].
#[async_trait]
pub trait ExtensionLoader: Send + Sync {
    async fn load(&self) -> Result<AppSnapshot, LoadError>;
}

/// Minimal view of an `extension.toml`. Everything else in the file only
/// matters to the remote platform and is covered by `config_hash`.
#[derive(Debug, Deserialize)]
struct ExtensionConfig {
    handle: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Filesystem loader rooted at an app directory.
#[derive(Debug, Clone)]
pub struct FsExtensionLoader {
    app_name: String,
    root: PathBuf,
}

impl FsExtensionLoader {
    pub fn new(app_name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            app_name: app_name.into(),
            root: root.into(),
        }
    }

    /// `<root>/extensions/`
    pub fn extensions_dir(&self) -> PathBuf {
        self.root.join("extensions")
    }

    /// Blocking scan; called from `load` via `spawn_blocking`.
    fn scan(&self) -> Result<AppSnapshot, LoadError> {
        let extensions_dir = self.extensions_dir();
        let mut extensions = Vec::new();

        let entries = match fs::read_dir(&extensions_dir) {
            Ok(entries) => entries,
            // An app without an extensions directory is an empty snapshot,
            // not a malformed project.
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return AppSnapshot::new(self.app_name.clone(), self.root.clone(), extensions)
            }
            Err(err) => return Err(io_err(&extensions_dir, err)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| io_err(&extensions_dir, e))?;
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let config_path = dir.join(CONFIG_FILE);
            if !config_path.exists() {
                continue;
            }
            extensions.push(load_extension(&dir, &config_path)?);
        }

        AppSnapshot::new(self.app_name.clone(), self.root.clone(), extensions)
    }
}

#[async_trait]
impl ExtensionLoader for FsExtensionLoader {
    async fn load(&self) -> Result<AppSnapshot, LoadError> {
        let loader = self.clone();
        tokio::task::spawn_blocking(move || loader.scan())
            .await
            .map_err(|err| LoadError::Internal(format!("loader join error: {err}")))?
    }
}

fn load_extension(dir: &Path, config_path: &Path) -> Result<ExtensionSnapshot, LoadError> {
    let config_bytes = fs::read(config_path).map_err(|e| io_err(config_path, e))?;
    let config_text = String::from_utf8_lossy(&config_bytes);
    let config: ExtensionConfig =
        toml::from_str(&config_text).map_err(|source| LoadError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;

    let handle = config
        .handle
        .or_else(|| {
            dir.file_name()
                .and_then(|name| name.to_str())
                .map(str::to_owned)
        })
        .map(ExtensionHandle::from)
        .ok_or_else(|| LoadError::Internal(format!("unnameable extension dir {}", dir.display())))?;

    let kind = config
        .kind
        .as_deref()
        .map(ExtensionKind::parse)
        .unwrap_or_default();

    Ok(ExtensionSnapshot {
        handle,
        kind,
        config_hash: Digest::of_bytes(&config_bytes),
        source_hashes: hash_sources(dir, config_path)?,
    })
}

/// Digest every source file under `dir`, keyed by path relative to `dir`.
/// Skips dotfiles, build-output directories, and the config file itself.
fn hash_sources(
    dir: &Path,
    config_path: &Path,
) -> Result<BTreeMap<PathBuf, Digest>, LoadError> {
    let mut hashes = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            // A directory can vanish mid-scan during a delete burst; the
            // next tick settles it.
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(&current, err)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&current, e))?;
            let path = entry.path();
            if is_hidden(&path) {
                continue;
            }
            let ty = entry.file_type().map_err(|e| io_err(&path, e))?;
            if ty.is_dir() {
                if !is_ignored_dir(&path) {
                    pending.push(path);
                }
            } else if ty.is_file() && path != config_path {
                let bytes = match fs::read(&path) {
                    Ok(bytes) => bytes,
                    Err(err) if err.kind() == ErrorKind::NotFound => continue,
                    Err(err) => return Err(io_err(&path, err)),
                };
                let relative = path.strip_prefix(dir).unwrap_or(&path).to_path_buf();
                hashes.insert(relative, Digest::of_bytes(&bytes));
            }
        }
    }

    Ok(hashes)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_ignored_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| IGNORED_DIRS.contains(&name))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
