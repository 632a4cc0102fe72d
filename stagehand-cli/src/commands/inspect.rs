//! `stagehand inspect` — print the manifest a push would send.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use stagehand_core::{ExtensionLoader, FsExtensionLoader};
use stagehand_session::SessionPayload;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// App root directory (the one containing `extensions/`).
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Include the payload content checksum in the output.
    #[arg(long)]
    pub checksum: bool,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(inspect(args))
}

async fn inspect(args: InspectArgs) -> Result<()> {
    let root = args
        .path
        .canonicalize()
        .with_context(|| format!("app path not found: {}", args.path.display()))?;
    let name = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("app"));

    let loader = FsExtensionLoader::new(&name, &root);
    let snapshot = loader.load().await.context("failed to load extensions")?;
    let payload = SessionPayload::from_snapshot(&snapshot);

    let rendered = if args.checksum {
        serde_json::to_string_pretty(&json!({
            "checksum": payload.checksum,
            "manifest": payload.manifest,
        }))
    } else {
        serde_json::to_string_pretty(&payload.manifest)
    }
    .context("failed to render manifest JSON")?;

    println!("{rendered}");
    Ok(())
}
