//! `stagehand dev` — run the watch/sync engine until interrupted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use stagehand_core::FsExtensionLoader;
use stagehand_engine::{DevEngine, EngineConfig};
use stagehand_watch::WatchConfig;

use crate::http::HttpPlatformClient;
use crate::processes::{log_poll_descriptor, tunnel_descriptor};
use crate::render::ColorSink;

#[derive(Args, Debug)]
pub struct DevArgs {
    /// App root directory (the one containing `extensions/`).
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// App name reported to the platform. Defaults to the directory name.
    #[arg(long)]
    pub name: Option<String>,

    /// Dev session endpoint updates are pushed to.
    #[arg(long, default_value = "http://localhost:3457/dev_session")]
    pub session_endpoint: String,

    /// Bearer token for the session endpoint.
    #[arg(long, env = "STAGEHAND_TOKEN")]
    pub token: Option<String>,

    /// Settle window for filesystem change bursts, in milliseconds.
    #[arg(long, default_value_t = 200)]
    pub debounce_ms: u64,

    /// Skip the tunnel process.
    #[arg(long)]
    pub no_tunnel: bool,
}

pub fn run(args: DevArgs) -> Result<()> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(dev_session(args))
}

async fn dev_session(args: DevArgs) -> Result<()> {
    let root = args
        .path
        .canonicalize()
        .with_context(|| format!("app path not found: {}", args.path.display()))?;
    let name = args.name.unwrap_or_else(|| app_name_from(&root));

    let loader = Arc::new(FsExtensionLoader::new(&name, &root));
    let client = Arc::new(HttpPlatformClient::new(
        args.session_endpoint.clone(),
        args.token,
    ));
    let sink = Arc::new(ColorSink::default());

    let mut auxiliary = Vec::new();
    if !args.no_tunnel {
        auxiliary.push(tunnel_descriptor(args.session_endpoint.clone()));
    }
    auxiliary.push(log_poll_descriptor(client.clone()));

    let config = EngineConfig {
        watch_root: Some(root),
        watch: WatchConfig {
            debounce: Duration::from_millis(args.debounce_ms),
        },
        ..EngineConfig::default()
    };

    tracing::info!(app = %name, endpoint = %args.session_endpoint, "starting dev session");
    let engine = DevEngine::start(loader, client, sink, auxiliary, config)
        .context("failed to start dev session")?;

    let mut status_rx = engine.on_status_change();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow().clone();
            if status.is_ready {
                if let Some(url) = status.preview_url.as_deref() {
                    tracing::info!(url = %url, "preview ready");
                }
            }
        }
    });

    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    });

    engine.join().await.context("dev session ended with an error")
}

fn app_name_from(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("app"))
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
