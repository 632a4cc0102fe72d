//! Stagehand — live dev session runner for extension apps.
//!
//! # Usage
//!
//! ```text
//! stagehand dev [--path <app>] [--session-endpoint <url>] [--token <token>]
//!               [--debounce-ms <ms>] [--no-tunnel]
//! stagehand inspect [--path <app>] [--checksum]
//! ```

mod commands;
mod http;
mod processes;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{dev::DevArgs, inspect::InspectArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "stagehand",
    version,
    about = "Watch an extension app and keep its remote dev session in sync",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a live dev session: watch, push, and stream output until ctrl-c.
    Dev(DevArgs),

    /// Print the manifest a push would send, as JSON.
    Inspect(InspectArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Dev(args) => commands::dev::run(args),
        Commands::Inspect(args) => commands::inspect::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_args_parse_with_defaults() {
        let cli = Cli::try_parse_from(["stagehand", "dev"]).expect("parse");
        let Commands::Dev(args) = cli.command else {
            panic!("expected dev subcommand");
        };
        assert_eq!(args.debounce_ms, 200);
        assert!(!args.no_tunnel);
        assert_eq!(args.path, std::path::PathBuf::from("."));
    }

    #[test]
    fn inspect_accepts_checksum_flag() {
        let cli = Cli::try_parse_from(["stagehand", "inspect", "--checksum"]).expect("parse");
        let Commands::Inspect(args) = cli.command else {
            panic!("expected inspect subcommand");
        };
        assert!(args.checksum);
    }
}
