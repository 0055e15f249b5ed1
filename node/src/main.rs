//! `junk-node`: the node runtime binary — filesystem mount, mesh
//! coordinator, and web service wired together, plus the bootstrap-peers
//! CLI surface.

mod cli;
mod routes;
mod supervisor;

use clap::Parser;
use junk_config::ConfigStore;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "junk-node", about = "junkNAS node runtime")]
struct Cli {
    /// Path to the node's config.json.
    config: PathBuf,

    #[command(subcommand)]
    command: Option<cli::Command>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    match args.command {
        Some(cli::Command::BootstrapPeers { action }) => {
            ExitCode::from(cli::run_bootstrap_peers(&args.config, action) as u8)
        }
        None => match run_node(&args.config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "node exited with an error");
                ExitCode::FAILURE
            }
        },
    }
}

fn run_node(config_path: &std::path::Path) -> anyhow::Result<()> {
    let store = ConfigStore::init(config_path)?;
    supervisor::run(store)
}
