//! `<bin> <config.json> bootstrap-peers list|add|delete|edit`: the one
//! CLI surface the node binary exposes beyond the bare `config.json`
//! argument; everything else is driven over HTTP.

use clap::Subcommand;
use junk_config::ConfigStore;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or edit the bootstrap-peer list in the config store.
    BootstrapPeers {
        #[command(subcommand)]
        action: BootstrapAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum BootstrapAction {
    /// List configured bootstrap peers, one `host:port` per line.
    List,
    /// Append a bootstrap peer.
    Add { endpoint: String },
    /// Remove a bootstrap peer by index.
    Delete { index: usize },
    /// Replace a bootstrap peer's endpoint by index.
    Edit { index: usize, endpoint: String },
}

/// Run a `bootstrap-peers` subcommand against the config store at
/// `config_path`, returning the process's exit code (0 success, 1
/// operational error).
pub fn run_bootstrap_peers(config_path: &std::path::Path, action: BootstrapAction) -> i32 {
    let store = match ConfigStore::init(config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: loading config: {e}");
            return 1;
        }
    };

    let result = match action {
        BootstrapAction::List => {
            for (i, endpoint) in store.list_bootstrap_peers().iter().enumerate() {
                println!("{i}\t{endpoint}");
            }
            Ok(())
        }
        BootstrapAction::Add { endpoint } => store.add_bootstrap_peer(endpoint),
        BootstrapAction::Delete { index } => store.remove_bootstrap_peer(index),
        BootstrapAction::Edit { index, endpoint } => store.edit_bootstrap_peer(index, endpoint),
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}
