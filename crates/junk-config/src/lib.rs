//! The in-memory, single-mutex configuration store and its on-disk JSON
//! format holding node identity, peer set, and mount points.

mod store;
mod types;
mod validate;

pub use store::ConfigStore;
pub use types::{
    Config, NodeState, Peer, UpsertResult, WireGuardConfig, MAX_BOOTSTRAP_PEERS, MAX_DATA_DIRS,
    MAX_MOUNT_POINTS, MAX_PEERS,
};
pub use validate::validate;
