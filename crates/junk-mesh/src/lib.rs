//! Mesh control plane: node role model, peer merge, bootstrap/join/alternate
//! handshake, and the background sync/WireGuard-reprogram coordinator.
//!
//! This crate owns mesh *logic*; it does not register HTTP routes itself
//! (the node binary wires these into `junk_web::Router`, since route
//! registration needs both this crate and `junk_web` but neither should
//! depend on the other for that).

mod alternate;
mod bootstrap;
mod coordinator;
mod join;
mod merge;
mod public_ip;
mod role;
mod types;
mod wg;

pub use alternate::AlternateUpdate;
pub use bootstrap::{allocate_peer_ip, JoinConfig};
pub use coordinator::{Coordinator, StopSignal};
pub use merge::MergeOutcome;
pub use public_ip::{FixedPublicIp, HttpPublicIpProbe, PublicIpProbe};
pub use role::{derive_role, is_active, is_standalone, Reachability, ReachabilityTable, Role};
pub use types::MeshState;
pub use wg::{NullWireGuard, ShellWireGuard, WireGuardDevice, WireGuardDeviceProgram, WireGuardPeerProgram};

use junk_config::ConfigStore;
use junk_core::Result;

/// Mint a join-config for a new peer (`POST /mesh/bootstrap`); forwards to
/// [`bootstrap::mint`] so callers only need this crate's public surface.
pub fn mint_bootstrap(store: &ConfigStore) -> Result<JoinConfig> {
    bootstrap::mint(store)
}

/// Adopt a join-config as this node's identity (`POST /mesh/join`,
/// `allow_alternate=false`).
pub fn adopt_join(store: &ConfigStore, join: &JoinConfig) -> Result<()> {
    join::adopt(store, join)
}

/// Adopt a join-config, then immediately rotate to a fresh keypair and
/// notify the server via `/mesh/alternate` (`allow_alternate=true`).
pub fn adopt_join_with_alternate(
    store: &ConfigStore,
    join: &JoinConfig,
    http_timeout: std::time::Duration,
) -> Result<()> {
    join::adopt_with_alternate(store, join, http_timeout)
}

/// Apply an incoming `/mesh/alternate` rekey notification.
pub fn apply_alternate(store: &ConfigStore, update: &AlternateUpdate) -> Result<bool> {
    alternate::apply(store, update)
}

/// Merge an incoming `/mesh/peers` payload into the local store.
pub fn merge_incoming(store: &ConfigStore, incoming: &MeshState) -> MergeOutcome {
    merge::merge_incoming(store, incoming)
}
