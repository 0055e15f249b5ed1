//! The merge rules for `POST /mesh/peers`: an incoming [`MeshState`]
//! upserts into this node's config store without ever adopting a peer
//! record for this node's own identity.

use crate::types::MeshState;
use junk_config::ConfigStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub peers_changed: bool,
    pub mounts_changed: bool,
}

/// Merge `incoming` into `store`:
/// - Peers whose `public_key` equals this node's own are rejected outright
///   (a node never adds itself to its own peer list).
/// - The sender's own `self_peer` and every peer it reports are each
///   upserted by `public_key`.
/// - The mount-point set replaces wholesale iff `incoming.mounts_updated_at`
///   is `>=` the local value.
pub fn merge_incoming(store: &ConfigStore, incoming: &MeshState) -> MergeOutcome {
    let local_public_key = store.snapshot().wireguard.public_key;
    let mut peers_changed = false;

    let candidates = std::iter::once(incoming.self_peer.clone()).chain(incoming.peers.iter().cloned());
    for peer in candidates {
        if peer.public_key.is_empty() || peer.public_key == local_public_key {
            continue;
        }
        match store.upsert_peer(peer) {
            Ok(junk_config::UpsertResult::Changed) => peers_changed = true,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "dropping peer during merge");
            }
        }
    }

    let mounts_changed = store
        .replace_mount_points_if_newer(incoming.mount_points.clone(), incoming.mounts_updated_at)
        .unwrap_or(false);

    MergeOutcome { peers_changed, mounts_changed }
}
