//! `POST /mesh/alternate`: a peer telling its server it has rotated to a
//! new key, keyed by the overlay address that stays stable across rotation.

use junk_config::ConfigStore;
use junk_core::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternateUpdate {
    pub wg_ip: String,
    pub new_public_key: String,
}

/// Apply an alternate-key update. Returns `true` if a peer at `wg_ip` was
/// found and its key actually changed; unknown addresses are a silent no-op
/// rather than an error, since a stray notification should not fail the
/// request.
pub fn apply(store: &ConfigStore, update: &AlternateUpdate) -> Result<bool> {
    store.rekey_peer_by_wg_ip(&update.wg_ip, update.new_public_key.clone())
}
