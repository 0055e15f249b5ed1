//! Adopting a join-config: the client half of `POST /mesh/join`.

use crate::alternate::AlternateUpdate;
use crate::bootstrap::JoinConfig;
use junk_config::{ConfigStore, Peer};
use junk_core::{Error, Result};
use junk_identity::Keypair;
use std::time::Duration;

/// Take this node's overlay identity from `join`'s peer half, and record the
/// server half as a peer (and as a bootstrap endpoint, so future restarts
/// can rediscover it even before a sync round runs).
pub fn adopt(store: &ConfigStore, join: &JoinConfig) -> Result<()> {
    store.set_identity(&join.peer_private_key, join.peer_wg_ip.clone())?;
    store.upsert_peer(Peer {
        public_key: join.server_public_key.clone(),
        wg_ip: join.server_wg_ip.clone(),
        endpoint: join.server_endpoint.clone(),
        persistent_keepalive: 0,
        web_port: join.server_web_port,
        preshared_key: None,
    })?;
    if let Some(host) = host_of(&join.server_endpoint) {
        let bootstrap_addr = format!("{host}:{}", join.server_web_port);
        let mut existing = store.list_bootstrap_peers();
        if !existing.contains(&bootstrap_addr) {
            existing.push(bootstrap_addr);
            store.set_bootstrap_peers(existing)?;
        }
    }
    Ok(())
}

/// Adopt, then immediately rotate to a brand-new keypair and notify the
/// server via `/mesh/alternate`, per the conservative (invalidate-old-key-
/// immediately) key rotation policy: the key adopted from `join` is never
/// used for a live session, only as a one-time bootstrap credential.
pub fn adopt_with_alternate(
    store: &ConfigStore,
    join: &JoinConfig,
    http_timeout: Duration,
) -> Result<()> {
    adopt(store, join)?;

    let new_keypair = Keypair::generate();
    let wg_ip = join.peer_wg_ip.clone();
    store.set_identity(&new_keypair.private_base64(), wg_ip.clone())?;

    let host = host_of(&join.server_endpoint)
        .ok_or_else(|| Error::InvalidArgument("server endpoint has no host".into()))?;
    let addr = format!("{host}:{}", join.server_web_port);
    let update = AlternateUpdate {
        wg_ip,
        new_public_key: new_keypair.public_base64(),
    };
    junk_web::post_json(&addr, "/mesh/alternate", &update, http_timeout)
        .map_err(|e| Error::TransientPeer(e.to_string()))?;
    Ok(())
}

fn host_of(endpoint: &str) -> Option<&str> {
    endpoint.rsplit_once(':').map(|(host, _)| host)
}
