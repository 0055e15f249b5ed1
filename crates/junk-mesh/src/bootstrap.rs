//! Minting a join-config: the response to `POST /mesh/bootstrap`, handed to
//! a new node so it can adopt this node's overlay as a peer.

use junk_config::{Config, ConfigStore, Peer};
use junk_core::{Error, Result};
use junk_identity::Keypair;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    pub peer_private_key: String,
    pub peer_public_key: String,
    pub peer_wg_ip: String,
    pub server_public_key: String,
    pub server_endpoint: String,
    pub server_wg_ip: String,
    pub server_web_port: u16,
}

/// The first three octets of `wg_ip`, e.g. `"10.99.0.1"` -> `"10.99.0"`.
fn subnet_prefix(wg_ip: &str) -> Option<&str> {
    let idx = wg_ip.rfind('.')?;
    Some(&wg_ip[..idx])
}

/// The last octet of `wg_ip` as a host number, if it falls in `[0, 255]`.
fn host_octet(wg_ip: &str) -> Option<u8> {
    wg_ip.rsplit('.').next()?.parse().ok()
}

/// Allocate the first free host octet in `[2, 254]` under this node's own
/// subnet, treating octet `1` as reserved for the hub and every local/peer
/// address already in the same subnet as occupied.
pub fn allocate_peer_ip(cfg: &Config) -> Result<String> {
    let prefix = subnet_prefix(&cfg.wireguard.wg_ip)
        .ok_or_else(|| Error::InvalidArgument("node has no wg_ip configured".into()))?;

    let mut occupied = std::collections::HashSet::new();
    occupied.insert(1u8);
    if let Some(h) = host_octet(&cfg.wireguard.wg_ip) {
        occupied.insert(h);
    }
    for peer in &cfg.wg_peers {
        if subnet_prefix(&peer.wg_ip) == Some(prefix) {
            if let Some(h) = host_octet(&peer.wg_ip) {
                occupied.insert(h);
            }
        }
    }

    for host in 2u16..=254 {
        let host = host as u8;
        if !occupied.contains(&host) {
            return Ok(format!("{prefix}.{host}"));
        }
    }
    Err(Error::InvalidArgument("no free address in subnet".into()))
}

/// Mint a join-config: generate a fresh keypair and address for the joining
/// peer, upsert a skeletal record for it (endpoint and web port are filled
/// in once the peer first syncs back), and describe this node as the server
/// half of the handshake. Only a `node_state == Node` host may mint.
pub fn mint(store: &ConfigStore) -> Result<JoinConfig> {
    let cfg = store.snapshot();
    if !matches!(cfg.node_state, junk_config::NodeState::Node) {
        return Err(Error::Forbidden("mint requires node_state=node".into()));
    }

    let peer_ip = allocate_peer_ip(&cfg)?;
    let keypair = Keypair::generate();

    store.upsert_peer(Peer {
        public_key: keypair.public_base64(),
        wg_ip: peer_ip.clone(),
        endpoint: String::new(),
        persistent_keepalive: 0,
        web_port: 0,
        preshared_key: None,
    })?;

    Ok(JoinConfig {
        peer_private_key: keypair.private_base64(),
        peer_public_key: keypair.public_base64(),
        peer_wg_ip: peer_ip,
        server_public_key: cfg.wireguard.public_key,
        server_endpoint: cfg.wireguard.endpoint,
        server_wg_ip: cfg.wireguard.wg_ip,
        server_web_port: cfg.web_port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &std::path::Path, wg_ip: &str) -> ConfigStore {
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "data_dir": dir.join("data").display().to_string(),
                "mount_point": dir.join("mnt").display().to_string(),
                "web_port": 8080,
                "wireguard": {
                    "interface_name": "jnk0",
                    "wg_ip": wg_ip,
                    "listen_port": 51820,
                },
            })
            .to_string(),
        )
        .unwrap();
        let store = ConfigStore::init(&path).unwrap();
        let cfg = store.snapshot();
        store.set_identity(&cfg.wireguard.private_key, wg_ip.to_string()).unwrap();
        store
    }

    #[test]
    fn allocates_first_free_host_skipping_reserved_and_occupied() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), "10.99.0.1");
        store
            .upsert_peer(Peer {
                public_key: "a".into(),
                wg_ip: "10.99.0.2".into(),
                ..Default::default()
            })
            .unwrap();
        let cfg = store.snapshot();
        assert_eq!(allocate_peer_ip(&cfg).unwrap(), "10.99.0.3");
    }

    #[test]
    fn mint_fails_on_end_node() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), "10.99.0.1");
        store.set_node_state(junk_config::NodeState::End).unwrap();
        assert!(mint(&store).is_err());
    }

    #[test]
    fn mint_never_reuses_an_ip_it_already_handed_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), "10.99.0.1");
        let first = mint(&store).unwrap();
        let second = mint(&store).unwrap();
        assert_ne!(first.peer_wg_ip, second.peer_wg_ip);
        assert_ne!(first.peer_wg_ip, "10.99.0.1");
        assert_ne!(second.peer_wg_ip, "10.99.0.1");
    }
}
