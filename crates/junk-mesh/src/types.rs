//! Wire payload exchanged between nodes: this node's own peer record, its
//! node state, its full peer set, and its mount-point list.

use junk_config::{Config, NodeState, Peer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshState {
    pub self_peer: Peer,
    pub node_state: NodeState,
    pub peers: Vec<Peer>,
    pub mount_points: Vec<String>,
    pub mounts_updated_at: u64,
}

impl MeshState {
    /// Build the payload this node sends to a peer: its own identity as a
    /// `Peer` record, plus the rest of its state. Mount points are included
    /// only for `node_state == Node`, per the sync round's contract.
    pub fn from_config(cfg: &Config) -> Self {
        let self_peer = Peer {
            public_key: cfg.wireguard.public_key.clone(),
            endpoint: cfg.wireguard.endpoint.clone(),
            wg_ip: cfg.wireguard.wg_ip.clone(),
            persistent_keepalive: 0,
            web_port: cfg.web_port,
            preshared_key: None,
        };
        let (mount_points, mounts_updated_at) = if matches!(cfg.node_state, NodeState::Node) {
            (cfg.data_mount_points.clone(), cfg.data_mount_points_updated_at)
        } else {
            (Vec::new(), 0)
        };
        MeshState {
            self_peer,
            node_state: cfg.node_state,
            peers: cfg.wg_peers.clone(),
            mount_points,
            mounts_updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_node_never_advertises_mount_points() {
        let mut cfg = Config::default();
        cfg.node_state = NodeState::End;
        cfg.data_mount_points = vec!["/mnt/a".into()];
        cfg.data_mount_points_updated_at = 100;
        let state = MeshState::from_config(&cfg);
        assert!(state.mount_points.is_empty());
        assert_eq!(state.mounts_updated_at, 0);
    }

    #[test]
    fn node_state_node_advertises_its_mount_points() {
        let mut cfg = Config::default();
        cfg.data_mount_points = vec!["/mnt/a".into()];
        cfg.data_mount_points_updated_at = 100;
        let state = MeshState::from_config(&cfg);
        assert_eq!(state.mount_points, vec!["/mnt/a".to_string()]);
        assert_eq!(state.mounts_updated_at, 100);
    }
}
