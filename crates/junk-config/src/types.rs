//! Data model for the JSON config file.

use serde::{Deserialize, Serialize};

pub const MAX_PEERS: usize = 64;
pub const MAX_BOOTSTRAP_PEERS: usize = 10;
pub const MAX_MOUNT_POINTS: usize = 32;
pub const MAX_DATA_DIRS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Hosts the overlay server; may mint join-configs.
    Node,
    /// Does not host the overlay server.
    End,
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState::Node
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireGuardConfig {
    #[serde(default)]
    pub interface_name: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub wg_ip: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub listen_port: u16,
    #[serde(default)]
    pub mtu: u16,
}

/// A mesh peer, identified by `public_key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub public_key: String,
    #[serde(default)]
    pub endpoint: String,
    pub wg_ip: String,
    #[serde(default)]
    pub persistent_keepalive: u16,
    /// 0 means "fall back to node-wide default".
    #[serde(default)]
    pub web_port: u16,
    #[serde(default)]
    pub preshared_key: Option<String>,
}

impl Peer {
    pub fn is_identity_valid(&self) -> bool {
        !self.public_key.is_empty() && !self.wg_ip.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage_size: String,
    #[serde(default)]
    pub data_dir: String,
    #[serde(default)]
    pub data_dirs: Vec<String>,
    #[serde(default)]
    pub mount_point: String,
    #[serde(default)]
    pub web_port: u16,
    #[serde(default)]
    pub node_state: NodeState,
    #[serde(default)]
    pub wireguard: WireGuardConfig,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default)]
    pub bootstrap_peers_updated_at: u64,
    #[serde(default)]
    pub wg_peers: Vec<Peer>,
    #[serde(default)]
    pub wg_peers_updated_at: u64,
    #[serde(default)]
    pub data_mount_points: Vec<String>,
    #[serde(default)]
    pub data_mount_points_updated_at: u64,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_true")]
    pub enable_fuse: bool,
    #[serde(default)]
    pub daemon_mode: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// The backing roots in effect: `data_dirs` overrides `data_dir` when
    /// non-empty, otherwise `data_dir` alone is the (single) root list.
    pub fn effective_data_dirs(&self) -> Vec<String> {
        if self.data_dirs.is_empty() {
            vec![self.data_dir.clone()]
        } else {
            self.data_dirs.clone()
        }
    }

    pub fn primary_data_dir(&self) -> Option<&str> {
        if self.data_dirs.is_empty() {
            if self.data_dir.is_empty() {
                None
            } else {
                Some(self.data_dir.as_str())
            }
        } else {
            self.data_dirs.first().map(String::as_str)
        }
    }
}

/// Result of `ConfigStore::upsert_peer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    Changed,
    Unchanged,
    Full,
}
