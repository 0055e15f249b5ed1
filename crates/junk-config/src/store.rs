//! The single-mutex configuration store.

use crate::types::{
    Config, NodeState, Peer, UpsertResult, MAX_BOOTSTRAP_PEERS, MAX_MOUNT_POINTS, MAX_PEERS,
};
use crate::validate::validate;
use junk_core::{now_unix, Error, Result};
use junk_identity::Keypair;
use parking_lot::Mutex;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Process-wide configuration, guarded by one mutex.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<Mutex<Config>>,
    path: PathBuf,
}

impl ConfigStore {
    /// `init(path)`: load defaults → overlay file values → ensure key pair →
    /// validate.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut cfg = Config::default();
        if path.exists() {
            match load_file(&path) {
                Ok(loaded) => cfg = loaded,
                Err(e) => warn!(error = %e, path = %path.display(), "config file unreadable, using defaults"),
            }
        }

        let store = ConfigStore {
            inner: Arc::new(Mutex::new(cfg)),
            path,
        };
        store.ensure_wg_keys()?;
        {
            let guard = store.inner.lock();
            validate(&guard)?;
        }
        store.save()?;
        Ok(store)
    }

    /// `load(path)`: parse JSON; unknown fields ignored (serde `#[serde(default)]`
    /// on every field handles this); numeric values out of range are rejected
    /// by silently keeping the prior value, which this helper implements by
    /// validating each mutation before committing it (see `set_*` below).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cfg = load_file(&path)?;
        Ok(ConfigStore {
            inner: Arc::new(Mutex::new(cfg)),
            path,
        })
    }

    pub fn snapshot(&self) -> Config {
        self.inner.lock().clone()
    }

    fn private_key_path(&self) -> PathBuf {
        self.path
            .parent()
            .map(|p| p.join("private.key"))
            .unwrap_or_else(|| PathBuf::from("private.key"))
    }

    /// `save(path)`: serialize to `path.tmp`, fsync, rename to `path`
    /// (atomicity via same-filesystem rename).
    pub fn save(&self) -> Result<()> {
        let cfg = self.inner.lock().clone();
        write_atomic_json(&self.path, &cfg)
    }

    /// `ensure_wg_keys()`: load `private.key` file if present; else adopt the
    /// in-memory private key if valid; else generate. Always recompute the
    /// public key from the effective private key; write back if the
    /// derivation differs.
    pub fn ensure_wg_keys(&self) -> Result<()> {
        let key_path = self.private_key_path();
        let from_file = junk_identity::load_private_key_file(&key_path)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let keypair = if let Some(kp) = from_file {
            kp
        } else {
            let mut guard = self.inner.lock();
            let in_memory = junk_identity::decode_base64_key(&guard.wireguard.private_key)
                .ok()
                .map(Keypair::from_private_bytes);
            let kp = in_memory.unwrap_or_else(|| {
                info!("generating a new node identity keypair");
                Keypair::generate()
            });
            drop(guard);
            junk_identity::save_private_key_file(&key_path, &kp)
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            kp
        };

        let mut guard = self.inner.lock();
        let recomputed_public = keypair.public_base64();
        let recomputed_private = keypair.private_base64();
        let changed = guard.wireguard.public_key != recomputed_public
            || guard.wireguard.private_key != recomputed_private;
        guard.wireguard.private_key = recomputed_private;
        guard.wireguard.public_key = recomputed_public;
        drop(guard);

        if changed {
            self.save()?;
        }
        Ok(())
    }

    /// `upsert_peer(peer)`: identity by `public_key`; returns
    /// `changed|unchanged|full`. No-op when every field matches.
    pub fn upsert_peer(&self, peer: Peer) -> Result<UpsertResult> {
        if !peer.is_identity_valid() {
            return Err(Error::InvalidArgument("empty peer identity".into()));
        }
        let mut guard = self.inner.lock();
        if let Some(existing) = guard
            .wg_peers
            .iter_mut()
            .find(|p| p.public_key == peer.public_key)
        {
            if *existing == peer {
                return Ok(UpsertResult::Unchanged);
            }
            *existing = peer;
            guard.wg_peers_updated_at = now_unix();
            drop(guard);
            self.save()?;
            return Ok(UpsertResult::Changed);
        }
        if guard.wg_peers.len() >= MAX_PEERS {
            return Ok(UpsertResult::Full);
        }
        guard.wg_peers.push(peer);
        guard.wg_peers_updated_at = now_unix();
        drop(guard);
        self.save()?;
        Ok(UpsertResult::Changed)
    }

    /// `set_peers(list)`: replace the set; drops entries with empty identity.
    pub fn set_peers(&self, peers: Vec<Peer>) -> Result<()> {
        let filtered: Vec<Peer> = peers.into_iter().filter(Peer::is_identity_valid).collect();
        let mut guard = self.inner.lock();
        guard.wg_peers = filtered;
        guard.wg_peers_updated_at = now_unix();
        drop(guard);
        self.save()
    }

    /// Rekey one peer identified by `wg_ip` (its overlay address is stable
    /// across a key rotation even though `public_key` is not). Returns
    /// `false` without error if no peer has that address, or if the key is
    /// already current — both are no-ops.
    pub fn rekey_peer_by_wg_ip(&self, wg_ip: &str, new_public_key: String) -> Result<bool> {
        let mut guard = self.inner.lock();
        let Some(existing) = guard.wg_peers.iter_mut().find(|p| p.wg_ip == wg_ip) else {
            return Ok(false);
        };
        if existing.public_key == new_public_key {
            return Ok(false);
        }
        existing.public_key = new_public_key;
        guard.wg_peers_updated_at = now_unix();
        drop(guard);
        self.save()?;
        Ok(true)
    }

    /// Replace this node's overlay identity in place: persists the new
    /// private key file, recomputes and stores the public key, and updates
    /// the overlay address. Used by the join flow and by conservative key
    /// rotation, where the old key must stop being accepted immediately.
    pub fn set_identity(&self, private_key_base64: &str, wg_ip: String) -> Result<()> {
        let bytes = junk_identity::decode_base64_key(private_key_base64)
            .map_err(|e| Error::InvalidArgument(format!("bad private key: {e}")))?;
        let keypair = Keypair::from_private_bytes(bytes);
        junk_identity::save_private_key_file(&self.private_key_path(), &keypair)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        let mut guard = self.inner.lock();
        guard.wireguard.private_key = keypair.private_base64();
        guard.wireguard.public_key = keypair.public_base64();
        guard.wireguard.wg_ip = wg_ip;
        drop(guard);
        self.save()
    }

    pub fn set_endpoint(&self, endpoint: String) -> Result<()> {
        let mut guard = self.inner.lock();
        guard.wireguard.endpoint = endpoint;
        drop(guard);
        self.save()
    }

    pub fn set_node_state(&self, state: NodeState) -> Result<()> {
        let mut guard = self.inner.lock();
        guard.node_state = state;
        drop(guard);
        self.save()
    }

    /// Replace the bootstrap peer list wholesale (used when adopting a join
    /// config), capping at [`MAX_BOOTSTRAP_PEERS`] rather than rejecting.
    pub fn set_bootstrap_peers(&self, peers: Vec<String>) -> Result<()> {
        let mut guard = self.inner.lock();
        guard.bootstrap_peers = peers.into_iter().take(MAX_BOOTSTRAP_PEERS).collect();
        guard.bootstrap_peers_updated_at = now_unix();
        drop(guard);
        self.save()
    }

    /// `add_bootstrap_peer(endpoint)`: append with bounds checks.
    ///
    /// Save-then-commit ordering: the in-memory vector is only left mutated
    /// after `save()` has returned `Ok`; on failure the append is rolled
    /// back so the in-memory state never runs ahead of what is durable.
    pub fn add_bootstrap_peer(&self, endpoint: String) -> Result<()> {
        if endpoint.is_empty() {
            return Err(Error::InvalidArgument("empty bootstrap endpoint".into()));
        }
        let mut guard = self.inner.lock();
        if guard.bootstrap_peers.len() >= MAX_BOOTSTRAP_PEERS {
            drop(guard);
            return Err(Error::PeerFull);
        }
        guard.bootstrap_peers.push(endpoint);
        guard.bootstrap_peers_updated_at = now_unix();
        drop(guard);
        if let Err(e) = self.save() {
            let mut guard = self.inner.lock();
            guard.bootstrap_peers.pop();
            return Err(e);
        }
        Ok(())
    }

    pub fn remove_bootstrap_peer(&self, index: usize) -> Result<()> {
        let mut guard = self.inner.lock();
        if index >= guard.bootstrap_peers.len() {
            return Err(Error::InvalidArgument(format!(
                "bootstrap peer index {index} out of range"
            )));
        }
        let removed = guard.bootstrap_peers.remove(index);
        guard.bootstrap_peers_updated_at = now_unix();
        drop(guard);
        if let Err(e) = self.save() {
            let mut guard = self.inner.lock();
            guard.bootstrap_peers.insert(index, removed);
            return Err(e);
        }
        Ok(())
    }

    pub fn edit_bootstrap_peer(&self, index: usize, endpoint: String) -> Result<()> {
        let mut guard = self.inner.lock();
        if index >= guard.bootstrap_peers.len() {
            return Err(Error::InvalidArgument(format!(
                "bootstrap peer index {index} out of range"
            )));
        }
        let previous = std::mem::replace(&mut guard.bootstrap_peers[index], endpoint);
        guard.bootstrap_peers_updated_at = now_unix();
        drop(guard);
        if let Err(e) = self.save() {
            let mut guard = self.inner.lock();
            guard.bootstrap_peers[index] = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn list_bootstrap_peers(&self) -> Vec<String> {
        self.inner.lock().bootstrap_peers.clone()
    }

    /// `add_mount_point(path)`: append with bounds checks.
    pub fn add_mount_point(&self, mount: String) -> Result<()> {
        if mount.is_empty() {
            return Err(Error::InvalidArgument("empty mount point".into()));
        }
        let mut guard = self.inner.lock();
        if guard.data_mount_points.len() >= MAX_MOUNT_POINTS {
            return Err(Error::InvalidArgument("too many mount points".into()));
        }
        if !guard.data_mount_points.contains(&mount) {
            guard.data_mount_points.push(mount);
            guard.data_mount_points_updated_at = now_unix();
        }
        drop(guard);
        self.save()
    }

    /// Replace the mount-point set iff `incoming_updated_at >= local`;
    /// `>=` is authoritative everywhere a timestamp is compared, so an
    /// incoming update carrying the same timestamp still wins.
    pub fn replace_mount_points_if_newer(
        &self,
        mounts: Vec<String>,
        incoming_updated_at: u64,
    ) -> Result<bool> {
        let mut guard = self.inner.lock();
        if incoming_updated_at >= guard.data_mount_points_updated_at {
            if guard.data_mount_points == mounts && incoming_updated_at == guard.data_mount_points_updated_at {
                return Ok(false);
            }
            guard.data_mount_points = mounts;
            guard.data_mount_points_updated_at = incoming_updated_at;
            drop(guard);
            self.save()?;
            return Ok(true);
        }
        Ok(false)
    }
}

fn load_file(path: &Path) -> Result<Config> {
    let data = std::fs::read_to_string(path)?;
    let cfg: Config = serde_json::from_str(&data)
        .map_err(|e| Error::InvalidArgument(format!("config parse error: {e}")))?;
    Ok(cfg)
}

fn write_atomic_json(path: &Path, cfg: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    let mut file = std::fs::File::create(&tmp_path)?;
    let json = serde_json::to_vec_pretty(cfg)
        .map_err(|e| Error::InvalidArgument(format!("config serialize error: {e}")))?;
    file.write_all(&json)?;
    file.sync_all()?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
