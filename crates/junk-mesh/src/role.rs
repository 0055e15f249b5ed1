//! Reachability tracking and role derivation for `GET /mesh/status`. Purely
//! advisory, in-memory state: it is never persisted to the config file.

use junk_config::Config;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Connected,
    Unreachable,
    Connecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Standalone,
    Central,
    DeadEnd,
}

/// Per-endpoint reachability, keyed by the `host:port` address a sync round
/// targets. Shared between the coordinator thread (writer) and the `/mesh/
/// status` handler (reader).
#[derive(Clone, Default)]
pub struct ReachabilityTable {
    inner: Arc<RwLock<HashMap<String, Reachability>>>,
}

impl ReachabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, addr: &str, state: Reachability) {
        self.inner.write().insert(addr.to_string(), state);
    }

    pub fn get(&self, addr: &str) -> Option<Reachability> {
        self.inner.read().get(addr).copied()
    }

    pub fn snapshot(&self) -> HashMap<String, Reachability> {
        self.inner.read().clone()
    }

    pub fn any_connected(&self) -> bool {
        self.inner.read().values().any(|r| *r == Reachability::Connected)
    }
}

/// `standalone=true` iff there are no bootstrap peers and no WireGuard peers.
pub fn is_standalone(cfg: &Config) -> bool {
    cfg.bootstrap_peers.is_empty() && cfg.wg_peers.is_empty()
}

/// `active=true` whenever the peer list is non-empty.
pub fn is_active(cfg: &Config) -> bool {
    !cfg.wg_peers.is_empty()
}

/// `standalone` if both lists are empty; `central` if any bootstrap or peer
/// address is currently reachable; `dead_end` otherwise.
pub fn derive_role(cfg: &Config, reachability: &ReachabilityTable) -> Role {
    if is_standalone(cfg) {
        return Role::Standalone;
    }
    if reachability.any_connected() {
        Role::Central
    } else {
        Role::DeadEnd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junk_config::Peer;

    #[test]
    fn empty_lists_are_standalone() {
        let cfg = Config::default();
        let table = ReachabilityTable::new();
        assert_eq!(derive_role(&cfg, &table), Role::Standalone);
    }

    #[test]
    fn any_reachable_peer_yields_central() {
        let mut cfg = Config::default();
        cfg.wg_peers.push(Peer {
            public_key: "p".into(),
            wg_ip: "10.99.0.2".into(),
            endpoint: "198.51.100.1:51820".into(),
            ..Default::default()
        });
        let table = ReachabilityTable::new();
        table.set("198.51.100.1:51820", Reachability::Connected);
        assert_eq!(derive_role(&cfg, &table), Role::Central);
    }

    #[test]
    fn configured_but_unreachable_peers_yield_dead_end() {
        let mut cfg = Config::default();
        cfg.wg_peers.push(Peer {
            public_key: "p".into(),
            wg_ip: "10.99.0.2".into(),
            endpoint: "198.51.100.1:51820".into(),
            ..Default::default()
        });
        let table = ReachabilityTable::new();
        table.set("198.51.100.1:51820", Reachability::Unreachable);
        assert_eq!(derive_role(&cfg, &table), Role::DeadEnd);
    }
}
