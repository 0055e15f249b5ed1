//! Background mesh thread: periodic public-IP refresh, peer sync, and
//! WireGuard reprogramming.

use crate::merge::merge_incoming;
use crate::public_ip::PublicIpProbe;
use crate::role::{Reachability, ReachabilityTable};
use crate::types::MeshState;
use crate::wg::{WireGuardDevice, WireGuardDeviceProgram};
use junk_config::ConfigStore;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CYCLE_INTERVAL: Duration = Duration::from_secs(5);
const PUBLIC_IP_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
const SYNC_TIMEOUT: Duration = Duration::from_secs(1);

/// A condvar-backed stop flag: `wait(duration)` sleeps for up to `duration`
/// but returns immediately once `stop()` is called, so shutdown cancels the
/// current cycle's sleep instead of waiting it out.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock() = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for up to `duration`, waking early if `stop()` is called.
    pub fn wait(&self, duration: Duration) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock();
        if *stopped {
            return;
        }
        let result = cvar.wait_for(&mut stopped, duration);
        let _ = result;
    }
}

pub struct Coordinator {
    store: ConfigStore,
    public_ip_probe: Arc<dyn PublicIpProbe>,
    wireguard: Arc<dyn WireGuardDevice>,
    reachability: ReachabilityTable,
    last_public_ip_refresh: AtomicU64,
    last_wg_peers_updated_at: AtomicU64,
}

impl Coordinator {
    pub fn new(
        store: ConfigStore,
        public_ip_probe: Arc<dyn PublicIpProbe>,
        wireguard: Arc<dyn WireGuardDevice>,
    ) -> Self {
        Self {
            store,
            public_ip_probe,
            wireguard,
            reachability: ReachabilityTable::new(),
            last_public_ip_refresh: AtomicU64::new(0),
            last_wg_peers_updated_at: AtomicU64::new(0),
        }
    }

    pub fn reachability(&self) -> ReachabilityTable {
        self.reachability.clone()
    }

    /// Run cycles until `stop` is signaled, sleeping between cycles in a
    /// way that wakes immediately on shutdown rather than waiting out the
    /// full interval.
    pub fn run(&self, stop: &StopSignal) {
        while !stop.is_stopped() {
            self.tick();
            stop.wait(CYCLE_INTERVAL);
        }
    }

    /// One coordinator cycle: public-IP refresh, peer sync, WireGuard
    /// reprogram. Exposed directly so tests and `/mesh/sync` can drive a
    /// single cycle without a background thread.
    pub fn tick(&self) {
        self.maybe_refresh_public_ip();
        let synced = self.sync_once();
        debug!(synced, "mesh cycle complete");
        self.maybe_reprogram_wireguard();
    }

    fn maybe_refresh_public_ip(&self) {
        let now = junk_core::now_unix();
        let last = self.last_public_ip_refresh.load(Ordering::Relaxed);
        if now.saturating_sub(last) < PUBLIC_IP_REFRESH_INTERVAL.as_secs() {
            return;
        }
        self.last_public_ip_refresh.store(now, Ordering::Relaxed);

        let cfg = self.store.snapshot();
        if is_dns_name(&cfg.wireguard.endpoint) {
            return;
        }
        let Some(ip) = self.public_ip_probe.probe() else {
            return;
        };
        let current_host = cfg.wireguard.endpoint.rsplit_once(':').map(|(h, _)| h);
        if current_host == Some(ip.as_str()) {
            return;
        }
        let endpoint = format!("{ip}:{}", cfg.wireguard.listen_port);
        if let Err(e) = self.store.set_endpoint(endpoint) {
            warn!(error = %e, "failed to persist refreshed public ip");
        }
    }

    /// Post this node's state to every known bootstrap/peer endpoint,
    /// merging whatever comes back and marking each endpoint's
    /// reachability. Returns the number of endpoints that answered 2xx.
    pub fn sync_once(&self) -> usize {
        let cfg = self.store.snapshot();
        let mut endpoints: Vec<String> = cfg.bootstrap_peers.clone();
        for peer in &cfg.wg_peers {
            if !peer.endpoint.is_empty() {
                let port = if peer.web_port == 0 { cfg.web_port } else { peer.web_port };
                if let Some(host) = peer.endpoint.rsplit_once(':').map(|(h, _)| h) {
                    endpoints.push(format!("{host}:{port}"));
                }
            }
        }
        endpoints.sort();
        endpoints.dedup();

        let payload = MeshState::from_config(&cfg);
        let mut reached = 0;
        for addr in endpoints {
            self.reachability.set(&addr, Reachability::Connecting);
            match junk_web::post_json(&addr, "/mesh/peers", &payload, SYNC_TIMEOUT) {
                Ok(resp) if (200..300).contains(&resp.status) => {
                    self.reachability.set(&addr, Reachability::Connected);
                    reached += 1;
                    if let Ok(incoming) = serde_json::from_slice::<MeshState>(&resp.body) {
                        merge_incoming(&self.store, &incoming);
                    }
                }
                Ok(resp) => {
                    debug!(%addr, status = resp.status, "sync endpoint returned error status");
                    self.reachability.set(&addr, Reachability::Unreachable);
                }
                Err(e) => {
                    debug!(%addr, error = %e, "sync endpoint unreachable");
                    self.reachability.set(&addr, Reachability::Unreachable);
                }
            }
        }
        reached
    }

    fn maybe_reprogram_wireguard(&self) {
        let cfg = self.store.snapshot();
        let last = self.last_wg_peers_updated_at.load(Ordering::Relaxed);
        if cfg.wg_peers_updated_at == last {
            return;
        }
        let program = WireGuardDeviceProgram::from_peers(
            cfg.wireguard.interface_name.clone(),
            cfg.wireguard.private_key.clone(),
            cfg.wireguard.listen_port,
            &cfg.wg_peers,
        );
        match self.wireguard.apply(&program) {
            Ok(()) => self.last_wg_peers_updated_at.store(cfg.wg_peers_updated_at, Ordering::Relaxed),
            Err(e) => warn!(error = %e, "failed to reprogram wireguard device"),
        }
    }
}

fn is_dns_name(endpoint: &str) -> bool {
    let Some((host, _)) = endpoint.rsplit_once(':') else {
        return false;
    };
    host.parse::<std::net::IpAddr>().is_err() && !host.is_empty()
}
