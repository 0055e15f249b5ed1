//! Programming the local WireGuard device. Modeled behind a trait so the
//! coordinator's peer-diffing logic is unit-testable without a real kernel
//! WireGuard interface, which most build environments cannot provide.

use junk_config::Peer;
use std::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireGuardPeerProgram {
    pub public_key: String,
    pub allowed_ip: String,
    pub endpoint: Option<String>,
    pub persistent_keepalive: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireGuardDeviceProgram {
    pub interface_name: String,
    pub private_key: String,
    pub listen_port: u16,
    pub peers: Vec<WireGuardPeerProgram>,
}

impl WireGuardDeviceProgram {
    /// Build the replace-peers payload from the stored peer list: every
    /// peer's overlay address as a `/32` allowed IP, endpoint resolved as
    /// stored, keepalive carried through if set.
    pub fn from_peers(interface_name: String, private_key: String, listen_port: u16, peers: &[Peer]) -> Self {
        let peers = peers
            .iter()
            .filter(|p| !p.wg_ip.is_empty())
            .map(|p| WireGuardPeerProgram {
                public_key: p.public_key.clone(),
                allowed_ip: format!("{}/32", p.wg_ip),
                endpoint: if p.endpoint.is_empty() { None } else { Some(p.endpoint.clone()) },
                persistent_keepalive: p.persistent_keepalive,
            })
            .collect();
        WireGuardDeviceProgram {
            interface_name,
            private_key,
            listen_port,
            peers,
        }
    }
}

pub trait WireGuardDevice: Send + Sync {
    fn apply(&self, program: &WireGuardDeviceProgram) -> junk_core::Result<()>;
}

/// Shells out to `wg(8)` to set the interface's private key/listen port and
/// replace its peer set, the only portable rootless way to program
/// WireGuard from user space.
pub struct ShellWireGuard;

impl WireGuardDevice for ShellWireGuard {
    fn apply(&self, program: &WireGuardDeviceProgram) -> junk_core::Result<()> {
        let key_status = Command::new("wg")
            .args(["set", &program.interface_name, "listen-port", &program.listen_port.to_string()])
            .status();
        match key_status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                warn!(?status, "wg set listen-port failed");
                return Err(junk_core::Error::Io(std::io::Error::other("wg set listen-port failed")));
            }
            Err(e) => return Err(junk_core::Error::Io(e)),
        }

        for peer in &program.peers {
            let mut cmd = Command::new("wg");
            cmd.args(["set", &program.interface_name, "peer", &peer.public_key, "allowed-ips", &peer.allowed_ip]);
            if let Some(endpoint) = &peer.endpoint {
                cmd.args(["endpoint", endpoint]);
            }
            if peer.persistent_keepalive > 0 {
                cmd.args(["persistent-keepalive", &peer.persistent_keepalive.to_string()]);
            }
            let status = cmd.status().map_err(junk_core::Error::Io)?;
            if !status.success() {
                warn!(peer = %peer.public_key, ?status, "wg set peer failed");
                return Err(junk_core::Error::Io(std::io::Error::other("wg set peer failed")));
            }
        }
        debug!(interface = %program.interface_name, peers = program.peers.len(), "wireguard device reprogrammed");
        Ok(())
    }
}

/// Test double recording every program it was asked to apply, for
/// assertions against the coordinator's peer-diffing logic.
#[derive(Default)]
pub struct NullWireGuard {
    applied: parking_lot::Mutex<Vec<WireGuardDeviceProgram>>,
}

impl NullWireGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Vec<WireGuardDeviceProgram> {
        self.applied.lock().clone()
    }

    pub fn last(&self) -> Option<WireGuardDeviceProgram> {
        self.applied.lock().last().cloned()
    }
}

impl WireGuardDevice for NullWireGuard {
    fn apply(&self, program: &WireGuardDeviceProgram) -> junk_core::Result<()> {
        self.applied.lock().push(program.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junk_config::Peer;

    #[test]
    fn from_peers_builds_slash_32_allowed_ips_and_skips_addressless_peers() {
        let peers = vec![
            Peer {
                public_key: "a".into(),
                wg_ip: "10.99.0.2".into(),
                endpoint: "198.51.100.1:51820".into(),
                persistent_keepalive: 25,
                ..Default::default()
            },
            Peer {
                public_key: "b".into(),
                wg_ip: String::new(),
                ..Default::default()
            },
        ];
        let program = WireGuardDeviceProgram::from_peers("jnk0".into(), "priv".into(), 51820, &peers);
        assert_eq!(program.peers.len(), 1);
        assert_eq!(program.peers[0].allowed_ip, "10.99.0.2/32");
        assert_eq!(program.peers[0].persistent_keepalive, 25);
    }

    #[test]
    fn null_wireguard_records_every_apply() {
        let dev = NullWireGuard::new();
        let program = WireGuardDeviceProgram::from_peers("jnk0".into(), "priv".into(), 51820, &[]);
        dev.apply(&program).unwrap();
        assert_eq!(dev.applied().len(), 1);
        assert_eq!(dev.last().unwrap().listen_port, 51820);
    }
}
