use crate::types::Config;
use junk_core::Error;

/// Validate a loaded config. Returns the first violation found.
pub fn validate(cfg: &Config) -> Result<(), Error> {
    if cfg.primary_data_dir().is_none() {
        return Err(Error::InvalidArgument("empty primary data dir".into()));
    }
    if cfg.mount_point.is_empty() {
        return Err(Error::InvalidArgument("empty mount point".into()));
    }
    if cfg.wireguard.interface_name.is_empty() {
        return Err(Error::InvalidArgument("empty interface name".into()));
    }
    if cfg.wireguard.wg_ip.is_empty() {
        return Err(Error::InvalidArgument("empty wg_ip".into()));
    }
    if cfg.web_port == 0 {
        return Err(Error::InvalidArgument("web_port must be nonzero".into()));
    }
    if cfg.wireguard.listen_port == 0 {
        return Err(Error::InvalidArgument("listen_port must be nonzero".into()));
    }
    if !cfg.storage_size.is_empty() && junk_sizefmt::parse_size(&cfg.storage_size).is_none() {
        return Err(Error::InvalidArgument(format!(
            "unparseable storage_size {:?}",
            cfg.storage_size
        )));
    }
    if cfg.data_dirs.len() > crate::types::MAX_DATA_DIRS {
        return Err(Error::InvalidArgument("too many data_dirs".into()));
    }
    if cfg.wg_peers.len() > crate::types::MAX_PEERS {
        return Err(Error::InvalidArgument("too many wg_peers".into()));
    }
    if cfg.bootstrap_peers.len() > crate::types::MAX_BOOTSTRAP_PEERS {
        return Err(Error::InvalidArgument("too many bootstrap_peers".into()));
    }
    if cfg.data_mount_points.len() > crate::types::MAX_MOUNT_POINTS {
        return Err(Error::InvalidArgument("too many data_mount_points".into()));
    }
    for peer in &cfg.wg_peers {
        if !peer.is_identity_valid() {
            return Err(Error::InvalidArgument("empty peer identity".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Peer;

    fn base_config() -> Config {
        Config {
            data_dir: "/data".into(),
            mount_point: "/mnt/junk".into(),
            web_port: 8080,
            wireguard: crate::types::WireGuardConfig {
                interface_name: "jnk0".into(),
                wg_ip: "10.99.0.1".into(),
                listen_port: 51820,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn empty_primary_dir_is_rejected() {
        let mut cfg = base_config();
        cfg.data_dir.clear();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut cfg = base_config();
        cfg.web_port = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn unparseable_storage_size_is_rejected() {
        let mut cfg = base_config();
        cfg.storage_size = "10GB!".into();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn empty_peer_identity_is_rejected() {
        let mut cfg = base_config();
        cfg.wg_peers.push(Peer {
            public_key: String::new(),
            wg_ip: "10.99.0.2".into(),
            ..Default::default()
        });
        assert!(validate(&cfg).is_err());
    }
}
