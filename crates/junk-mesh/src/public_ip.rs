//! Discovering this node's own public IP address, so a node behind NAT can
//! advertise a usable WireGuard endpoint without manual configuration.

use std::time::Duration;

pub trait PublicIpProbe: Send + Sync {
    fn probe(&self) -> Option<String>;
}

/// Asks a remote echo service over plain HTTP and trims whatever it returns.
/// Any failure (connect, timeout, non-200, unparseable body) yields `None`
/// rather than an error: losing public-IP discovery for one tick is not
/// fatal, the existing endpoint is simply left untouched.
pub struct HttpPublicIpProbe {
    addr: String,
    path: String,
    timeout: Duration,
}

impl HttpPublicIpProbe {
    pub fn new(addr: impl Into<String>, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            path: path.into(),
            timeout,
        }
    }
}

impl PublicIpProbe for HttpPublicIpProbe {
    fn probe(&self) -> Option<String> {
        let response = junk_web::request(&self.addr, "GET", &self.path, &[], self.timeout).ok()?;
        if response.status != 200 {
            return None;
        }
        let text = String::from_utf8(response.body).ok()?;
        let ip = text.trim();
        if ip.is_empty() || ip.parse::<std::net::IpAddr>().is_err() {
            return None;
        }
        Some(ip.to_string())
    }
}

/// Test double returning a fixed address, or none at all.
pub struct FixedPublicIp(pub Option<String>);

impl PublicIpProbe for FixedPublicIp {
    fn probe(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_probe_returns_its_configured_value() {
        let probe = FixedPublicIp(Some("203.0.113.5".to_string()));
        assert_eq!(probe.probe(), Some("203.0.113.5".to_string()));
    }

    #[test]
    fn fixed_probe_can_simulate_failure() {
        let probe = FixedPublicIp(None);
        assert_eq!(probe.probe(), None);
    }
}
