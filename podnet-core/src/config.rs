//! VM network configuration supplied by the platform

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv6Addr};
use std::path::Path;

use crate::{Error, Result};

/// Smallest MTU an IPv6 link may carry (RFC 8200)
pub const MIN_IPV6_MTU: u16 = 1280;

/// Default link MTU
pub const DEFAULT_MTU: u16 = 1500;

/// A static route handed to the guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Destination network address
    pub destination: IpAddr,

    /// Destination prefix length
    pub prefix_len: u8,

    /// Next hop, `None` for on-link routes
    #[serde(default)]
    pub gateway: Option<IpAddr>,
}

impl Route {
    fn validate(&self) -> Result<()> {
        let max = if self.destination.is_ipv4() { 32 } else { 128 };
        if self.prefix_len > max {
            return Err(Error::invalid_config(format!(
                "Route {}/{} has an invalid prefix length",
                self.destination, self.prefix_len
            )));
        }

        if let Some(gateway) = self.gateway {
            if gateway.is_ipv4() != self.destination.is_ipv4() {
                return Err(Error::invalid_config(format!(
                    "Route {}/{} mixes address families with gateway {gateway}",
                    self.destination, self.prefix_len
                )));
            }
        }

        Ok(())
    }
}

/// Network configuration for one VM interface
///
/// Only `client_ip` and the IPv6 entries of `dns` reach the DHCPv6 responder;
/// the remaining fields are carried for the other consumers of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNetworkConfig {
    /// Address leased to the guest
    pub client_ip: Ipv6Addr,

    /// DNS servers
    #[serde(default)]
    pub dns: Vec<IpAddr>,

    /// Static routes
    #[serde(default)]
    pub routes: Vec<Route>,

    /// DNS search domains
    #[serde(default)]
    pub search_domains: Vec<String>,

    /// Link MTU
    #[serde(default = "default_mtu")]
    pub mtu: u16,

    /// Extra DHCP options keyed by option code
    #[serde(default)]
    pub custom_options: BTreeMap<u16, String>,
}

const fn default_mtu() -> u16 {
    DEFAULT_MTU
}

impl VmNetworkConfig {
    /// Create a configuration leasing `client_ip` with defaults for everything else
    #[must_use]
    pub fn new(client_ip: Ipv6Addr) -> Self {
        Self {
            client_ip,
            dns: Vec::new(),
            routes: Vec::new(),
            search_domains: Vec::new(),
            mtu: DEFAULT_MTU,
            custom_options: BTreeMap::new(),
        }
    }

    /// Add a DNS server
    #[must_use]
    pub fn with_dns(mut self, server: impl Into<IpAddr>) -> Self {
        self.dns.push(server.into());
        self
    }

    /// Add a route
    #[must_use]
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Add a search domain
    #[must_use]
    pub fn with_search_domain(mut self, domain: impl Into<String>) -> Self {
        self.search_domains.push(domain.into());
        self
    }

    /// Set the link MTU
    #[must_use]
    pub const fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    /// Add a custom option
    #[must_use]
    pub fn with_custom_option(mut self, code: u16, value: impl Into<String>) -> Self {
        self.custom_options.insert(code, value.into());
        self
    }

    /// IPv6 DNS servers, in configuration order
    #[must_use]
    pub fn dns_v6(&self) -> Vec<Ipv6Addr> {
        self.dns
            .iter()
            .filter_map(|ip| match ip {
                IpAddr::V6(v6) => Some(*v6),
                IpAddr::V4(_) => None,
            })
            .collect()
    }

    /// Parse and validate a JSON payload
    ///
    /// # Errors
    /// Returns error if the payload is malformed or fails validation
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON payload from disk
    ///
    /// # Errors
    /// Returns error if the file cannot be read or the payload is invalid
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading VM network configuration");

        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns error describing the first invalid field
    pub fn validate(&self) -> Result<()> {
        let ip = self.client_ip;
        if ip.is_unspecified() || ip.is_loopback() || ip.is_multicast() {
            return Err(Error::invalid_config(format!(
                "Client IP {ip} cannot be leased"
            )));
        }

        if self.mtu < MIN_IPV6_MTU {
            return Err(Error::invalid_config(format!(
                "MTU {} is below the IPv6 minimum of {MIN_IPV6_MTU}",
                self.mtu
            )));
        }

        for route in &self.routes {
            route.validate()?;
        }

        if let Some(domain) = self
            .search_domains
            .iter()
            .find(|d| d.is_empty() || d.len() > 253)
        {
            return Err(Error::invalid_config(format!(
                "Invalid search domain '{domain}'"
            )));
        }

        if self.custom_options.contains_key(&0) {
            return Err(Error::invalid_config("Custom option code 0 is reserved"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_builder_pattern() {
        let config = VmNetworkConfig::new("fd00::5".parse().unwrap())
            .with_dns(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0x53))
            .with_dns(Ipv4Addr::new(10, 0, 0, 53))
            .with_search_domain("cluster.local")
            .with_mtu(1450);

        assert_eq!(config.dns.len(), 2);
        assert_eq!(config.dns_v6(), vec!["fd00::53".parse::<Ipv6Addr>().unwrap()]);
        assert_eq!(config.mtu, 1450);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_defaults() {
        let config = VmNetworkConfig::from_json(r#"{"client_ip": "fd00::5"}"#).unwrap();

        assert_eq!(config.client_ip, "fd00::5".parse::<Ipv6Addr>().unwrap());
        assert_eq!(config.mtu, DEFAULT_MTU);
        assert!(config.dns.is_empty());
        assert!(config.custom_options.is_empty());
    }

    #[test]
    fn test_json_custom_options() {
        let config = VmNetworkConfig::from_json(
            r#"{"client_ip": "fd00::5", "custom_options": {"240": "extra"}}"#,
        )
        .unwrap();

        assert_eq!(config.custom_options.get(&240).map(String::as_str), Some("extra"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let base = VmNetworkConfig::new("fd00::5".parse().unwrap());

        assert!(base.clone().with_mtu(1000).validate().is_err());
        assert!(base.clone().with_custom_option(0, "x").validate().is_err());
        assert!(base.clone().with_search_domain("").validate().is_err());
        assert!(VmNetworkConfig::new(Ipv6Addr::UNSPECIFIED).validate().is_err());

        let route = Route {
            destination: "fd00::".parse().unwrap(),
            prefix_len: 129,
            gateway: None,
        };
        assert!(base.clone().with_route(route).validate().is_err());

        let route = Route {
            destination: "fd00::".parse().unwrap(),
            prefix_len: 64,
            gateway: Some("10.0.0.1".parse().unwrap()),
        };
        assert!(base.with_route(route).validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        std::fs::write(&path, r#"{"client_ip": "fd00::5", "mtu": 9000}"#).unwrap();

        let config = VmNetworkConfig::from_file(&path).unwrap();
        assert_eq!(config.mtu, 9000);

        assert!(VmNetworkConfig::from_file(dir.path().join("missing.json")).is_err());
    }
}
