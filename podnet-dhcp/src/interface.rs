//! Serving interface resolution

use nix::ifaddrs::getifaddrs;
use nix::net::if_::if_nametoindex;
use podnet_core::{Error, InterfaceName, MacAddress, Result};

/// The interface the responder serves, as seen from its namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInterface {
    /// Interface name
    pub name: InterfaceName,
    /// Kernel interface index
    pub index: u32,
    /// Hardware address, source of the server DUID
    pub mac: MacAddress,
}

impl ServerInterface {
    /// Build from known values
    #[must_use]
    pub const fn new(name: InterfaceName, index: u32, mac: MacAddress) -> Self {
        Self { name, index, mac }
    }

    /// Resolve `name` in the calling thread's network namespace
    ///
    /// # Errors
    /// Returns [`Error::InterfaceNotFound`] if no such interface exists, or
    /// [`Error::InvalidConfig`] if it has no hardware address
    pub fn lookup(name: &InterfaceName) -> Result<Self> {
        let index = if_nametoindex(name.as_str()).map_err(|e| {
            tracing::debug!(interface = %name, error = %e, "if_nametoindex failed");
            Error::InterfaceNotFound {
                name: name.to_string(),
            }
        })?;

        let mac = getifaddrs()?
            .filter(|ifaddr| ifaddr.interface_name == name.as_str())
            .find_map(|ifaddr| {
                ifaddr
                    .address
                    .as_ref()
                    .and_then(|addr| addr.as_link_addr())
                    .and_then(|link| link.addr())
            })
            .map(MacAddress::new)
            .ok_or_else(|| {
                Error::invalid_config(format!("Interface {name} has no hardware address"))
            })?;

        tracing::debug!(interface = %name, index, mac = %mac, "Resolved serving interface");

        Ok(Self::new(name.clone(), index, mac))
    }
}
