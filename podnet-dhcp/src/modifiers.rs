//! Response modifiers computed once at startup

use dhcproto::v6::{DhcpOption, DhcpOptions, IAAddr, Message, OptionCode, IANA};
use podnet_core::MacAddress;
use std::net::Ipv6Addr;

/// Preferred and valid lifetime of the lease: 999 days, the life of the VM
pub const LEASE_LIFETIME_SECS: u32 = 999 * 24 * 60 * 60;

/// DUID type 3, link-layer address
const DUID_LL: u16 = 3;

/// IANA hardware type for Ethernet
const HW_TYPE_ETHERNET: u16 = 1;

/// Build a DUID-LL from a hardware address
#[must_use]
pub fn duid_ll(mac: MacAddress) -> Vec<u8> {
    let mut duid = Vec::with_capacity(10);
    duid.extend_from_slice(&DUID_LL.to_be_bytes());
    duid.extend_from_slice(&HW_TYPE_ETHERNET.to_be_bytes());
    duid.extend_from_slice(&mac.octets());
    duid
}

/// One change applied to every outgoing response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    /// IA_NA carrying the leased address, echoing the request's IAID
    IaAddress {
        /// Leased address
        addr: Ipv6Addr,
        /// Preferred lifetime in seconds
        preferred: u32,
        /// Valid lifetime in seconds
        valid: u32,
    },
    /// Server identifier
    ServerId(Vec<u8>),
    /// Recursive DNS servers (option 23)
    DnsServers(Vec<Ipv6Addr>),
}

impl Modifier {
    /// Lease `addr` for the life of the VM
    #[must_use]
    pub const fn lease(addr: Ipv6Addr) -> Self {
        Self::IaAddress {
            addr,
            preferred: LEASE_LIFETIME_SECS,
            valid: LEASE_LIFETIME_SECS,
        }
    }

    /// Apply to `response`, built for `request`
    pub fn apply(&self, request: &Message, response: &mut Message) {
        match self {
            Self::IaAddress {
                addr,
                preferred,
                valid,
            } => {
                let iaid = requested_iaid(request).unwrap_or(0);
                let opts: DhcpOptions = std::iter::once(DhcpOption::IAAddr(IAAddr {
                    addr: *addr,
                    preferred_life: *preferred,
                    valid_life: *valid,
                    opts: DhcpOptions::new(),
                }))
                .collect();

                response.opts_mut().insert(DhcpOption::IANA(IANA {
                    id: iaid,
                    t1: 0,
                    t2: 0,
                    opts,
                }));
            }
            Self::ServerId(duid) => {
                response.opts_mut().insert(DhcpOption::ServerId(duid.clone()));
            }
            Self::DnsServers(servers) => {
                if !servers.is_empty() {
                    response
                        .opts_mut()
                        .insert(DhcpOption::DomainNameServers(servers.clone()));
                }
            }
        }
    }
}

/// IAID of the first IA_NA in `request`
#[must_use]
pub fn requested_iaid(request: &Message) -> Option<u32> {
    match request.opts().get(OptionCode::IANA) {
        Some(DhcpOption::IANA(iana)) => Some(iana.id),
        _ => None,
    }
}

/// Build the modifier list for one client
#[must_use]
pub fn build_modifiers(client_ip: Ipv6Addr, mac: MacAddress, dns: Vec<Ipv6Addr>) -> Vec<Modifier> {
    let mut modifiers = vec![Modifier::lease(client_ip), Modifier::ServerId(duid_ll(mac))];
    if !dns.is_empty() {
        modifiers.push(Modifier::DnsServers(dns));
    }
    modifiers
}
