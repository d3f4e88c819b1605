//! In-namespace DHCPv6 responder for a single VM
//!
//! This crate answers the guest's DHCPv6 traffic on one interface:
//! - [`SingleClientDhcpv6Server`] - Opens the socket inside the pod namespace and runs the serve loop
//! - [`Supervisor`] - Restarts a failed serve loop with backoff
//! - [`FilteredPacketConnection`] - Scopes a wildcard-bound connection to one interface
//! - [`Responder`] - Stateless message handling
//! - [`PacketConn`] - Transport abstraction with a socket and a mock implementation

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod conn;
pub mod filtered;
pub mod handler;
pub mod interface;
pub mod modifiers;
pub mod server;
pub mod socket;
pub mod supervisor;

pub use config::DhcpServerConfig;
pub use conn::{MockPacketConn, PacketConn, PacketInfo, SentPacket};
pub use filtered::FilteredPacketConnection;
pub use handler::{response_type, Responder, Response};
pub use interface::ServerInterface;
pub use modifiers::{build_modifiers, duid_ll, Modifier, LEASE_LIFETIME_SECS};
pub use server::{RunningServer, SingleClientDhcpv6Server};
pub use socket::{bind_multicast, MulticastSocket, DHCPV6_CLIENT_PORT, DHCPV6_SERVER_PORT};
pub use supervisor::{Supervisor, SupervisorHandle};
