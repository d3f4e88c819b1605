//! DHCP service lifecycle events with structured tracing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::time::SystemTime;

use crate::InterfaceName;

/// Events emitted by a running DHCPv6 service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DhcpEvent {
    /// Service is listening
    Started {
        /// Serving interface
        interface: InterfaceName,
        /// Address handed to the client
        client_ip: Ipv6Addr,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// A request was answered
    Replied {
        /// Serving interface
        interface: InterfaceName,
        /// Inbound message type
        request: String,
        /// Outbound message type
        reply: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// A packet was dropped without reply
    Dropped {
        /// Serving interface
        interface: InterfaceName,
        /// Why the packet was dropped
        reason: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Service loop exited
    Stopped {
        /// Serving interface
        interface: InterfaceName,
        /// Error that ended the loop, `None` on orderly shutdown
        error: Option<String>,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// Supervisor is restarting a stopped service
    Restarting {
        /// Serving interface
        interface: InterfaceName,
        /// Restart attempt, starting at 1
        attempt: u32,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },
}

impl DhcpEvent {
    /// Get the interface from any event
    #[must_use]
    pub const fn interface(&self) -> &InterfaceName {
        match self {
            Self::Started { interface, .. }
            | Self::Replied { interface, .. }
            | Self::Dropped { interface, .. }
            | Self::Stopped { interface, .. }
            | Self::Restarting { interface, .. } => interface,
        }
    }

    /// Get the timestamp from any event
    #[must_use]
    pub const fn timestamp(&self) -> SystemTime {
        match self {
            Self::Started { timestamp, .. }
            | Self::Replied { timestamp, .. }
            | Self::Dropped { timestamp, .. }
            | Self::Stopped { timestamp, .. }
            | Self::Restarting { timestamp, .. } => *timestamp,
        }
    }

    /// Check if this is a critical event
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, Self::Stopped { error: Some(_), .. })
    }

    /// Emit structured tracing event
    pub fn emit_trace(&self) {
        match self {
            Self::Started {
                interface,
                client_ip,
                ..
            } => {
                tracing::info!(
                    interface = %interface,
                    client_ip = %client_ip,
                    event = "started",
                    "DHCPv6 service started"
                );
            }
            Self::Replied {
                interface,
                request,
                reply,
                ..
            } => {
                tracing::debug!(
                    interface = %interface,
                    request = %request,
                    reply = %reply,
                    event = "replied",
                    "DHCPv6 reply sent"
                );
            }
            Self::Dropped {
                interface, reason, ..
            } => {
                tracing::warn!(
                    interface = %interface,
                    reason = %reason,
                    event = "dropped",
                    "DHCPv6 packet dropped"
                );
            }
            Self::Stopped {
                interface,
                error: Some(error),
                ..
            } => {
                tracing::error!(
                    interface = %interface,
                    error = %error,
                    event = "stopped",
                    "DHCPv6 service stopped"
                );
            }
            Self::Stopped {
                interface,
                error: None,
                ..
            } => {
                tracing::info!(
                    interface = %interface,
                    event = "stopped",
                    "DHCPv6 service shut down"
                );
            }
            Self::Restarting {
                interface, attempt, ..
            } => {
                tracing::warn!(
                    interface = %interface,
                    attempt,
                    event = "restarting",
                    "Restarting DHCPv6 service"
                );
            }
        }
    }
}

impl fmt::Display for DhcpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started {
                interface,
                client_ip,
                ..
            } => write!(f, "DHCPv6 on {interface} serving {client_ip}"),
            Self::Replied {
                interface,
                request,
                reply,
                ..
            } => write!(f, "DHCPv6 on {interface} answered {request} with {reply}"),
            Self::Dropped {
                interface, reason, ..
            } => write!(f, "DHCPv6 on {interface} dropped packet: {reason}"),
            Self::Stopped {
                interface,
                error: Some(error),
                ..
            } => write!(f, "DHCPv6 on {interface} stopped: {error}"),
            Self::Stopped {
                interface,
                error: None,
                ..
            } => write!(f, "DHCPv6 on {interface} shut down"),
            Self::Restarting {
                interface, attempt, ..
            } => write!(f, "DHCPv6 on {interface} restarting (attempt {attempt})"),
        }
    }
}

// Custom SystemTime serialization
mod systemtime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(since_epoch.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}
