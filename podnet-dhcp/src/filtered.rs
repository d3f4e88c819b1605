//! Single-interface view of a wildcard-bound connection
//!
//! Multicast group membership forces the DHCPv6 socket onto `[::]:547`, so it
//! sees traffic from every interface in the namespace. This wrapper drops
//! whatever did not arrive on the target interface and scopes replies to it.

use async_trait::async_trait;
use podnet_core::Result;
use std::net::SocketAddrV6;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::conn::{PacketConn, PacketInfo};

/// Connection that only surfaces packets received on one interface
#[derive(Debug)]
pub struct FilteredPacketConnection<C> {
    inner: C,
    if_index: u32,
    last_info: Mutex<Option<PacketInfo>>,
}

impl<C: PacketConn> FilteredPacketConnection<C> {
    /// Wrap `inner`, keeping only packets from interface `if_index`
    #[must_use]
    pub const fn new(inner: C, if_index: u32) -> Self {
        Self {
            inner,
            if_index,
            last_info: Mutex::new(None),
        }
    }

    /// Target interface index
    #[must_use]
    pub const fn if_index(&self) -> u32 {
        self.if_index
    }

    /// Underlying connection
    #[must_use]
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    /// Control message of the most recently surfaced packet
    #[must_use]
    pub fn last_info(&self) -> Option<PacketInfo> {
        *self.last_info.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<C: PacketConn> PacketConn for FilteredPacketConnection<C> {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddrV6, Option<PacketInfo>)> {
        loop {
            let (n, from, info) = self.inner.recv_from(buf).await?;

            match info {
                Some(info) if info.if_index != self.if_index => {
                    tracing::trace!(
                        from = %from,
                        if_index = info.if_index,
                        target = self.if_index,
                        "Discarding packet from another interface"
                    );
                }
                _ => {
                    // Packets without ancillary data pass through
                    *self.last_info.lock().unwrap_or_else(PoisonError::into_inner) = info;
                    return Ok((n, from, info));
                }
            }
        }
    }

    async fn send_to(
        &self,
        buf: &[u8],
        addr: SocketAddrV6,
        info: Option<PacketInfo>,
    ) -> Result<usize> {
        // Let the kernel pick the source address for the target interface
        let info = info.or_else(|| self.last_info()).map(|info| PacketInfo {
            src: None,
            ..info
        });

        self.inner.send_to(buf, addr, info).await
    }

    fn local_addr(&self) -> Result<SocketAddrV6> {
        self.inner.local_addr()
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout)
    }
}
