//! Packet connection trait for pluggable transports

use async_trait::async_trait;
use bytes::Bytes;
use podnet_core::{Error, Result};
use std::collections::VecDeque;
use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// Per-packet ancillary data (`IPV6_PKTINFO`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    /// Interface the packet arrived on, or should leave from
    pub if_index: u32,
    /// Destination address on receive, source override on send
    pub src: Option<Ipv6Addr>,
}

impl PacketInfo {
    /// Info scoped to an interface, with no address override
    #[must_use]
    pub const fn on_interface(if_index: u32) -> Self {
        Self {
            if_index,
            src: None,
        }
    }
}

/// Trait for datagram transports carrying DHCPv6
///
/// This allows for different implementations:
/// - [`MulticastSocket`](crate::MulticastSocket) - Production UDP/IPv6 socket
/// - [`FilteredPacketConnection`](crate::FilteredPacketConnection) - Single-interface view of another connection
/// - [`MockPacketConn`] - Testing without sockets
///
/// # Thread Safety
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait PacketConn: Send + Sync {
    /// Receive one datagram into `buf`
    ///
    /// # Errors
    /// Returns [`Error::ConnectionClosed`] after `close`, or an I/O error
    /// (`TimedOut` when a read timeout elapses)
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddrV6, Option<PacketInfo>)>;

    /// Send one datagram to `addr`
    ///
    /// # Errors
    /// Returns error if the datagram cannot be sent
    async fn send_to(&self, buf: &[u8], addr: SocketAddrV6, info: Option<PacketInfo>)
    -> Result<usize>;

    /// Local address the connection is bound to
    ///
    /// # Errors
    /// Returns error if the address cannot be read
    fn local_addr(&self) -> Result<SocketAddrV6>;

    /// Close the connection, waking pending reads
    ///
    /// # Errors
    /// Returns error if the connection cannot be closed
    fn close(&self) -> Result<()>;

    /// Bound every subsequent read
    ///
    /// # Errors
    /// Returns error if the timeout cannot be applied
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Bound every subsequent write
    ///
    /// # Errors
    /// Returns error if the timeout cannot be applied
    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Bound both reads and writes
    ///
    /// # Errors
    /// Returns error if either timeout cannot be applied
    fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }
}

#[async_trait]
impl<C: PacketConn + ?Sized> PacketConn for Arc<C> {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddrV6, Option<PacketInfo>)> {
        (**self).recv_from(buf).await
    }

    async fn send_to(
        &self,
        buf: &[u8],
        addr: SocketAddrV6,
        info: Option<PacketInfo>,
    ) -> Result<usize> {
        (**self).send_to(buf, addr, info).await
    }

    fn local_addr(&self) -> Result<SocketAddrV6> {
        (**self).local_addr()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_write_timeout(timeout)
    }
}

/// A datagram recorded by [`MockPacketConn`]
#[derive(Debug, Clone)]
pub struct SentPacket {
    /// Payload
    pub data: Bytes,
    /// Destination
    pub to: SocketAddrV6,
    /// Ancillary data passed with the send
    pub info: Option<PacketInfo>,
}

/// Mock connection for testing (doesn't open sockets)
///
/// Clones share state: tests keep one clone to inject inbound datagrams and
/// collect replies while the code under test owns another.
#[derive(Clone)]
pub struct MockPacketConn {
    state: Arc<Mutex<MockState>>,
    inbound_ready: Arc<Notify>,
    outbound_ready: Arc<Notify>,
}

struct MockState {
    local_addr: SocketAddrV6,
    inbound: VecDeque<(Bytes, SocketAddrV6, Option<PacketInfo>)>,
    sent: VecDeque<SentPacket>,
    closed: bool,
    fail_sends: bool,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    call_count: usize,
}

impl MockPacketConn {
    /// Create a mock bound to `[::]:547`
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                local_addr: SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 547, 0, 0),
                inbound: VecDeque::new(),
                sent: VecDeque::new(),
                closed: false,
                fail_sends: false,
                read_timeout: None,
                write_timeout: None,
                call_count: 0,
            })),
            inbound_ready: Arc::new(Notify::new()),
            outbound_ready: Arc::new(Notify::new()),
        }
    }

    /// Queue a datagram for the next `recv_from`
    pub async fn push_inbound(
        &self,
        data: impl Into<Bytes>,
        from: SocketAddrV6,
        info: Option<PacketInfo>,
    ) {
        self.state
            .lock()
            .await
            .inbound
            .push_back((data.into(), from, info));
        self.inbound_ready.notify_one();
    }

    /// Make every subsequent `send_to` fail (for testing)
    pub async fn fail_sends(&self, fail: bool) {
        self.state.lock().await.fail_sends = fail;
    }

    /// Wait for the next sent datagram
    ///
    /// Returns `None` once the connection is closed and nothing is pending.
    pub async fn next_sent(&self) -> Option<SentPacket> {
        loop {
            let notified = self.outbound_ready.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(packet) = state.sent.pop_front() {
                    return Some(packet);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Datagrams sent and not yet taken by `next_sent`
    pub async fn sent_count(&self) -> usize {
        self.state.lock().await.sent.len()
    }

    /// Datagrams queued and not yet read
    pub async fn pending_inbound(&self) -> usize {
        self.state.lock().await.inbound.len()
    }

    /// Whether `close` has been called
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Reads and sends attempted so far (for testing)
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.call_count
    }

    /// Current read timeout (for testing)
    pub async fn read_timeout(&self) -> Option<Duration> {
        self.state.lock().await.read_timeout
    }

    /// Current write timeout (for testing)
    pub async fn write_timeout(&self) -> Option<Duration> {
        self.state.lock().await.write_timeout
    }

    async fn next_inbound(&self) -> Result<(Bytes, SocketAddrV6, Option<PacketInfo>)> {
        loop {
            let notified = self.inbound_ready.notified();
            {
                let mut state = self.state.lock().await;
                state.call_count += 1;
                if let Some(packet) = state.inbound.pop_front() {
                    return Ok(packet);
                }
                if state.closed {
                    return Err(Error::ConnectionClosed);
                }
            }
            notified.await;
        }
    }
}

impl Default for MockPacketConn {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockPacketConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPacketConn").finish_non_exhaustive()
    }
}

#[async_trait]
impl PacketConn for MockPacketConn {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddrV6, Option<PacketInfo>)> {
        let timeout = self.state.lock().await.read_timeout;

        let (data, from, info) = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.next_inbound())
                .await
                .map_err(|_| Error::Io(std::io::ErrorKind::TimedOut.into()))??,
            None => self.next_inbound().await?,
        };

        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);

        tracing::trace!(len = n, from = %from, ?info, "Mock: Received datagram");

        Ok((n, from, info))
    }

    async fn send_to(
        &self,
        buf: &[u8],
        addr: SocketAddrV6,
        info: Option<PacketInfo>,
    ) -> Result<usize> {
        let mut state = self.state.lock().await;
        state.call_count += 1;

        if state.closed {
            return Err(Error::ConnectionClosed);
        }
        if state.fail_sends {
            return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
        }

        state.sent.push_back(SentPacket {
            data: Bytes::copy_from_slice(buf),
            to: addr,
            info,
        });
        drop(state);
        self.outbound_ready.notify_one();

        tracing::trace!(len = buf.len(), to = %addr, ?info, "Mock: Sent datagram");

        Ok(buf.len())
    }

    fn local_addr(&self) -> Result<SocketAddrV6> {
        // Only contended while a test holds the lock across an await
        self.state
            .try_lock()
            .map(|state| state.local_addr)
            .map_err(|_| Error::Io(std::io::ErrorKind::WouldBlock.into()))
    }

    fn close(&self) -> Result<()> {
        let mut state = self
            .state
            .try_lock()
            .map_err(|_| Error::Io(std::io::ErrorKind::WouldBlock.into()))?;
        state.closed = true;
        drop(state);

        self.inbound_ready.notify_waiters();
        self.outbound_ready.notify_waiters();
        tracing::debug!("Mock: Closed connection");

        Ok(())
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.state
            .try_lock()
            .map(|mut state| state.read_timeout = timeout)
            .map_err(|_| Error::Io(std::io::ErrorKind::WouldBlock.into()))
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.state
            .try_lock()
            .map(|mut state| state.write_timeout = timeout)
            .map_err(|_| Error::Io(std::io::ErrorKind::WouldBlock.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SocketAddrV6 {
        "[fe80::2]:546".parse().unwrap()
    }

    #[tokio::test]
    async fn test_mock_roundtrip() {
        let conn = MockPacketConn::new();
        conn.push_inbound(vec![1, 2, 3], client(), Some(PacketInfo::on_interface(4)))
            .await;

        let mut buf = [0u8; 16];
        let (n, from, info) = conn.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
        assert_eq!(from, client());
        assert_eq!(info.map(|i| i.if_index), Some(4));

        conn.send_to(&[9, 9], client(), None).await.unwrap();
        let sent = conn.next_sent().await.unwrap();
        assert_eq!(sent.data.as_ref(), &[9, 9]);
        assert_eq!(sent.to, client());
        assert_eq!(conn.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_mock_close_wakes_reader() {
        let conn = MockPacketConn::new();
        let reader = conn.clone();

        let pending = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            reader.recv_from(&mut buf).await
        });

        tokio::task::yield_now().await;
        conn.close().unwrap();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert!(conn.send_to(&[1], client(), None).await.is_err());
        assert!(conn.next_sent().await.is_none());
    }

    #[tokio::test]
    async fn test_mock_read_timeout() {
        let conn = MockPacketConn::new();
        conn.set_read_timeout(Some(Duration::from_millis(10))).unwrap();

        let mut buf = [0u8; 16];
        let err = conn.recv_from(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::TimedOut));
    }

    #[tokio::test]
    async fn test_mock_failing_sends() {
        let conn = MockPacketConn::new();
        conn.fail_sends(true).await;

        assert!(conn.send_to(&[1], client(), None).await.is_err());
        assert_eq!(conn.sent_count().await, 0);
    }
}
