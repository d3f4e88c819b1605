//! Multicast UDP/IPv6 socket on the DHCPv6 server port

use async_trait::async_trait;
use nix::cmsg_space;
use nix::sys::socket::{
    recvmsg, sendmsg, setsockopt, sockopt, ControlMessage, ControlMessageOwned, MsgFlags,
    SockaddrIn6,
};
use podnet_core::{Error, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, IoSlice, IoSliceMut};
use std::net::{Ipv6Addr, SocketAddrV6};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::sync::Notify;

use crate::conn::{PacketConn, PacketInfo};

/// DHCPv6 server port
pub const DHCPV6_SERVER_PORT: u16 = 547;

/// DHCPv6 client port
pub const DHCPV6_CLIENT_PORT: u16 = 546;

/// `All_DHCP_Relay_Agents_and_Servers` (link scope)
pub const ALL_DHCP_RELAY_AGENTS_AND_SERVERS: Ipv6Addr =
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 1, 2);

/// `All_DHCP_Servers` (site scope)
pub const ALL_DHCP_SERVERS: Ipv6Addr = Ipv6Addr::new(0xff05, 0, 0, 0, 0, 0, 1, 3);

/// Create the server socket for interface `if_index`
///
/// Binds `[::]:547`, joins both DHCPv6 server groups on the interface and
/// enables `IPV6_RECVPKTINFO`. Must run in the namespace owning the
/// interface; the returned socket keeps that namespace afterward.
///
/// # Errors
/// Returns error if the socket cannot be created, bound or joined
pub fn bind_multicast(if_index: u32) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_only_v6(true)?;
    socket.set_reuse_address(true)?;

    let addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, DHCPV6_SERVER_PORT, 0, 0);
    socket.bind(&addr.into())?;

    for group in [ALL_DHCP_RELAY_AGENTS_AND_SERVERS, ALL_DHCP_SERVERS] {
        socket.join_multicast_v6(&group, if_index).map_err(|e| {
            tracing::error!(group = %group, if_index, error = %e, "Failed to join multicast group");
            e
        })?;
    }

    setsockopt(&socket, sockopt::Ipv6RecvPacketInfo, &true)?;
    socket.set_nonblocking(true)?;

    tracing::debug!(addr = %addr, if_index, "DHCPv6 socket bound");

    Ok(socket)
}

/// Async multicast socket carrying `IPV6_PKTINFO` with every datagram
#[derive(Debug)]
pub struct MulticastSocket {
    fd: AsyncFd<Socket>,
    closed: AtomicBool,
    close_notify: Notify,
    read_timeout: Mutex<Option<Duration>>,
    write_timeout: Mutex<Option<Duration>>,
}

impl MulticastSocket {
    /// Register a socket from [`bind_multicast`] with the runtime
    ///
    /// # Errors
    /// Returns error if called outside a tokio runtime or registration fails
    pub fn from_socket(socket: Socket) -> Result<Self> {
        // SAFETY: the socket moves into the AsyncFd, which owns its descriptor until drop
        let fd = unsafe { AsyncFd::register(socket) }.map_err(io::Error::from)?;

        Ok(Self {
            fd,
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            read_timeout: Mutex::new(None),
            write_timeout: Mutex::new(None),
        })
    }

    async fn recv_ready(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddrV6, Option<PacketInfo>)> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|fd| recv_with_info(fd.get_ref().as_raw_fd(), buf)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    async fn send_ready(
        &self,
        buf: &[u8],
        addr: SocketAddrV6,
        info: Option<PacketInfo>,
    ) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.writable().await?;
            match guard.try_io(|fd| send_with_info(fd.get_ref().as_raw_fd(), buf, addr, info)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    fn timeout(slot: &Mutex<Option<Duration>>) -> Option<Duration> {
        *slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn recv_with_info(fd: RawFd, buf: &mut [u8]) -> io::Result<(usize, SocketAddrV6, Option<PacketInfo>)> {
    let mut iov = [IoSliceMut::new(buf)];
    let mut cmsg_buffer = cmsg_space!(libc::in6_pktinfo);

    let msg = recvmsg::<SockaddrIn6>(fd, &mut iov, Some(&mut cmsg_buffer), MsgFlags::empty())?;

    let mut info = None;
    for cmsg in msg.cmsgs()? {
        if let ControlMessageOwned::Ipv6PacketInfo(pktinfo) = cmsg {
            info = Some(PacketInfo {
                if_index: pktinfo.ipi6_ifindex,
                src: Some(Ipv6Addr::from(pktinfo.ipi6_addr.s6_addr)),
            });
        }
    }

    let from = msg
        .address
        .map(SocketAddrV6::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "datagram without source address"))?;

    Ok((msg.bytes, from, info))
}

fn send_with_info(
    fd: RawFd,
    buf: &[u8],
    addr: SocketAddrV6,
    info: Option<PacketInfo>,
) -> io::Result<usize> {
    let pktinfo = info.map(|info| libc::in6_pktinfo {
        ipi6_addr: libc::in6_addr {
            s6_addr: info.src.unwrap_or(Ipv6Addr::UNSPECIFIED).octets(),
        },
        ipi6_ifindex: info.if_index,
    });
    let cmsgs: Vec<ControlMessage<'_>> = pktinfo
        .as_ref()
        .map(ControlMessage::Ipv6PacketInfo)
        .into_iter()
        .collect();

    let iov = [IoSlice::new(buf)];
    let dest = SockaddrIn6::from(addr);

    Ok(sendmsg(fd, &iov, &cmsgs, MsgFlags::empty(), Some(&dest))?)
}

#[async_trait]
impl PacketConn for MulticastSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddrV6, Option<PacketInfo>)> {
        let closed = self.close_notify.notified();
        tokio::pin!(closed);
        closed.as_mut().enable();

        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let read = async {
            match Self::timeout(&self.read_timeout) {
                Some(limit) => tokio::time::timeout(limit, self.recv_ready(buf))
                    .await
                    .unwrap_or_else(|_| Err(io::ErrorKind::TimedOut.into())),
                None => self.recv_ready(buf).await,
            }
        };

        tokio::select! {
            () = &mut closed => Err(Error::ConnectionClosed),
            result = read => Ok(result?),
        }
    }

    async fn send_to(
        &self,
        buf: &[u8],
        addr: SocketAddrV6,
        info: Option<PacketInfo>,
    ) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let sent = match Self::timeout(&self.write_timeout) {
            Some(limit) => tokio::time::timeout(limit, self.send_ready(buf, addr, info))
                .await
                .unwrap_or_else(|_| Err(io::ErrorKind::TimedOut.into()))?,
            None => self.send_ready(buf, addr, info).await?,
        };

        tracing::trace!(len = sent, to = %addr, ?info, "Sent datagram");

        Ok(sent)
    }

    fn local_addr(&self) -> Result<SocketAddrV6> {
        self.fd
            .get_ref()
            .local_addr()?
            .as_socket_ipv6()
            .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::InvalidData, "not an IPv6 socket")))
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::ConnectionClosed);
        }

        self.close_notify.notify_waiters();
        tracing::debug!("DHCPv6 socket closed");

        Ok(())
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        *self.read_timeout.lock().unwrap_or_else(PoisonError::into_inner) = timeout;
        Ok(())
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        *self.write_timeout.lock().unwrap_or_else(PoisonError::into_inner) = timeout;
        Ok(())
    }
}
