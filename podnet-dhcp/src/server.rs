//! Single-client DHCPv6 server
//!
//! Startup resolves the interface and opens the socket, inside the target
//! namespace when one is configured, and fails synchronously. Afterwards the
//! serve loop runs as a tokio task: per-packet problems are logged and
//! dropped, while a failing connection ends the loop with an error that is
//! both emitted as [`DhcpEvent::Stopped`] and returned from the task.

use podnet_core::{DhcpEvent, Error, InterfaceName, Result, VmNetworkConfig};
use podnet_namespace::NamespaceSwitcher;
use socket2::Socket;
use std::io;
use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::DhcpServerConfig;
use crate::conn::{PacketConn, PacketInfo};
use crate::filtered::FilteredPacketConnection;
use crate::handler::Responder;
use crate::interface::ServerInterface;
use crate::modifiers::build_modifiers;
use crate::socket::{bind_multicast, MulticastSocket};

/// Largest datagram the serve loop accepts
const MAX_DATAGRAM: usize = 65_535;

/// DHCPv6 server handing one preconfigured address to one guest
pub struct SingleClientDhcpv6Server {
    config: DhcpServerConfig,
    network: VmNetworkConfig,
    event_tx: Option<mpsc::Sender<DhcpEvent>>,
}

impl SingleClientDhcpv6Server {
    /// Create a server for `network` on the configured interface
    ///
    /// # Errors
    /// Returns error if either configuration is invalid
    pub fn new(config: DhcpServerConfig, network: VmNetworkConfig) -> Result<Self> {
        config.validate()?;
        network.validate()?;

        Ok(Self {
            config,
            network,
            event_tx: None,
        })
    }

    /// Add event channel for emitting lifecycle events
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::Sender<DhcpEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Server configuration
    #[must_use]
    pub const fn config(&self) -> &DhcpServerConfig {
        &self.config
    }

    /// Network configuration being served
    #[must_use]
    pub const fn network(&self) -> &VmNetworkConfig {
        &self.network
    }

    /// Resolve the interface, open the socket and start serving
    ///
    /// # Errors
    /// Returns error if the namespace, interface or socket cannot be set up
    pub async fn start(&self) -> Result<RunningServer> {
        let (interface, socket) = self.open_socket().await?;
        let socket = MulticastSocket::from_socket(socket)?;

        tracing::info!(
            interface = %interface.name,
            if_index = interface.index,
            mac = %interface.mac,
            netns = ?self.config.netns,
            "DHCPv6 server listening"
        );

        self.start_on(socket, interface)
    }

    /// Start serving on an existing connection
    ///
    /// The connection is wrapped in a [`FilteredPacketConnection`] scoped to
    /// `interface`.
    ///
    /// # Errors
    /// Returns error if the read timeout cannot be applied
    pub fn start_on<C>(&self, conn: C, interface: ServerInterface) -> Result<RunningServer>
    where
        C: PacketConn + 'static,
    {
        let conn = FilteredPacketConnection::new(conn, interface.index);
        conn.set_read_timeout(self.config.read_timeout)?;
        let conn: Arc<dyn PacketConn> = Arc::new(conn);

        let responder = Responder::new(build_modifiers(
            self.network.client_ip,
            interface.mac,
            self.network.dns_v6(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let serve_loop = ServeLoop {
            conn: Arc::clone(&conn),
            responder,
            interface: interface.name.clone(),
            client_ip: self.network.client_ip,
            event_tx: self.event_tx.clone(),
        };
        let task = tokio::spawn(serve_loop.run(shutdown_rx));

        Ok(RunningServer {
            interface,
            conn,
            shutdown: shutdown_tx,
            task,
        })
    }

    pub(crate) fn emit(&self, event: DhcpEvent) {
        emit(self.event_tx.as_ref(), event);
    }

    async fn open_socket(&self) -> Result<(ServerInterface, Socket)> {
        let name = self.config.interface.clone();

        match self.config.netns {
            Some(ref path) => {
                let switcher = NamespaceSwitcher::open(path)?;
                switcher.run_async(move |_| open_on_interface(&name)).await
            }
            None => open_on_interface(&name),
        }
    }
}

impl std::fmt::Debug for SingleClientDhcpv6Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleClientDhcpv6Server")
            .field("config", &self.config)
            .field("client_ip", &self.network.client_ip)
            .finish_non_exhaustive()
    }
}

/// Both steps must see the same network namespace
fn open_on_interface(name: &InterfaceName) -> Result<(ServerInterface, Socket)> {
    let interface = ServerInterface::lookup(name)?;
    let socket = bind_multicast(interface.index)?;
    Ok((interface, socket))
}

/// Handle to a started serve loop
///
/// Dropping the handle stops the loop.
pub struct RunningServer {
    interface: ServerInterface,
    conn: Arc<dyn PacketConn>,
    shutdown: watch::Sender<bool>,
    pub(crate) task: JoinHandle<Result<()>>,
}

impl RunningServer {
    /// Interface being served
    #[must_use]
    pub const fn interface(&self) -> &ServerInterface {
        &self.interface
    }

    /// Local address of the connection
    ///
    /// # Errors
    /// Returns error if the address cannot be read
    pub fn local_addr(&self) -> Result<SocketAddrV6> {
        self.conn.local_addr()
    }

    /// Whether the serve loop has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the serve loop and wait for it
    ///
    /// # Errors
    /// Returns the error that ended the loop, if it had already failed
    pub async fn shutdown(self) -> Result<()> {
        // Fails only if the loop already exited
        let _ = self.shutdown.send(true);
        self.task.await?
    }

    /// Wait for the serve loop to exit on its own
    ///
    /// # Errors
    /// Returns the error that ended the loop
    pub async fn wait(self) -> Result<()> {
        self.task.await?
    }
}

impl std::fmt::Debug for RunningServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningServer")
            .field("interface", &self.interface)
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

struct ServeLoop {
    conn: Arc<dyn PacketConn>,
    responder: Responder,
    interface: InterfaceName,
    client_ip: Ipv6Addr,
    event_tx: Option<mpsc::Sender<DhcpEvent>>,
}

impl ServeLoop {
    async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.emit(DhcpEvent::Started {
            interface: self.interface.clone(),
            client_ip: self.client_ip,
            timestamp: SystemTime::now(),
        });

        let mut buf = vec![0u8; MAX_DATAGRAM];

        let result = loop {
            let received = tokio::select! {
                _ = shutdown.changed() => break Ok(()),
                received = self.conn.recv_from(&mut buf) => received,
            };

            match received {
                Ok((n, from, info)) => self.handle_packet(&buf[..n], from, info).await,
                Err(Error::Io(ref e)) if e.kind() == io::ErrorKind::TimedOut => {
                    tracing::trace!(interface = %self.interface, "Read timeout elapsed");
                }
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = self.conn.close() {
            tracing::debug!(interface = %self.interface, error = %e, "Connection already closed");
        }

        self.emit(DhcpEvent::Stopped {
            interface: self.interface.clone(),
            error: result.as_ref().err().map(ToString::to_string),
            timestamp: SystemTime::now(),
        });

        result
    }

    async fn handle_packet(&self, packet: &[u8], from: SocketAddrV6, info: Option<PacketInfo>) {
        tracing::trace!(from = %from, len = packet.len(), "Received DHCPv6 packet");

        let response = match self.responder.respond(packet) {
            Ok(Some(response)) => response,
            Ok(None) => return,
            Err(e) => {
                self.dropped(e.to_string());
                return;
            }
        };

        match self.conn.send_to(&response.bytes, from, info).await {
            Ok(_) => self.emit(DhcpEvent::Replied {
                interface: self.interface.clone(),
                request: format!("{:?}", response.request_type),
                reply: format!("{:?}", response.reply_type),
                timestamp: SystemTime::now(),
            }),
            Err(e) => self.dropped(format!("failed to send {:?}: {e}", response.reply_type)),
        }
    }

    fn dropped(&self, reason: String) {
        self.emit(DhcpEvent::Dropped {
            interface: self.interface.clone(),
            reason,
            timestamp: SystemTime::now(),
        });
    }

    fn emit(&self, event: DhcpEvent) {
        emit(self.event_tx.as_ref(), event);
    }
}

fn emit(tx: Option<&mpsc::Sender<DhcpEvent>>, event: DhcpEvent) {
    event.emit_trace();

    if let Some(tx) = tx {
        // Never stall the serve loop on a slow consumer
        if let Err(e) = tx.try_send(event) {
            tracing::trace!(error = %e, "Event not delivered");
        }
    }
}
