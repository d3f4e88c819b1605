//! Restart supervision for the DHCPv6 serve loop

use podnet_core::{DhcpEvent, Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::conn::PacketConn;
use crate::interface::ServerInterface;
use crate::server::{RunningServer, SingleClientDhcpv6Server};

type ConnFactory = dyn Fn() -> Result<(Arc<dyn PacketConn>, ServerInterface)> + Send + Sync;

/// Keeps a [`SingleClientDhcpv6Server`] running
///
/// A serve loop that fails is started again after the configured backoff,
/// up to `max_restarts` times in total. The first start is not retried: a
/// missing interface or namespace is reported to the caller immediately.
pub struct Supervisor {
    server: Arc<SingleClientDhcpv6Server>,
    connect: Option<Box<ConnFactory>>,
}

impl Supervisor {
    /// Create a supervisor that opens the multicast socket on every start
    #[must_use]
    pub fn new(server: SingleClientDhcpv6Server) -> Self {
        Self {
            server: Arc::new(server),
            connect: None,
        }
    }

    /// Create a supervisor that takes a fresh connection from `connect` on
    /// every start
    #[must_use]
    pub fn with_connections<F>(server: SingleClientDhcpv6Server, connect: F) -> Self
    where
        F: Fn() -> Result<(Arc<dyn PacketConn>, ServerInterface)> + Send + Sync + 'static,
    {
        Self {
            server: Arc::new(server),
            connect: Some(Box::new(connect)),
        }
    }

    async fn start_server(&self) -> Result<RunningServer> {
        match self.connect {
            Some(ref connect) => {
                let (conn, interface) = connect()?;
                self.server.start_on(conn, interface)
            }
            None => self.server.start().await,
        }
    }

    /// Start the server and supervise it in the background
    ///
    /// # Errors
    /// Returns error if the first start fails
    pub async fn start(self) -> Result<SupervisorHandle> {
        let running = self.start_server().await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.supervise(running, shutdown_rx));

        Ok(SupervisorHandle {
            shutdown: shutdown_tx,
            task,
        })
    }

    async fn supervise(self, mut running: RunningServer, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let config = self.server.config();
        let mut restarts = 0u32;

        loop {
            let outcome = tokio::select! {
                joined = &mut running.task => Some(joined),
                _ = shutdown.changed() => None,
            };

            let mut error = match outcome {
                None => return running.shutdown().await,
                Some(Ok(Ok(()))) => return Ok(()),
                Some(Ok(Err(e))) => e,
                Some(Err(e)) => Error::TaskJoin(e),
            };

            running = loop {
                if restarts >= config.max_restarts {
                    tracing::error!(
                        interface = %config.interface,
                        restarts,
                        error = %error,
                        "DHCPv6 server failed, restart budget exhausted"
                    );
                    return Err(error);
                }

                restarts += 1;
                tracing::warn!(
                    interface = %config.interface,
                    attempt = restarts,
                    error = %error,
                    "DHCPv6 server failed, restarting"
                );
                self.server.emit(DhcpEvent::Restarting {
                    interface: config.interface.clone(),
                    attempt: restarts,
                    timestamp: SystemTime::now(),
                });

                tokio::select! {
                    () = tokio::time::sleep(config.restart_backoff) => {}
                    _ = shutdown.changed() => return Ok(()),
                }

                match self.start_server().await {
                    Ok(running) => break running,
                    Err(e) => error = e,
                }
            };
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("server", &self.server)
            .field("custom_connections", &self.connect.is_some())
            .finish()
    }
}

/// Handle to a supervised server
#[derive(Debug)]
pub struct SupervisorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl SupervisorHandle {
    /// Whether supervision has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the server and wait for supervision to end
    ///
    /// # Errors
    /// Returns the final error if the restart budget was already exhausted
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await?
    }

    /// Run until `signal` resolves, then stop
    ///
    /// Returns early if supervision ends first.
    ///
    /// # Errors
    /// Returns the last serve error once no restarts remain
    pub async fn run_until<F>(mut self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let finished = tokio::select! {
            joined = &mut self.task => Some(joined),
            () = signal => None,
        };

        match finished {
            Some(joined) => joined?,
            None => self.shutdown().await,
        }
    }

    /// Wait until supervision ends on its own
    ///
    /// # Errors
    /// Returns the last serve error once no restarts remain
    pub async fn wait(self) -> Result<()> {
        self.task.await?
    }
}
