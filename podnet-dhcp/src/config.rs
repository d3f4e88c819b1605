//! DHCPv6 server configuration

use podnet_core::{Error, InterfaceName, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for one single-client DHCPv6 server
#[derive(Debug, Clone)]
pub struct DhcpServerConfig {
    /// Interface the guest is attached to
    pub interface: InterfaceName,

    /// Network namespace to start in, `None` for the caller's namespace
    pub netns: Option<PathBuf>,

    /// Restarts the supervisor may attempt after the loop fails
    pub max_restarts: u32,

    /// Delay between restarts
    pub restart_backoff: Duration,

    /// Read timeout on the packet connection
    pub read_timeout: Option<Duration>,

    /// Capacity of the lifecycle event channel
    pub event_capacity: usize,
}

impl DhcpServerConfig {
    /// Default restart budget
    pub const DEFAULT_MAX_RESTARTS: u32 = 5;

    /// Default event channel capacity
    pub const DEFAULT_EVENT_CAPACITY: usize = 64;

    /// Create a configuration for `interface` with defaults
    #[must_use]
    pub const fn new(interface: InterfaceName) -> Self {
        Self {
            interface,
            netns: None,
            max_restarts: Self::DEFAULT_MAX_RESTARTS,
            restart_backoff: Duration::from_secs(1),
            read_timeout: None,
            event_capacity: Self::DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Start the server inside the namespace at `path`
    #[must_use]
    pub fn with_netns(mut self, path: impl Into<PathBuf>) -> Self {
        self.netns = Some(path.into());
        self
    }

    /// Set the restart budget
    #[must_use]
    pub const fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Set the delay between restarts
    #[must_use]
    pub const fn with_restart_backoff(mut self, backoff: Duration) -> Self {
        self.restart_backoff = backoff;
        self
    }

    /// Set a read timeout
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the event channel capacity
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns error if a value is out of range
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("Event channel capacity must be non-zero"));
        }

        if self.read_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::invalid_config("Read timeout must be non-zero"));
        }

        if let Some(ref netns) = self.netns {
            if !netns.is_absolute() {
                return Err(Error::invalid_config(format!(
                    "Namespace path must be absolute: {}",
                    netns.display()
                )));
            }
        }

        Ok(())
    }
}
