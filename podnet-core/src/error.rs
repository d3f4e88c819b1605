//! Error types for podnet

use std::path::PathBuf;

use thiserror::Error;

/// podnet error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Namespace path does not exist
    #[error("Namespace path not found: {}", path.display())]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Path exists but is not backed by nsfs or procfs
    #[error("Not a namespace: {} (filesystem magic {fs_type:#x})", path.display())]
    NotNamespace {
        /// Path that was inspected
        path: PathBuf,
        /// Filesystem magic reported by statfs(2)
        fs_type: i64,
    },

    /// Trailing path segment is not a supported namespace kind
    #[error("Unsupported namespace kind '{kind}' in {}", path.display())]
    UnsupportedKind {
        /// Path that was parsed
        path: PathBuf,
        /// Trailing segment that failed to parse
        kind: String,
    },

    /// setns(2) failed
    #[error("Failed to switch {kind} namespace: {message}")]
    Switch {
        /// Namespace kind being joined
        kind: String,
        /// Error message
        message: String,
    },

    /// Operation on a namespace handle that was already released
    #[error("Namespace handle already closed: {}", path.display())]
    HandleClosed {
        /// Path the handle was opened from
        path: PathBuf,
    },

    /// Work executed on the pinned namespace thread panicked
    #[error("Namespace closure panicked: {message}")]
    ClosurePanicked {
        /// Panic payload, if it was a string
        message: String,
    },

    /// DHCP message could not be decoded, built or sent
    #[error("DHCP protocol error: {message}")]
    Protocol {
        /// Error message
        message: String,
    },

    /// Network interface lookup failed
    #[error("Interface not found: {name}")]
    InterfaceNotFound {
        /// Interface name
        name: String,
    },

    /// Packet connection was closed
    #[error("Packet connection closed")]
    ConnectionClosed,

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// Configuration payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Task join error
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl Error {
    /// Build a protocol error from anything printable
    pub fn protocol(message: impl std::fmt::Display) -> Self {
        Self::Protocol {
            message: message.to_string(),
        }
    }

    /// Build a configuration error from anything printable
    pub fn invalid_config(message: impl std::fmt::Display) -> Self {
        Self::InvalidConfig {
            message: message.to_string(),
        }
    }

    /// Whether the error means the namespace path does not exist
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the error means the path is not a namespace
    #[must_use]
    pub const fn is_not_namespace(&self) -> bool {
        matches!(self, Self::NotNamespace { .. })
    }

    /// Whether the error came from an already released handle
    #[must_use]
    pub const fn is_handle_closed(&self) -> bool {
        matches!(self, Self::HandleClosed { .. })
    }
}

/// Result type alias for podnet operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        let err = Error::NotFound {
            path: PathBuf::from("/proc/999999/ns/net"),
        };
        assert!(err.is_not_found());
        assert!(!err.is_not_namespace());

        let err = Error::NotNamespace {
            path: PathBuf::from("/etc/hostname"),
            fs_type: 0xef53,
        };
        assert!(err.is_not_namespace());
        assert!(err.to_string().contains("0xef53"));
    }

    #[test]
    fn test_unsupported_kind_display() {
        let err = Error::UnsupportedKind {
            path: PathBuf::from("/proc/1/ns/mnt"),
            kind: "mnt".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported namespace kind 'mnt' in /proc/1/ns/mnt"
        );
    }
}
