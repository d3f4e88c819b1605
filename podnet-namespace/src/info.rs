//! Namespace identity and per-process introspection

use podnet_core::{Error, ProcessId, Result, ThreadId};
use serde::Serialize;
use std::fmt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use crate::kind::NamespaceKind;

/// Per-thread `/proc` path for the calling OS thread's namespace of `kind`
///
/// Threads of one process may sit in different namespaces, so this is the
/// only reliable way to name "the namespace I am in right now".
#[must_use]
pub fn current_thread_path(kind: NamespaceKind) -> PathBuf {
    PathBuf::from(format!(
        "/proc/{}/task/{}/ns/{}",
        ProcessId::current(),
        ThreadId::current(),
        kind.proc_name()
    ))
}

/// Per-process `/proc` path for `pid`'s namespace of `kind`
#[must_use]
pub fn process_path(pid: ProcessId, kind: NamespaceKind) -> PathBuf {
    PathBuf::from(format!("/proc/{pid}/ns/{}", kind.proc_name()))
}

/// Identity of a namespace: the device and inode backing its nsfs entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NamespaceId {
    /// Device of the nsfs mount
    pub dev: u64,
    /// Inode number, the value shown in `net:[...]` links
    pub inode: u64,
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.inode)
    }
}

/// Resolve the namespace identity behind `path`
///
/// # Errors
/// Returns [`Error::NotFound`] if the path does not exist
pub fn namespace_id(path: impl AsRef<Path>) -> Result<NamespaceId> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;

    Ok(NamespaceId {
        dev: metadata.dev(),
        inode: metadata.ino(),
    })
}

/// Namespace identifiers of one process
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceInfo {
    /// Inspected process
    pub process: ProcessId,
    /// Network namespace
    pub network: Option<NamespaceId>,
    /// PID namespace
    pub pid: Option<NamespaceId>,
}

impl NamespaceInfo {
    /// Read the namespaces of `pid`
    ///
    /// Individual entries that cannot be read (e.g. permission denied on
    /// another user's process) are reported as `None`.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the process does not exist
    pub fn for_pid(pid: ProcessId) -> Result<Self> {
        let proc_dir = PathBuf::from(format!("/proc/{pid}"));
        if !proc_dir.exists() {
            return Err(Error::NotFound { path: proc_dir });
        }

        let read = |kind| namespace_id(process_path(pid, kind)).ok();

        Ok(Self {
            process: pid,
            network: read(NamespaceKind::Network),
            pid: read(NamespaceKind::Pid),
        })
    }

    /// Read the namespaces of the calling process
    ///
    /// # Errors
    /// Returns error if `/proc` is unavailable
    pub fn current() -> Result<Self> {
        Self::for_pid(ProcessId::current())
    }

    /// Identifier for `kind`
    #[must_use]
    pub const fn get(&self, kind: NamespaceKind) -> Option<NamespaceId> {
        match kind {
            NamespaceKind::Network => self.network,
            NamespaceKind::Pid => self.pid,
        }
    }

    /// Check if in a different namespace than init (PID 1)
    ///
    /// # Errors
    /// Returns error if init's namespaces cannot be read
    pub fn is_isolated(&self) -> Result<bool> {
        let init = Self::for_pid(ProcessId::from_raw(1))?;

        Ok(NamespaceKind::ALL
            .iter()
            .any(|&kind| self.get(kind).is_some() && self.get(kind) != init.get(kind)))
    }
}

impl fmt::Display for NamespaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Namespace Info:")?;
        for kind in NamespaceKind::ALL {
            match self.get(kind) {
                Some(id) => writeln!(f, "  {:<4} {kind}:{id}", kind.proc_name().to_uppercase())?,
                None => writeln!(f, "  {:<4} unavailable", kind.proc_name().to_uppercase())?,
            }
        }
        Ok(())
    }
}
