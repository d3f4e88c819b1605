//! Open references to a single namespace

use nix::sched::setns;
use podnet_core::{Error, Result};
use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::info::{current_thread_path, NamespaceId};
use crate::kind::NamespaceKind;
use crate::validator;

/// An open, typed reference to one Linux namespace
///
/// The descriptor sits behind a mutex, so a `close` racing a `set` on the
/// same handle is serialized: the loser sees [`Error::HandleClosed`] instead
/// of a recycled descriptor.
#[derive(Debug)]
pub struct NamespaceHandle {
    file: Mutex<Option<File>>,
    path: PathBuf,
    kind: NamespaceKind,
}

impl NamespaceHandle {
    /// Open the namespace at `path`
    ///
    /// # Errors
    /// - [`Error::NotFound`] / [`Error::NotNamespace`] from validation
    /// - [`Error::UnsupportedKind`] unless the path ends in `net` or `pid`
    /// - [`Error::Io`] if the path cannot be opened
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        validator::validate(path)?;
        let kind = NamespaceKind::from_path(path)?;
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;

        tracing::trace!(
            path = %path.display(),
            kind = %kind,
            fd = file.as_raw_fd(),
            "Opened namespace handle"
        );

        Ok(Self {
            file: Mutex::new(Some(file)),
            path: path.to_path_buf(),
            kind,
        })
    }

    /// Open the calling OS thread's active namespace of `kind`
    ///
    /// # Errors
    /// Returns error if the per-thread `/proc` entry cannot be opened
    pub fn current(kind: NamespaceKind) -> Result<Self> {
        Self::open(current_thread_path(kind))
    }

    /// Path the handle was opened from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Namespace kind
    #[must_use]
    pub const fn kind(&self) -> NamespaceKind {
        self.kind
    }

    /// Raw descriptor, valid until the handle is closed
    ///
    /// # Errors
    /// Returns [`Error::HandleClosed`] after `close`
    pub fn descriptor(&self) -> Result<RawFd> {
        self.lock()
            .as_ref()
            .map(AsRawFd::as_raw_fd)
            .ok_or_else(|| self.closed())
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Identity of the referenced namespace
    ///
    /// # Errors
    /// Returns [`Error::HandleClosed`] after `close`, or an I/O error from fstat(2)
    pub fn id(&self) -> Result<NamespaceId> {
        let guard = self.lock();
        let file = guard.as_ref().ok_or_else(|| self.closed())?;
        let metadata = file.metadata()?;

        Ok(NamespaceId {
            dev: metadata.dev(),
            inode: metadata.ino(),
        })
    }

    /// Move the calling OS thread into this namespace
    ///
    /// # Errors
    /// Returns [`Error::HandleClosed`] after `close`, or [`Error::Switch`]
    /// if setns(2) fails
    pub fn set(&self) -> Result<()> {
        let guard = self.lock();
        let file = guard.as_ref().ok_or_else(|| self.closed())?;

        setns(file, self.kind.clone_flag()).map_err(|e| {
            tracing::error!(
                path = %self.path.display(),
                kind = %self.kind,
                error = %e,
                "setns failed"
            );
            Error::Switch {
                kind: self.kind.to_string(),
                message: format!("setns({}): {e}", self.path.display()),
            }
        })
    }

    /// Release the descriptor
    ///
    /// # Errors
    /// Returns [`Error::HandleClosed`] if the handle was already closed
    pub fn close(&self) -> Result<()> {
        let file = self.lock().take().ok_or_else(|| self.closed())?;

        tracing::trace!(
            path = %self.path.display(),
            fd = file.as_raw_fd(),
            "Closing namespace handle"
        );
        drop(file);

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn closed(&self) -> Error {
        Error::HandleClosed {
            path: self.path.clone(),
        }
    }
}
