//! Classification of namespace paths by filesystem magic

use nix::errno::Errno;
use nix::sys::statfs::statfs;
use podnet_core::{Error, Result};
use std::path::Path;

/// Filesystems that may back a namespace reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsMagic {
    /// nsfs, the target of `/proc/<pid>/ns/*` links and bind mounts
    Nsfs,
    /// procfs, for kernels that expose namespaces as proc inodes
    Proc,
}

impl FsMagic {
    /// `NSFS_MAGIC` from `linux/magic.h`
    pub const NSFS: i64 = 0x6e73_6673;

    /// `PROC_SUPER_MAGIC` from `linux/magic.h`
    pub const PROC: i64 = 0x9fa0;

    /// Match a raw `f_type` value
    #[must_use]
    pub const fn from_raw(fs_type: i64) -> Option<Self> {
        match fs_type {
            Self::NSFS => Some(Self::Nsfs),
            Self::PROC => Some(Self::Proc),
            _ => None,
        }
    }
}

/// Raw `f_type` of the filesystem holding `path`
///
/// # Errors
/// Returns [`Error::NotFound`] if the path does not exist, or
/// [`Error::System`] for any other statfs(2) failure
#[allow(clippy::unnecessary_cast, clippy::cast_possible_wrap)]
pub fn filesystem_type(path: impl AsRef<Path>) -> Result<i64> {
    let path = path.as_ref();

    match statfs(path) {
        Ok(stat) => Ok(stat.filesystem_type().0 as i64),
        Err(Errno::ENOENT) => Err(Error::NotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(Error::System(e)),
    }
}

/// Check that `path` refers to a namespace
///
/// Succeeds only when the backing filesystem is nsfs or procfs.
///
/// # Errors
/// - [`Error::NotFound`] if the path does not exist
/// - [`Error::NotNamespace`] if the path lives on any other filesystem
/// - [`Error::System`] for other statfs(2) failures
pub fn validate(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let fs_type = filesystem_type(path)?;

    match FsMagic::from_raw(fs_type) {
        Some(magic) => {
            tracing::trace!(path = %path.display(), ?magic, "Namespace path validated");
            Ok(())
        }
        None => Err(Error::NotNamespace {
            path: path.to_path_buf(),
            fs_type,
        }),
    }
}
