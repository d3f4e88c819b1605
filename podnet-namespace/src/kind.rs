//! Namespace kinds understood by the switcher

use nix::sched::CloneFlags;
use podnet_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Kind of Linux namespace a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceKind {
    /// Network namespace (`net`)
    #[serde(rename = "net")]
    Network,
    /// Process-ID namespace (`pid`)
    Pid,
}

impl NamespaceKind {
    /// All supported kinds
    pub const ALL: [Self; 2] = [Self::Network, Self::Pid];

    /// Infer the kind from the trailing segment of a namespace path
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedKind`] unless the segment is `net` or `pid`
    pub fn from_path(path: &Path) -> Result<Self> {
        let segment = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::from_proc_name(&segment).ok_or_else(|| Error::UnsupportedKind {
            path: path.to_path_buf(),
            kind: segment,
        })
    }

    /// Match a `/proc/<pid>/ns` entry name
    #[must_use]
    pub fn from_proc_name(name: &str) -> Option<Self> {
        match name {
            "net" => Some(Self::Network),
            "pid" => Some(Self::Pid),
            _ => None,
        }
    }

    /// Entry name under `/proc/<pid>/ns`
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::Network => "net",
            Self::Pid => "pid",
        }
    }

    /// Flag passed to setns(2) to restrict the join to this kind
    #[must_use]
    pub const fn clone_flag(self) -> CloneFlags {
        match self {
            Self::Network => CloneFlags::CLONE_NEWNET,
            Self::Pid => CloneFlags::CLONE_NEWPID,
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proc_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            NamespaceKind::from_path(Path::new("/proc/1/ns/net")).unwrap(),
            NamespaceKind::Network
        );
        assert_eq!(
            NamespaceKind::from_path(Path::new("/proc/42/task/43/ns/pid")).unwrap(),
            NamespaceKind::Pid
        );
    }

    #[test]
    fn test_kind_rejects_other_segments() {
        for path in ["/proc/1/ns/mnt", "/proc/1/ns/uts", "/var/run/netns/pod0", "/"] {
            let err = NamespaceKind::from_path(Path::new(path)).unwrap_err();
            assert!(
                matches!(err, Error::UnsupportedKind { .. }),
                "{path} should be unsupported"
            );
        }
    }

    #[test]
    fn test_kind_flags() {
        assert_eq!(NamespaceKind::Network.clone_flag(), CloneFlags::CLONE_NEWNET);
        assert_eq!(NamespaceKind::Pid.clone_flag(), CloneFlags::CLONE_NEWPID);
        assert_eq!(NamespaceKind::Network.to_string(), "net");
    }

    #[test]
    fn test_kind_serializes_as_proc_name() {
        for kind in NamespaceKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
            assert_eq!(serde_json::from_str::<NamespaceKind>(&json).unwrap(), kind);
        }
        assert_eq!(serde_json::to_string(&NamespaceKind::Network).unwrap(), "\"net\"");
        assert!(serde_json::from_str::<NamespaceKind>("\"network\"").is_err());
    }
}
