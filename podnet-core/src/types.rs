//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Network interface name with validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceName(String);

impl InterfaceName {
    /// Maximum length for interface names (`IFNAMSIZ` minus the NUL terminator)
    pub const MAX_LENGTH: usize = 15;

    /// Create a new `InterfaceName` with validation
    ///
    /// # Errors
    /// Returns error if the name is empty, too long, or contains characters the kernel rejects
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_config("Interface name cannot be empty"));
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(Error::invalid_config(format!(
                "Interface name too long (max {} chars)",
                Self::MAX_LENGTH
            )));
        }

        if name == "." || name == ".." {
            return Err(Error::invalid_config(format!(
                "Interface name '{name}' is reserved"
            )));
        }

        if name
            .chars()
            .any(|c| c == '/' || c == ':' || c.is_whitespace() || c.is_control())
        {
            return Err(Error::invalid_config(
                "Interface name cannot contain '/', ':' or whitespace",
            ));
        }

        Ok(())
    }

    /// Get the interface name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InterfaceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for InterfaceName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<InterfaceName> for String {
    fn from(name: InterfaceName) -> Self {
        name.0
    }
}

/// Ethernet hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create from raw octets
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Get the raw octets
    #[must_use]
    pub const fn octets(self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');

        for octet in &mut octets {
            let part = parts
                .next()
                .ok_or_else(|| Error::invalid_config(format!("MAC address too short: {s}")))?;
            if part.len() != 2 {
                return Err(Error::invalid_config(format!("Invalid MAC octet '{part}'")));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|e| Error::invalid_config(format!("Invalid MAC octet '{part}': {e}")))?;
        }

        if parts.next().is_some() {
            return Err(Error::invalid_config(format!("MAC address too long: {s}")));
        }

        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        Self(nix::unistd::getpid().as_raw())
    }

    /// Convert to `nix::unistd::Pid`
    #[must_use]
    pub const fn as_nix_pid(self) -> nix::unistd::Pid {
        nix::unistd::Pid::from_raw(self.0)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessId> for nix::unistd::Pid {
    fn from(pid: ProcessId) -> Self {
        nix::unistd::Pid::from_raw(pid.0)
    }
}

/// Kernel thread identifier
///
/// Namespace membership is a per-thread attribute, so the per-thread
/// `/proc/<pid>/task/<tid>/ns` paths are built from this rather than the pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ThreadId(i32);

impl ThreadId {
    /// Create from raw TID
    #[must_use]
    pub const fn from_raw(tid: i32) -> Self {
        Self(tid)
    }

    /// Get the calling OS thread's ID
    #[must_use]
    pub fn current() -> Self {
        Self(nix::unistd::gettid().as_raw())
    }

    /// Get raw TID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_name_validation() {
        assert!(InterfaceName::new("veth0").is_ok());
        assert!(InterfaceName::new("k6t-eth0").is_ok());
        assert!(InterfaceName::new("").is_err());
        assert!(InterfaceName::new("a".repeat(16)).is_err());
        assert!(InterfaceName::new("eth 0").is_err());
        assert!(InterfaceName::new("eth/0").is_err());
        assert!(InterfaceName::new("..").is_err());
    }

    #[test]
    fn test_interface_name_serde() {
        let name = InterfaceName::new("veth0").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"veth0\"");
        let deserialized: InterfaceName = serde_json::from_str(&json).unwrap();
        assert_eq!(name, deserialized);

        assert!(serde_json::from_str::<InterfaceName>("\"\"").is_err());
    }

    #[test]
    fn test_mac_address_parse_and_display() {
        let mac: MacAddress = "02:00:00:AB:cd:01".parse().unwrap();
        assert_eq!(mac.octets(), [0x02, 0x00, 0x00, 0xab, 0xcd, 0x01]);
        assert_eq!(mac.to_string(), "02:00:00:ab:cd:01");

        assert!("02:00:00:ab:cd".parse::<MacAddress>().is_err());
        assert!("02:00:00:ab:cd:01:ff".parse::<MacAddress>().is_err());
        assert!("02:00:00:ab:cd:zz".parse::<MacAddress>().is_err());
        assert!("2:00:00:ab:cd:01".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_process_id() {
        let pid = ProcessId::from_raw(123);
        assert_eq!(pid.as_raw(), 123);

        let nix_pid = pid.as_nix_pid();
        assert_eq!(nix_pid.as_raw(), 123);
    }

    #[test]
    fn test_thread_id_differs_across_threads() {
        let main_tid = ThreadId::current();
        let other_tid = std::thread::spawn(ThreadId::current).join().unwrap();
        assert_ne!(main_tid, other_tid);
    }
}
