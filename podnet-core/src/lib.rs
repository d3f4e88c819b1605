//! podnet Core - Foundation types, events, and utilities
//!
//! This crate provides the core abstractions shared by the namespace
//! framework and the DHCPv6 responder.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{Route, VmNetworkConfig};
pub use error::{Error, Result};
pub use events::DhcpEvent;
pub use types::{InterfaceName, MacAddress, ProcessId, ThreadId};
