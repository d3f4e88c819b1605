//! Namespace execution framework
//!
//! This crate runs work inside existing Linux namespaces:
//! - [`NamespaceHandle`] - Typed, closable reference to a `net` or `pid` namespace
//! - [`validator`] - Classifies paths as namespace, missing, or something else
//! - [`NamespaceSwitcher`] - Executes closures on a pinned OS thread inside a namespace
//! - [`NamespaceInfo`] - Namespace identity for processes and threads

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod handle;
pub mod info;
pub mod kind;
pub mod switcher;
pub mod validator;

pub use handle::NamespaceHandle;
pub use info::{current_thread_path, namespace_id, process_path, NamespaceId, NamespaceInfo};
pub use kind::NamespaceKind;
pub use switcher::{with_ns_path, NamespaceSwitcher};
pub use validator::{validate, FsMagic};
