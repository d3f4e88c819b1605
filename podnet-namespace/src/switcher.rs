//! Running work inside another namespace on a dedicated OS thread
//!
//! Namespace membership belongs to the OS thread, while async runtimes move
//! tasks between worker threads freely. The switcher never touches the
//! caller's thread: every switch happens on a freshly spawned thread that
//! joins the target, runs the closure, restores its own original namespace
//! and then exits, so no pooled thread ever carries a foreign namespace.

use podnet_core::{Error, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

use crate::handle::NamespaceHandle;
use crate::kind::NamespaceKind;

/// Executes closures inside a target namespace
///
/// The closure receives the handle of the namespace the dispatching thread
/// was in, so it can hop back temporarily with [`NamespaceHandle::set`].
#[derive(Debug, Clone)]
pub struct NamespaceSwitcher {
    target: Arc<NamespaceHandle>,
}

impl NamespaceSwitcher {
    /// Create a switcher for an already opened handle
    #[must_use]
    pub fn new(target: NamespaceHandle) -> Self {
        Self {
            target: Arc::new(target),
        }
    }

    /// Open `path` and create a switcher for it
    ///
    /// # Errors
    /// Returns error if the path cannot be opened as a namespace
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(NamespaceHandle::open(path)?))
    }

    /// Target namespace
    #[must_use]
    pub fn target(&self) -> &NamespaceHandle {
        &self.target
    }

    /// Target namespace kind
    #[must_use]
    pub fn kind(&self) -> NamespaceKind {
        self.target.kind()
    }

    /// Run `f` inside the target namespace, blocking until it completes
    ///
    /// # Errors
    /// - errors opening the host or per-thread namespace, or joining the
    ///   target, are returned before `f` runs
    /// - [`Error::ClosurePanicked`] if `f` panics
    /// - otherwise whatever `f` returns
    pub fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&NamespaceHandle) -> Result<T> + Send,
        T: Send,
    {
        let kind = self.kind();
        let host = NamespaceHandle::current(kind)?;

        let result = thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name(thread_name(kind))
                .spawn_scoped(scope, || run_pinned(&self.target, &host, f))?;

            worker.join().unwrap_or_else(|payload| {
                Err(Error::ClosurePanicked {
                    message: panic_message(payload.as_ref()),
                })
            })
        });

        release(&host);
        result
    }

    /// Run `f` inside the target namespace without blocking the runtime
    ///
    /// Dropping the returned future (for example on a
    /// `tokio::time::timeout`) does not interrupt `f`: the pinned thread runs
    /// to completion, restores itself and exits.
    ///
    /// # Errors
    /// Same as [`NamespaceSwitcher::run`]
    pub async fn run_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&NamespaceHandle) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let kind = self.kind();
        let host = Arc::new(NamespaceHandle::current(kind)?);
        let target = Arc::clone(&self.target);
        let (tx, rx) = oneshot::channel();

        let thread_host = Arc::clone(&host);
        thread::Builder::new()
            .name(thread_name(kind))
            .spawn(move || {
                let result = run_pinned(&target, &thread_host, f);
                // Receiver may have been dropped by a timeout
                let _ = tx.send(result);
            })?;

        let result = rx.await.unwrap_or_else(|_| {
            Err(Error::ClosurePanicked {
                message: "namespace thread exited without a result".to_string(),
            })
        });

        release(&host);
        result
    }
}

/// Open `path`, run `f` inside it and close the handle again
///
/// # Errors
/// Same as [`NamespaceSwitcher::run`], plus open errors for `path`
pub fn with_ns_path<F, T>(path: impl AsRef<Path>, f: F) -> Result<T>
where
    F: FnOnce(&NamespaceHandle) -> Result<T> + Send,
    T: Send,
{
    let switcher = NamespaceSwitcher::open(path)?;
    let result = switcher.run(f);
    release(switcher.target());
    result
}

/// Body of the pinned thread
fn run_pinned<F, T>(target: &NamespaceHandle, host: &NamespaceHandle, f: F) -> Result<T>
where
    F: FnOnce(&NamespaceHandle) -> Result<T>,
{
    let kind = target.kind();

    // This thread's own namespace, which may differ from the dispatcher's
    let original = NamespaceHandle::current(kind)?;
    target.set()?;

    tracing::debug!(
        kind = %kind,
        target = %target.path().display(),
        "Entered namespace"
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(host)));

    match original.set() {
        Ok(()) => tracing::debug!(kind = %kind, "Restored namespace"),
        Err(e) => tracing::error!(
            kind = %kind,
            error = %e,
            "Failed to restore namespace, thread will be discarded"
        ),
    }
    release(&original);

    outcome.unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(kind = %kind, panic = %message, "Namespace closure panicked");
        Err(Error::ClosurePanicked { message })
    })
}

fn release(handle: &NamespaceHandle) {
    if let Err(e) = handle.close() {
        tracing::debug!(path = %handle.path().display(), error = %e, "Handle already released");
    }
}

fn thread_name(kind: NamespaceKind) -> String {
    format!("podnet-ns-{kind}")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{current_thread_path, namespace_id};

    // setns(2) wants CAP_SYS_ADMIN even to rejoin the current namespace
    fn self_switcher() -> NamespaceSwitcher {
        NamespaceSwitcher::open("/proc/self/ns/net").unwrap()
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_thread_name() {
        assert_eq!(thread_name(NamespaceKind::Network), "podnet-ns-net");
    }

    #[test]
    fn test_closed_target_fails_before_closure() {
        let switcher = self_switcher();
        switcher.target().close().unwrap();

        let mut ran = false;
        let err = switcher
            .run(|_| {
                ran = true;
                Ok(())
            })
            .unwrap_err();

        assert!(err.is_handle_closed());
        assert!(!ran);
    }

    #[test]
    #[ignore] // Requires root
    fn test_run_returns_value_and_restores() {
        let before = namespace_id(current_thread_path(NamespaceKind::Network)).unwrap();

        let value = self_switcher().run(|_| Ok(7)).unwrap();
        assert_eq!(value, 7);

        let after = namespace_id(current_thread_path(NamespaceKind::Network)).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    #[ignore] // Requires root
    fn test_run_propagates_closure_error() {
        let err = self_switcher()
            .run::<_, ()>(|_| Err(Error::protocol("closure failed")))
            .unwrap_err();

        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    #[ignore] // Requires root
    fn test_run_converts_panic() {
        let err = self_switcher()
            .run::<_, ()>(|_| panic!("closure blew up"))
            .unwrap_err();

        assert!(matches!(err, Error::ClosurePanicked { ref message } if message == "closure blew up"));
    }

    #[tokio::test]
    #[ignore] // Requires root
    async fn test_run_async_returns_value() {
        let value = self_switcher()
            .run_async(|host| Ok(host.kind()))
            .await
            .unwrap();

        assert_eq!(value, NamespaceKind::Network);
    }
}
