use podnet_core::Error;
use podnet_namespace::*;
use std::sync::mpsc;
use std::time::Duration;

fn thread_net_id() -> NamespaceId {
    namespace_id(current_thread_path(NamespaceKind::Network)).unwrap()
}

#[test]
fn test_validate_outcomes() {
    let file = tempfile::NamedTempFile::new().unwrap();

    assert!(validate("/proc/self/ns/net").is_ok());
    assert!(validate("/nonexistent/ns/net").unwrap_err().is_not_found());
    assert!(validate(file.path()).unwrap_err().is_not_namespace());
}

#[test]
fn test_open_returns_input_path() {
    for path in ["/proc/self/ns/net", "/proc/self/ns/pid"] {
        let handle = NamespaceHandle::open(path).unwrap();
        assert_eq!(handle.path().to_str(), Some(path));
        assert!(handle.descriptor().unwrap() >= 0);
    }
}

#[test]
fn test_open_thread_path() {
    let path = current_thread_path(NamespaceKind::Pid);
    let handle = NamespaceHandle::open(&path).unwrap();

    assert_eq!(handle.kind(), NamespaceKind::Pid);
    assert_eq!(handle.path(), path.as_path());
}

#[test]
fn test_open_rejects_other_kinds() {
    let err = NamespaceHandle::open("/proc/self/ns/uts").unwrap_err();
    assert!(matches!(err, Error::UnsupportedKind { .. }));
}

#[test]
fn test_open_rejects_regular_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("net");
    std::fs::write(&path, "not a namespace").unwrap();

    let err = NamespaceHandle::open(&path).unwrap_err();
    assert!(err.is_not_namespace());
}

#[test]
fn test_close_twice() {
    let handle = NamespaceHandle::open("/proc/self/ns/net").unwrap();

    handle.close().unwrap();
    assert!(handle.close().unwrap_err().is_handle_closed());
}

#[test]
fn test_concurrent_close_releases_once() {
    let handle = NamespaceHandle::open("/proc/self/ns/net").unwrap();

    let released = std::thread::scope(|scope| {
        (0..8)
            .map(|_| scope.spawn(|| handle.close().is_ok()))
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|w| w.join().ok())
            .filter(|ok| *ok)
            .count()
    });

    assert_eq!(released, 1);
    assert!(handle.is_closed());
}

#[test]
fn test_namespace_info_for_self() {
    let info = NamespaceInfo::current().unwrap();
    assert_eq!(info.get(NamespaceKind::Network), Some(thread_net_id()));
}

#[test]
#[ignore] // Requires root
fn test_set_and_restore_init_namespace() {
    std::thread::spawn(|| {
        let init = NamespaceHandle::open("/proc/1/ns/net").unwrap();
        let host = NamespaceHandle::current(NamespaceKind::Network).unwrap();
        let original = thread_net_id();

        init.set().unwrap();
        assert_eq!(thread_net_id(), namespace_id("/proc/1/ns/net").unwrap());

        host.set().unwrap();
        assert_eq!(thread_net_id(), original);
    })
    .join()
    .unwrap();
}

#[test]
#[ignore] // Requires root
fn test_switcher_runs_in_target_and_restores_caller() {
    let before = thread_net_id();
    let target = namespace_id("/proc/1/ns/net").unwrap();

    let inside = with_ns_path("/proc/1/ns/net", |_| Ok(thread_net_id())).unwrap();

    assert_eq!(inside, target);
    assert_eq!(thread_net_id(), before);
}

#[test]
#[ignore] // Requires root
fn test_switcher_restores_after_error() {
    let before = thread_net_id();
    let switcher = NamespaceSwitcher::open("/proc/1/ns/net").unwrap();

    for _ in 0..16 {
        let result = switcher.run::<_, ()>(|_| Err(Error::protocol("expected")));
        assert!(result.is_err());
        assert_eq!(thread_net_id(), before);
    }
}

#[test]
#[ignore] // Requires root
fn test_switcher_closure_can_return_to_host() {
    let before = thread_net_id();
    let switcher = NamespaceSwitcher::open("/proc/1/ns/net").unwrap();

    let seen = switcher
        .run(|host| {
            host.set()?;
            Ok(thread_net_id())
        })
        .unwrap();

    assert_eq!(seen, before);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires root
async fn test_run_async_from_runtime() {
    let target = namespace_id("/proc/1/ns/net").unwrap();
    let switcher = NamespaceSwitcher::open("/proc/1/ns/net").unwrap();

    let inside = switcher.run_async(|_| Ok(thread_net_id())).await.unwrap();
    assert_eq!(inside, target);

    let err = switcher
        .run_async::<_, ()>(|_| panic!("pinned thread panic"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ClosurePanicked { .. }));
}

#[tokio::test]
#[ignore] // Requires root
async fn test_run_async_timeout_leaves_caller_in_place() {
    let before = thread_net_id();
    let target = namespace_id("/proc/1/ns/net").unwrap();
    let switcher = NamespaceSwitcher::open("/proc/1/ns/net").unwrap();
    let (done_tx, done_rx) = mpsc::channel();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        switcher.run_async(move |_| {
            std::thread::sleep(Duration::from_millis(300));
            let _ = done_tx.send(thread_net_id());
            Ok(())
        }),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(thread_net_id(), before);

    // The abandoned closure still finishes inside the target
    let inside = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(inside, target);
    assert_eq!(thread_net_id(), before);

    let again = switcher.run_async(|_| Ok(thread_net_id())).await.unwrap();
    assert_eq!(again, target);
    assert_eq!(thread_net_id(), before);
}
