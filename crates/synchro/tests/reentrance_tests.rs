//! Reentrance behavior across detector strategies
//!
//! Completion is asserted through a watchdog thread with a timeout, so an
//! undetected reentry shows up as a failed `recv_timeout` instead of a hung
//! test run. The documented deadlock modes are asserted the same way, as
//! expected non-completion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use synchro::{Mode, Priority, ReentranceDetector, Synchronize, Synchronizer};

#[derive(Debug, Copy, Clone)]
enum Access {
    Read,
    SyncWrite,
}

const ALL_NESTINGS: [(Access, Access); 4] = [
    (Access::Read, Access::Read),
    (Access::Read, Access::SyncWrite),
    (Access::SyncWrite, Access::Read),
    (Access::SyncWrite, Access::SyncWrite),
];

fn access<R>(synchronizer: &Synchronizer, which: Access, body: impl FnOnce() -> R) -> R {
    match which {
        Access::Read => synchronizer.read(body),
        Access::SyncWrite => synchronizer.sync_write(body),
    }
}

/// Runs `task` on a watchdog thread; reports whether it finished in time.
fn completes_within(timeout: Duration, task: impl FnOnce() + Send + 'static) -> bool {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        task();
        let _ = tx.send(());
    });
    rx.recv_timeout(timeout).is_ok()
}

/// Nest `inner` inside `outer` on one synchronizer, optionally hopping to a
/// second thread (joined synchronously) for the inner access.
fn nested_completes(
    synchronizer: Arc<Synchronizer>,
    outer: Access,
    inner: Access,
    hop: bool,
) -> bool {
    let hits = Arc::new(AtomicUsize::new(0));
    let observed = hits.clone();

    let finished = completes_within(Duration::from_secs(2), move || {
        access(&synchronizer, outer, || {
            if hop {
                thread::scope(|scope| {
                    scope
                        .spawn(|| {
                            access(&synchronizer, inner, || {
                                hits.fetch_add(1, Ordering::SeqCst);
                            })
                        })
                        .join()
                        .unwrap();
                });
            } else {
                access(&synchronizer, inner, || {
                    hits.fetch_add(1, Ordering::SeqCst);
                });
            }
        });
    });

    finished && observed.load(Ordering::SeqCst) == 1
}

fn expect_no_deadlocks(make: impl Fn() -> Synchronizer, hop: bool) {
    for (outer, inner) in ALL_NESTINGS {
        let synchronizer = Arc::new(make());
        assert!(
            nested_completes(synchronizer, outer, inner, hop),
            "deadlocked nesting {inner:?} inside {outer:?} (hop: {hop})"
        );
    }
}

#[test]
fn test_flag_detector_in_serial_synchronizer() {
    expect_no_deadlocks(
        || {
            Synchronizer::new(
                Mode::Serial,
                Priority::Default,
                ReentranceDetector::flag_based(),
            )
        },
        false,
    );
}

#[test]
fn test_flag_detector_in_serial_synchronizer_with_thread_hop() {
    expect_no_deadlocks(
        || {
            Synchronizer::new(
                Mode::Serial,
                Priority::Default,
                ReentranceDetector::flag_based(),
            )
        },
        true,
    );
}

#[test]
fn test_context_keyed_detector_in_serial_synchronizer() {
    expect_no_deadlocks(|| Synchronizer::reentrant_serial(Priority::Default), false);
}

#[test]
fn test_context_keyed_detector_in_concurrent_synchronizer() {
    expect_no_deadlocks(|| Synchronizer::reentrant_concurrent(Priority::Default), false);
}

#[test]
fn test_flag_detector_in_concurrent_synchronizer_with_thread_hop() {
    // The flag survives the hop onto an unrelated thread, where the
    // context-keyed strategy loses track.
    let synchronizer = Arc::new(Synchronizer::new(
        Mode::Concurrent,
        Priority::Default,
        ReentranceDetector::flag_based(),
    ));
    assert!(nested_completes(
        synchronizer,
        Access::Read,
        Access::SyncWrite,
        true
    ));
}

#[test]
fn test_non_reentrant_nested_read_deadlocks() {
    let synchronizer = Arc::new(Synchronizer::serial(Priority::Default));
    assert!(
        !nested_completes(synchronizer, Access::Read, Access::Read, false),
        "unprotected reentry should hang"
    );
}

#[test]
fn test_context_keyed_detector_misses_thread_hop() {
    let synchronizer = Arc::new(Synchronizer::reentrant_concurrent(Priority::Default));
    assert!(
        !nested_completes(synchronizer, Access::Read, Access::SyncWrite, true),
        "reentry through a second thread should go undetected and hang"
    );
}
