use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use heapstore::{
    storage::heap::HeapPageID,
    transaction::{Lock, Transaction},
    Database,
};

use crate::test_utils::setup;

#[test]
/// Two transactions can read the same page at the same time.
fn test_shared_latches_are_compatible() {
    let _guard = setup();

    let pid = HeapPageID::new(900, 0);
    let t1 = Transaction::new();
    let t2 = Transaction::new();

    let concurrent_status = Database::concurrent_status();
    concurrent_status.request_latch(&t1, &Lock::SLock, &pid).unwrap();
    concurrent_status.request_latch(&t2, &Lock::SLock, &pid).unwrap();

    assert!(concurrent_status.holds_latch(&t1, &pid, Some(&Lock::SLock)));
    assert!(concurrent_status.holds_latch(&t2, &pid, Some(&Lock::SLock)));
}

#[test]
/// A write latch excludes readers: the reader blocks until the writer
/// releases, then gets the latch.
fn test_write_excludes_read() {
    let _guard = setup();

    let pid = HeapPageID::new(901, 0);
    let writer = Transaction::new();

    let concurrent_status = Database::concurrent_status();
    concurrent_status
        .request_latch(&writer, &Lock::XLock, &pid)
        .unwrap();

    let acquired = Arc::new(AtomicBool::new(false));
    let acquired_clone = acquired.clone();
    let handle = thread::spawn(move || {
        let reader = Transaction::new();
        Database::concurrent_status()
            .request_latch(&reader, &Lock::SLock, &pid)
            .unwrap();
        acquired_clone.store(true, Ordering::Relaxed);
        reader
    });

    // give the reader a moment to block
    thread::sleep(Duration::from_millis(100));
    assert!(!acquired.load(Ordering::Relaxed));

    concurrent_status.remove_relation(&writer);

    let reader = handle.join().unwrap();
    assert!(acquired.load(Ordering::Relaxed));
    assert!(concurrent_status.holds_latch(&reader, &pid, Some(&Lock::SLock)));
    assert!(!concurrent_status.holds_latch(&reader, &pid, Some(&Lock::XLock)));
}

#[test]
/// The sole shared holder can upgrade in place.
fn test_upgrade() {
    let _guard = setup();

    let pid = HeapPageID::new(902, 0);
    let t1 = Transaction::new();

    let concurrent_status = Database::concurrent_status();
    concurrent_status.request_latch(&t1, &Lock::SLock, &pid).unwrap();
    concurrent_status.request_latch(&t1, &Lock::XLock, &pid).unwrap();

    // upgraded: the shared entry is gone
    assert!(concurrent_status.holds_latch(&t1, &pid, Some(&Lock::XLock)));
    assert!(!concurrent_status.holds_latch(&t1, &pid, Some(&Lock::SLock)));
}

#[test]
/// A shared request arriving during an upgrade waits for the upgraded
/// writer.
fn test_upgrade_blocks_shared() {
    let _guard = setup();

    let pid = HeapPageID::new(903, 0);
    let t1 = Transaction::new();

    let concurrent_status = Database::concurrent_status();
    concurrent_status.request_latch(&t1, &Lock::SLock, &pid).unwrap();
    concurrent_status.request_latch(&t1, &Lock::XLock, &pid).unwrap();

    let acquired = Arc::new(AtomicBool::new(false));
    let acquired_clone = acquired.clone();
    let handle = thread::spawn(move || {
        let t2 = Transaction::new();
        Database::concurrent_status()
            .request_latch(&t2, &Lock::SLock, &pid)
            .unwrap();
        acquired_clone.store(true, Ordering::Relaxed);
    });

    thread::sleep(Duration::from_millis(100));
    assert!(!acquired.load(Ordering::Relaxed));

    concurrent_status.remove_relation(&t1);
    handle.join().unwrap();
    assert!(acquired.load(Ordering::Relaxed));
}

#[test]
/// An exclusive latch subsumes a later shared request, and the weaker
/// mode is never added next to it.
fn test_stronger_latch_subsumes() {
    let _guard = setup();

    let pid = HeapPageID::new(904, 0);
    let t1 = Transaction::new();

    let concurrent_status = Database::concurrent_status();
    concurrent_status.request_latch(&t1, &Lock::XLock, &pid).unwrap();
    concurrent_status.request_latch(&t1, &Lock::SLock, &pid).unwrap();

    assert!(concurrent_status.holds_latch(&t1, &pid, Some(&Lock::XLock)));
    assert!(!concurrent_status.holds_latch(&t1, &pid, Some(&Lock::SLock)));
    assert!(concurrent_status.holds_latch(&t1, &pid, None));
}

#[test]
/// acquire then release leaves nothing behind.
fn test_release_latch() {
    let _guard = setup();

    let pid = HeapPageID::new(905, 0);
    let t1 = Transaction::new();

    let concurrent_status = Database::concurrent_status();
    concurrent_status.request_latch(&t1, &Lock::SLock, &pid).unwrap();
    concurrent_status.release_latch(&t1, &pid);

    assert!(!concurrent_status.holds_latch(&t1, &pid, None));
}

#[test]
/// Completion releases every latch of the transaction, exactly once.
fn test_two_phase_release_on_complete() {
    let _guard = setup();

    let p1 = HeapPageID::new(906, 0);
    let p2 = HeapPageID::new(906, 1);
    let t1 = Transaction::new();

    let concurrent_status = Database::concurrent_status();
    concurrent_status.request_latch(&t1, &Lock::SLock, &p1).unwrap();
    concurrent_status.request_latch(&t1, &Lock::XLock, &p2).unwrap();

    t1.commit().unwrap();

    assert!(!concurrent_status.holds_latch(&t1, &p1, None));
    assert!(!concurrent_status.holds_latch(&t1, &p2, None));
}
