use std::{thread, time::Duration};

use heapstore::{
    storage::heap::HeapPageID,
    transaction::{Lock, Transaction, TransactionStatus},
    Database,
};

use crate::test_utils::setup;

#[test]
/// Two transactions each hold a shared latch and try to upgrade on the
/// other's page. One of the exclusive requests closes a cycle in the
/// waits-for graph and is aborted; the survivor finishes once the
/// aborted transaction completes.
fn test_deadlock_two_pages() {
    let _guard = setup();

    let p1 = HeapPageID::new(910, 0);
    let p2 = HeapPageID::new(910, 1);
    let t1 = Transaction::new();
    let t2 = Transaction::new();

    let concurrent_status = Database::concurrent_status();
    concurrent_status.request_latch(&t1, &Lock::SLock, &p1).unwrap();
    concurrent_status.request_latch(&t2, &Lock::SLock, &p2).unwrap();

    let handle = thread::spawn(move || {
        // blocks behind t2's shared latch on p2
        let result = Database::concurrent_status().request_latch(&t1, &Lock::XLock, &p2);
        if result.is_err() {
            t1.abort().unwrap();
        }
        result
    });

    // let t1 block before closing the cycle
    thread::sleep(Duration::from_millis(200));

    let result_2 = Database::concurrent_status().request_latch(&t2, &Lock::XLock, &p1);
    if result_2.is_err() {
        t2.abort().unwrap();
    }

    let result_1 = handle.join().unwrap();

    // exactly one of the two requests was chosen as the deadlock victim
    assert!(result_1.is_ok() != result_2.is_ok());
    let aborted_err = if result_1.is_err() {
        result_1.as_ref().unwrap_err()
    } else {
        result_2.as_ref().unwrap_err()
    };
    assert!(aborted_err.is_transaction_aborted());

    // the survivor still holds its latches and can complete
    let (survivor, victim) = if result_1.is_ok() { (t1, t2) } else { (t2, t1) };
    assert!(concurrent_status.holds_latch(&survivor, &p1, None));
    assert!(concurrent_status.holds_latch(&survivor, &p2, None));
    assert!(!concurrent_status.holds_latch(&victim, &p1, None));
    assert!(!concurrent_status.holds_latch(&victim, &p2, None));

    survivor.commit().unwrap();
    assert_eq!(
        concurrent_status.get_transaction_status(victim.get_id()),
        Some(TransactionStatus::Aborted)
    );
}

#[test]
/// The classic upgrade deadlock: both transactions share the same page,
/// both request the upgrade. The second requester aborts.
fn test_deadlock_upgrade_same_page() {
    let _guard = setup();

    let pid = HeapPageID::new(911, 0);
    let t1 = Transaction::new();
    let t2 = Transaction::new();

    let concurrent_status = Database::concurrent_status();
    concurrent_status.request_latch(&t1, &Lock::SLock, &pid).unwrap();
    concurrent_status.request_latch(&t2, &Lock::SLock, &pid).unwrap();

    let handle = thread::spawn(move || {
        let result = Database::concurrent_status().request_latch(&t1, &Lock::XLock, &pid);
        if result.is_err() {
            t1.abort().unwrap();
        }
        result
    });

    thread::sleep(Duration::from_millis(200));

    let result_2 = Database::concurrent_status().request_latch(&t2, &Lock::XLock, &pid);
    if result_2.is_err() {
        t2.abort().unwrap();
    }

    let result_1 = handle.join().unwrap();
    assert!(result_1.is_ok() != result_2.is_ok());

    let survivor = if result_1.is_ok() { t1 } else { t2 };
    assert!(concurrent_status.holds_latch(&survivor, &pid, Some(&Lock::XLock)));
    survivor.commit().unwrap();
}
