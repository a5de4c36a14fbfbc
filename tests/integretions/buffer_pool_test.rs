use std::sync::Arc;

use heapstore::{
    storage::{
        buffer_pool::BufferPool,
        heap::{HeapPageID, Page},
        tuple::Cell,
    },
    transaction::{Permission, Transaction},
    utils::HandyRwLock,
    Database,
};

use crate::test_utils::{insert_row, new_random_table, search_key, setup};

#[test]
/// A second fetch of the same page is served from the cache.
fn test_page_is_cached() {
    let _guard = setup();

    let table_rc = new_random_table(2, 10);
    let table = table_rc.rl();

    let tx = Transaction::new();
    let pid = HeapPageID::new(table.get_id(), 0);

    let first = Database::buffer_pool()
        .get_page(&tx, Permission::ReadOnly, &pid)
        .unwrap();
    let second = Database::buffer_pool()
        .get_page(&tx, Permission::ReadOnly, &pid)
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    tx.commit().unwrap();
}

#[test]
/// The cache never grows past its capacity, whatever gets scanned.
fn test_capacity_bound() {
    let _guard = setup();

    // 63 rows per page at this page size; 252 rows make 4 pages
    BufferPool::set_page_size(1024);
    BufferPool::set_capacity(2);
    Database::reset();

    let table_rc = new_random_table(2, 252);
    let table = table_rc.rl();
    assert_eq!(table.pages_count(), 4);

    let tx = Transaction::new();
    for page_index in 0..table.pages_count() {
        let pid = HeapPageID::new(table.get_id(), page_index);
        Database::buffer_pool()
            .get_page(&tx, Permission::ReadOnly, &pid)
            .unwrap();

        assert!(Database::buffer_pool().pages_count() <= 2);
    }
    tx.commit().unwrap();

    assert!(Database::buffer_pool().pages_count() <= 2);
}

#[test]
/// STEAL: evicting a page dirtied by a live transaction writes an
/// update record (with the before image), forces the log, and puts the
/// pending change on disk. Aborting afterwards discards the cached
/// dirt but cannot take back the stolen write; that is what the log
/// record is for.
fn test_eviction_steals_dirty_page() {
    let _guard = setup();

    // a single-entry cache makes the victim deterministic
    BufferPool::set_page_size(1024);
    BufferPool::set_capacity(1);
    Database::reset();

    // one full page on disk, nothing cached, empty log
    let table_rc = new_random_table(2, 63);
    let table = table_rc.rl();
    assert_eq!(table.pages_count(), 1);
    Database::buffer_pool().clear();

    let t1 = Transaction::new();
    assert_eq!(Database::log_manager().records_count(), 1); // START

    // page 0 is full, so this appends page 1 and dirties it
    insert_row(&table, &t1, 1001);
    assert_eq!(table.pages_count(), 2);

    // the next insert rescans from page 0; fetching it evicts the
    // dirty page 1, which must hit the log before it hits the disk
    insert_row(&table, &t1, 1002);
    assert_eq!(Database::log_manager().records_count(), 2); // START, UPDATE

    t1.abort().unwrap();
    assert_eq!(Database::log_manager().records_count(), 3); // ..., ABORT

    // The stolen write survived the abort on disk: the first inserted
    // row is visible to a later scan, the second (never flushed) is
    // gone. An external recovery manager would undo the survivor from
    // the logged before image.
    let t2 = Transaction::new();
    assert_eq!(search_key(&table, &t2, &Cell::Int64(1001)), 1);
    assert_eq!(search_key(&table, &t2, &Cell::Int64(1002)), 0);
    t2.commit().unwrap();
}

#[test]
/// Abort drops every cached page the transaction dirtied.
fn test_abort_discards_dirty_pages() {
    let _guard = setup();

    let table_rc = new_random_table(2, 10);
    let table = table_rc.rl();

    let t1 = Transaction::new();
    insert_row(&table, &t1, 42);

    let pid = HeapPageID::new(table.get_id(), 0);
    let page_pod = Database::buffer_pool()
        .get_page(&t1, Permission::ReadOnly, &pid)
        .unwrap();
    assert_eq!(page_pod.rl().is_dirty(), Some(t1.get_id()));

    t1.abort().unwrap();

    // the discarded page is re-read from disk, clean and without the
    // aborted row
    let t2 = Transaction::new();
    let page_pod = Database::buffer_pool()
        .get_page(&t2, Permission::ReadOnly, &pid)
        .unwrap();
    assert_eq!(page_pod.rl().is_dirty(), None);
    assert_eq!(search_key(&table, &t2, &Cell::Int64(42)), 0);
    t2.commit().unwrap();
}

#[test]
/// `discard_page` drops the cached copy without writing it; the next
/// fetch re-reads the disk state. External recovery logic uses this to
/// drop rolled back pages.
fn test_discard_page() {
    let _guard = setup();

    let table_rc = new_random_table(2, 10);
    let table = table_rc.rl();

    let t1 = Transaction::new();
    insert_row(&table, &t1, 4242);
    let pid = HeapPageID::new(table.get_id(), 0);

    Database::buffer_pool().discard_page(&pid);

    // the uncommitted row lived only in the discarded copy
    assert_eq!(search_key(&table, &t1, &Cell::Int64(4242)), 0);
    t1.commit().unwrap();
}

#[test]
/// The advisory release lets another writer in before completion.
fn test_release_page() {
    let _guard = setup();

    let table_rc = new_random_table(2, 10);
    let table = table_rc.rl();

    let t1 = Transaction::new();
    let pid = HeapPageID::new(table.get_id(), 0);

    Database::buffer_pool()
        .get_page(&t1, Permission::ReadOnly, &pid)
        .unwrap();
    assert!(Database::buffer_pool().holds_lock(&t1, &pid));

    Database::buffer_pool().release_page(&t1, &pid);
    assert!(!Database::buffer_pool().holds_lock(&t1, &pid));

    t1.commit().unwrap();
}
