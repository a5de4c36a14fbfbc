use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, RwLock,
    },
};

use log::debug;
use rand::Rng;

use crate::{
    common::Database,
    error::StoreError,
    storage::{
        heap::{HeapPage, HeapPageID, Page},
        tuple::Tuple,
    },
    transaction::{Permission, Transaction},
    types::{Pod, ResultPod, StoreResult},
    utils::HandyRwLock,
};

pub const DEFAULT_PAGE_SIZE: usize = 4096;
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

pub const DEFAULT_PAGES: usize = 50;
static CAPACITY: AtomicUsize = AtomicUsize::new(DEFAULT_PAGES);

type Buffer = HashMap<HeapPageID, Pod<HeapPage>>;

/// The page cache, and the only gateway to stored pages. Every fetch
/// goes through the lock manager first; cache and I/O paths are
/// serialized under the pool's own monitor.
///
/// Policies: STEAL (a dirty page may be evicted before its transaction
/// commits, made safe by the update record written ahead of the disk
/// write) and NO-FORCE (commit forces the log, never the pages).
pub struct BufferPool {
    buffer: Mutex<Buffer>,

    // maximum number of cached pages
    capacity: usize,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub fn set_page_size(page_size: usize) {
        PAGE_SIZE.store(page_size, Ordering::Relaxed);
    }

    pub fn get_page_size() -> usize {
        PAGE_SIZE.load(Ordering::Relaxed)
    }

    pub fn set_capacity(capacity: usize) {
        CAPACITY.store(capacity, Ordering::Relaxed);
    }

    pub fn get_capacity() -> usize {
        CAPACITY.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.buffer.lock().unwrap().clear();
    }

    pub fn pages_count(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    /// Retrieve the specified page with the associated permissions.
    /// Acquires the latch first; this is the only call that may block,
    /// and it fails with a transaction-aborted error on deadlock. The
    /// page is then served from the cache, read from disk on a miss,
    /// with one eviction if the cache is at capacity.
    pub fn get_page(
        &self,
        tx: &Transaction,
        perm: Permission,
        pid: &HeapPageID,
    ) -> ResultPod<HeapPage> {
        // Latch acquisition happens outside the pool monitor; the lock
        // manager has its own.
        Database::concurrent_status().request_latch(tx, &perm.to_lock(), pid)?;

        let mut buffer = self.buffer.lock().unwrap();

        if let Some(page_pod) = buffer.get(pid) {
            return Ok(page_pod.clone());
        }

        let page = Self::load_page(pid)?;
        let page_pod = Arc::new(RwLock::new(page));

        if buffer.len() >= self.capacity {
            self.evict_page(&mut buffer)?;
        }
        buffer.insert(*pid, page_pod.clone());

        Ok(page_pod)
    }

    fn load_page(pid: &HeapPageID) -> Result<HeapPage, StoreError> {
        let table_pod = Database::catalog().get_table(&pid.get_table_id())?;
        let table = table_pod.rl();
        table.read_page(pid)
    }

    /// Select a victim uniformly at random, flush it (log first when it
    /// is dirty) and drop it from the cache.
    fn evict_page(&self, buffer: &mut MutexGuard<Buffer>) -> StoreResult {
        let victim = {
            let keys: Vec<HeapPageID> = buffer.keys().cloned().collect();
            keys[rand::thread_rng().gen_range(0, keys.len())]
        };

        Self::flush_page_inner(buffer, &victim)
            .map_err(|e| StoreError::new(&format!("cannot flush eviction victim: {}", e)))?;
        buffer.remove(&victim);

        debug!("page {:?} evicted", victim);
        Ok(())
    }

    /// Write-through of a single cached page. A page that is not dirty
    /// needs no write. When the dirtying transaction still holds a
    /// latch on the page, an update record is appended and the log
    /// forced before the page reaches the disk; the dirty marker clears
    /// after the write.
    fn flush_page_inner(buffer: &MutexGuard<Buffer>, pid: &HeapPageID) -> StoreResult {
        let page_pod = match buffer.get(pid) {
            Some(pod) => pod.clone(),
            None => return Ok(()),
        };

        let dirty_by = page_pod.rl().is_dirty();
        let tid = match dirty_by {
            Some(tid) => tid,
            None => return Ok(()),
        };

        if Database::concurrent_status().tid_holds_any_latch(tid, pid) {
            let tx = Transaction::new_specific_id(tid);
            let log_manager = Database::log_manager();
            log_manager.log_update(&tx, &page_pod)?;
            log_manager.force()?;
        }

        let table_pod = Database::catalog().get_table(&pid.get_table_id())?;
        table_pod.rl().write_page(pid, &page_pod.rl().get_page_data())?;

        page_pod.wl().mark_dirty(None);
        Ok(())
    }

    /// Write the content of a specific page to disk.
    pub fn flush_page(&self, pid: &HeapPageID) -> StoreResult {
        let buffer = self.buffer.lock().unwrap();
        Self::flush_page_inner(&buffer, pid)
    }

    /// Write all pages held by the specified transaction to disk.
    pub fn flush_pages(&self, tx: &Transaction) -> StoreResult {
        let buffer = self.buffer.lock().unwrap();
        for pid in Database::concurrent_status().holding_pages(tx) {
            Self::flush_page_inner(&buffer, &pid)?;
        }
        Ok(())
    }

    /// Flush all dirty pages to disk.
    ///
    /// NB: Be careful using this routine -- it writes dirty data to
    /// disk, which is only safe because the update records hit the log
    /// first.
    pub fn flush_all_pages(&self) -> StoreResult {
        let buffer = self.buffer.lock().unwrap();
        let pids: Vec<HeapPageID> = buffer.keys().cloned().collect();
        for pid in pids {
            Self::flush_page_inner(&buffer, &pid)?;
        }
        Ok(())
    }

    /// Remove the specific page id from the buffer pool, without
    /// writing it. Used by abort, and by external recovery logic to
    /// make sure a rolled back page isn't kept in the cache.
    pub fn discard_page(&self, pid: &HeapPageID) {
        self.buffer.lock().unwrap().remove(pid);
    }

    /// Complete the transaction.
    ///
    /// On abort, every cached page the transaction dirtied is discarded
    /// without touching the disk. On commit, an update record is
    /// appended for every page the transaction dirtied, the log is
    /// forced, and the before-images are refreshed. The pages
    /// themselves are not written (NO-FORCE). Either way the
    /// transaction's latches are released last, exactly once.
    pub fn tx_complete(&self, tx: &Transaction, commit: bool) -> StoreResult {
        let tid = tx.get_id();

        {
            let mut buffer = self.buffer.lock().unwrap();
            let log_manager = Database::log_manager();

            if commit {
                let mut dirtied: Vec<Pod<HeapPage>> = Vec::new();
                for page_pod in buffer.values() {
                    if page_pod.rl().is_dirty() == Some(tid) {
                        log_manager.log_update(tx, page_pod)?;
                        dirtied.push(page_pod.clone());
                    }
                }

                log_manager.log_commit(tx)?;
                log_manager.force()?;

                for page_pod in dirtied {
                    page_pod.wl().set_before_image();
                }
            } else {
                log_manager.log_abort(tx)?;
                buffer.retain(|_, page_pod| page_pod.rl().is_dirty() != Some(tid));
            }
        }

        Database::concurrent_status().remove_relation(tx);
        Ok(())
    }

    /// Add a tuple to the specified table on behalf of the transaction.
    /// May block on latch acquisition. Every modified page is marked
    /// dirty and kept in the cache.
    pub fn insert_tuple(&self, tx: &Transaction, table_id: u32, tuple: &Tuple) -> StoreResult {
        let table_pod = Database::catalog().get_table(&table_id)?;
        let table = table_pod.rl();

        let dirtied = table.insert_tuple(tx, tuple)?;
        self.mark_and_cache(tx, dirtied)
    }

    /// Remove the tuple from its table on behalf of the transaction.
    pub fn delete_tuple(&self, tx: &Transaction, tuple: &Tuple) -> StoreResult {
        let rid = tuple.get_rid().ok_or_else(|| {
            StoreError::illegal_argument("cannot delete a tuple with no record id")
        })?;

        let table_pod = Database::catalog().get_table(&rid.pid.get_table_id())?;
        let table = table_pod.rl();

        let dirtied = table.delete_tuple(tx, tuple)?;
        self.mark_and_cache(tx, dirtied)
    }

    fn mark_and_cache(&self, tx: &Transaction, dirtied: Vec<Pod<HeapPage>>) -> StoreResult {
        for page_pod in dirtied {
            page_pod.wl().mark_dirty(Some(tx.get_id()));

            let pid = page_pod.rl().get_pid();
            let mut buffer = self.buffer.lock().unwrap();
            if !buffer.contains_key(&pid) {
                if buffer.len() >= self.capacity {
                    self.evict_page(&mut buffer)?;
                }
                buffer.insert(pid, page_pod.clone());
            }
        }
        Ok(())
    }

    /// Give the latch on a page back before the transaction completes.
    /// Advisory, and unsafe unless the page was only read.
    pub fn release_page(&self, tx: &Transaction, pid: &HeapPageID) {
        Database::concurrent_status().release_latch(tx, pid);
    }

    pub fn holds_lock(&self, tx: &Transaction, pid: &HeapPageID) -> bool {
        Database::concurrent_status().holds_latch(tx, pid, None)
    }
}
