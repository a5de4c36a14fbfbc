use core::fmt;
use std::{
    collections::{HashMap, HashSet},
    sync::{Condvar, Mutex},
};

use log::debug;

use crate::{
    error::StoreError,
    storage::heap::HeapPageID,
    transaction::{Transaction, TransactionID, TransactionStatus},
    types::StoreResult,
};

use super::wait_for_graph::WaitForGraph;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Lock {
    SLock,
    XLock,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(&self) -> Lock {
        match self {
            Permission::ReadOnly => Lock::SLock,
            Permission::ReadWrite => Lock::XLock,
        }
    }
}

struct LockTables {
    // key is present iff the holder set is non-empty
    s_latch_map: HashMap<HeapPageID, HashSet<TransactionID>>,

    // at most one holder per page
    x_latch_map: HashMap<HeapPageID, TransactionID>,

    // reverse index, used by release-all and flush-pages
    hold_pages: HashMap<TransactionID, HashSet<HeapPageID>>,

    wait_for_graph: WaitForGraph,

    // Transaction status, used for transaction isolation, the idea is from PostgreSQL.
    //
    // PostgreSQL maintains a data structure for transaction status, such that given a transaction
    // ID, it gives the transaction state (running, aborted, committed).
    transaction_status: HashMap<TransactionID, TransactionStatus>,
}

impl LockTables {
    fn new() -> Self {
        Self {
            s_latch_map: HashMap::new(),
            x_latch_map: HashMap::new(),
            hold_pages: HashMap::new(),
            wait_for_graph: WaitForGraph::new(),
            transaction_status: HashMap::new(),
        }
    }

    fn holds(&self, tid: TransactionID, page_id: &HeapPageID, lock: Option<&Lock>) -> bool {
        let holds_s = self
            .s_latch_map
            .get(page_id)
            .map_or(false, |holders| holders.contains(&tid));
        let holds_x = self.x_latch_map.get(page_id) == Some(&tid);

        match lock {
            Some(Lock::SLock) => holds_s,
            Some(Lock::XLock) => holds_x,
            None => holds_s || holds_x,
        }
    }

    /// Whether the latch could be granted to the transaction right now.
    fn latch_grantable(&self, tid: TransactionID, lock: &Lock, page_id: &HeapPageID) -> bool {
        // A stronger latch held by the transaction itself subsumes any
        // request; one held by somebody else blocks it.
        if let Some(&holder) = self.x_latch_map.get(page_id) {
            return holder == tid;
        }

        match lock {
            Lock::SLock => true,
            Lock::XLock => match self.s_latch_map.get(page_id) {
                // the sole-shared-holder case is the upgrade path
                Some(holders) => holders.len() == 1 && holders.contains(&tid),
                None => true,
            },
        }
    }

    /// Mutate the latch maps for a grant. Only called when
    /// `latch_grantable` returned true, under the monitor.
    fn add_latch(&mut self, tid: TransactionID, lock: &Lock, page_id: &HeapPageID) {
        match lock {
            Lock::SLock => {
                self.s_latch_map
                    .entry(*page_id)
                    .or_insert_with(HashSet::new)
                    .insert(tid);
            }
            Lock::XLock => {
                // upgrade: the shared entry is dropped in the same
                // monitor section that installs the exclusive one
                if let Some(holders) = self.s_latch_map.get_mut(page_id) {
                    holders.remove(&tid);
                    if holders.is_empty() {
                        self.s_latch_map.remove(page_id);
                    }
                }

                self.x_latch_map.insert(*page_id, tid);
            }
        }

        self.hold_pages
            .entry(tid)
            .or_insert_with(HashSet::new)
            .insert(*page_id);
    }

    /// Record who the transaction is waiting for.
    fn add_wait_edges(&mut self, tid: TransactionID, lock: &Lock, page_id: &HeapPageID) {
        // Every request has to wait for the transaction that holds the
        // X-Latch.
        if let Some(&x_holder) = self.x_latch_map.get(page_id) {
            self.wait_for_graph.add_edge(tid, x_holder);
        }

        // Only an "XLock" request has to wait for the transactions that
        // hold the S-Latch.
        if lock == &Lock::XLock {
            if let Some(s_holders) = self.s_latch_map.get(page_id) {
                self.wait_for_graph.add_edges(tid, s_holders.iter().copied());
            }
        }
    }

    fn release_latch(&mut self, tid: TransactionID, page_id: &HeapPageID) {
        if let Some(holders) = self.s_latch_map.get_mut(page_id) {
            holders.remove(&tid);
            if holders.is_empty() {
                self.s_latch_map.remove(page_id);
            }
        }

        if self.x_latch_map.get(page_id) == Some(&tid) {
            self.x_latch_map.remove(page_id);
        }
    }
}

/// The lock manager. Page-level shared/exclusive latches with upgrade,
/// two-phase release, and deadlock detection on the waits-for graph.
///
/// All state lives under a single monitor; waiting is realized on the
/// condition variable, which is broadcast on every release. A blocked
/// request re-examines the grant conditions and the waits-for graph on
/// every wake-up.
pub struct ConcurrentStatus {
    tables: Mutex<LockTables>,
    waiters: Condvar,
}

impl ConcurrentStatus {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(LockTables::new()),
            waiters: Condvar::new(),
        }
    }

    /// Request a latch on the given page. This api is blocking: it
    /// returns once the latch is granted, or fails with a
    /// transaction-aborted error when the wait would close a cycle in
    /// the waits-for graph.
    pub fn request_latch(
        &self,
        tx: &Transaction,
        lock: &Lock,
        page_id: &HeapPageID,
    ) -> StoreResult {
        debug!(
            "request latch, tx: {:?}, lock: {:?}, page_id: {:?}",
            tx, lock, page_id
        );

        let tid = tx.get_id();
        let mut tables = self.tables.lock().unwrap();

        loop {
            // Already holding a sufficient latch. Note that a weaker
            // request never downgrades a stronger latch (two-phase).
            let sufficient = match lock {
                Lock::SLock => tables.holds(tid, page_id, None),
                Lock::XLock => tables.holds(tid, page_id, Some(&Lock::XLock)),
            };
            if sufficient {
                return Ok(());
            }

            if tables.latch_grantable(tid, lock, page_id) {
                tables.add_latch(tid, lock, page_id);
                tables.wait_for_graph.remove_node(tid);

                debug!(
                    "latch acquired, tx: {}, lock: {:?}, page_id: {:?}",
                    tx, lock, page_id
                );
                return Ok(());
            }

            // Blocked: refresh the out-edges to the current holders,
            // then check for a deadlock involving this transaction.
            tables.wait_for_graph.remove_waiter(tid);
            tables.add_wait_edges(tid, lock, page_id);

            if tables.wait_for_graph.has_cycle_from(tid) {
                tables.wait_for_graph.remove_node(tid);

                let err = StoreError::aborted(&format!(
                    "deadlock detected, args: {:?}, {:?}, {:?}",
                    tx, lock, page_id
                ));
                debug!("{}\nconcurrent status: {}", err, tables);
                return Err(err);
            }

            tables = self.waiters.wait(tables).unwrap();
        }
    }

    /// Check if the transaction holds a latch on the page. `None` works
    /// as a wildcard matching either mode.
    pub fn holds_latch(
        &self,
        tx: &Transaction,
        page_id: &HeapPageID,
        lock: Option<&Lock>,
    ) -> bool {
        self.tables.lock().unwrap().holds(tx.get_id(), page_id, lock)
    }

    pub(crate) fn tid_holds_any_latch(&self, tid: TransactionID, page_id: &HeapPageID) -> bool {
        self.tables.lock().unwrap().holds(tid, page_id, None)
    }

    /// Release the latch of a single page and wake all waiters.
    ///
    /// Advisory api: releasing before transaction completion is only
    /// safe for pages used read-only.
    pub fn release_latch(&self, tx: &Transaction, page_id: &HeapPageID) {
        let tid = tx.get_id();
        let mut tables = self.tables.lock().unwrap();

        tables.release_latch(tid, page_id);
        let now_empty = match tables.hold_pages.get_mut(&tid) {
            Some(pages) => {
                pages.remove(page_id);
                pages.is_empty()
            }
            None => false,
        };
        if now_empty {
            tables.hold_pages.remove(&tid);
        }

        debug!("latch released, tx: {}, page_id: {:?}", tx, page_id);
        self.waiters.notify_all();
    }

    /// Release every latch held by the transaction and purge it from
    /// the waits-for graph. The two-phase release point, called by
    /// transaction completion.
    pub fn remove_relation(&self, tx: &Transaction) {
        let tid = tx.get_id();
        let mut tables = self.tables.lock().unwrap();

        if let Some(pages) = tables.hold_pages.remove(&tid) {
            for page_id in pages {
                tables.release_latch(tid, &page_id);
            }
        }
        tables.wait_for_graph.remove_node(tid);

        debug!("all latches released, tx: {}", tx);
        self.waiters.notify_all();
    }

    /// The pages the transaction currently holds a latch on.
    pub fn holding_pages(&self, tx: &Transaction) -> HashSet<HeapPageID> {
        self.tables
            .lock()
            .unwrap()
            .hold_pages
            .get(&tx.get_id())
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_transaction_status(&self, tid: TransactionID, status: TransactionStatus) {
        self.tables
            .lock()
            .unwrap()
            .transaction_status
            .insert(tid, status);
    }

    pub fn get_transaction_status(&self, tid: TransactionID) -> Option<TransactionStatus> {
        self.tables
            .lock()
            .unwrap()
            .transaction_status
            .get(&tid)
            .copied()
    }

    pub fn clear(&self) {
        let mut tables = self.tables.lock().unwrap();
        *tables = LockTables::new();
        self.waiters.notify_all();
    }
}

impl fmt::Display for LockTables {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut depiction = "\n".to_string();

        // s_latch_map
        depiction.push_str("s_latch_map: {");
        for (k, v) in self.s_latch_map.iter() {
            depiction.push_str(&format!("\n\t{:?} -> {:?},", k.get_short_repr(), v));
        }
        depiction.push_str("\n}\n");

        // x_latch_map
        depiction.push_str("x_latch_map: {");
        for (k, v) in self.x_latch_map.iter() {
            depiction.push_str(&format!("\n\t{:?} -> {:?},", k.get_short_repr(), v));
        }
        depiction.push_str("\n}\n");

        // hold_pages
        depiction.push_str("hold_pages: {");
        for (k, v) in self.hold_pages.iter() {
            depiction.push_str(&format!("\n\t{:?} -> [", k));
            for page_id in v {
                depiction.push_str(&format!("{:?}, ", page_id.get_short_repr()));
            }
            depiction.push_str("]\n");
        }
        depiction.push_str("}\n");

        // wait_for_graph
        depiction.push_str(&format!("wait_for_graph: {:?}\n", self.wait_for_graph));

        write!(f, "{}", depiction)
    }
}

impl fmt::Display for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tables.lock().unwrap())
    }
}

impl fmt::Debug for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
