use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{common::Database, types::StoreResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransactionStatus {
    Active,
    Aborted,
    Committed,
}

pub type TransactionID = u64;

static TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Eq, Hash, PartialEq, Clone, Copy)]
pub struct Transaction {
    // increase monotonically by 1
    id: TransactionID,
}

impl Transaction {
    pub fn new() -> Self {
        let id = TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        let instance = Self { id };

        instance.start().unwrap();
        Database::concurrent_status().set_transaction_status(id, TransactionStatus::Active);

        instance
    }

    /// A handle for an already-allocated transaction id. Used by flush
    /// paths that know the dirtying transaction only by id; writes no
    /// START record.
    pub fn new_specific_id(id: TransactionID) -> Self {
        Self { id }
    }

    fn start(&self) -> StoreResult {
        Database::log_manager().log_start(self)
    }

    pub fn commit(&self) -> StoreResult {
        self.complete(true)
    }

    pub fn abort(&self) -> StoreResult {
        self.complete(false)
    }

    fn complete(&self, commit: bool) -> StoreResult {
        // The buffer pool drives the completion protocol: log writes on
        // commit, dirty-page discard on abort, latch release at the very
        // end.
        Database::buffer_pool().tx_complete(self, commit)?;

        let status = if commit {
            TransactionStatus::Committed
        } else {
            TransactionStatus::Aborted
        };
        Database::concurrent_status().set_transaction_status(self.id, status);

        Ok(())
    }

    pub fn get_id(&self) -> TransactionID {
        self.id
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        return write!(f, "{}", self);
    }
}
