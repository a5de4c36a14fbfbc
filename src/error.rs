use std::{error::Error, fmt};

use backtrace::Backtrace;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ErrorKind {
    Internal,

    /// Deadlock detected while the transaction was waiting for a page
    /// latch. The transaction driver is expected to abort the
    /// transaction and may retry it.
    TransactionAborted,

    Io,

    /// Caller bug, e.g. reading a page that doesn't exist in the table
    /// file.
    IllegalArgument,
}

pub struct StoreError {
    kind: ErrorKind,
    details: String,
    backtrace: Backtrace,
}

impl StoreError {
    pub fn new(msg: &str) -> StoreError {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    pub fn aborted(msg: &str) -> StoreError {
        Self::with_kind(ErrorKind::TransactionAborted, msg)
    }

    pub fn io(msg: &str) -> StoreError {
        Self::with_kind(ErrorKind::Io, msg)
    }

    pub fn illegal_argument(msg: &str) -> StoreError {
        Self::with_kind(ErrorKind::IllegalArgument, msg)
    }

    fn with_kind(kind: ErrorKind, msg: &str) -> StoreError {
        StoreError {
            kind,
            details: msg.to_string(),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    pub fn get_kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_transaction_aborted(&self) -> bool {
        self.kind == ErrorKind::TransactionAborted
    }

    pub fn show_backtrace(&self) {
        let mut backtrace = self.backtrace.clone();
        backtrace.resolve();
        eprintln!("{}\n{:?}", self.details, backtrace);
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.details)
    }
}

impl fmt::Debug for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::io(&e.to_string())
    }
}
