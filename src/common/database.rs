use std::{
    mem,
    path::PathBuf,
    sync::{Arc, Once, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use super::Catalog;
use crate::{
    storage::buffer_pool::BufferPool,
    transaction::{ConcurrentStatus, LogManager},
    types::Pod,
    utils::HandyRwLock,
};

/// We collect all global variables here.
///
/// These variables cannot be initialized as static variables, because
/// their initialization functions all rely on non-const fn (e.g.
/// `HashMap::new()`).
///
/// The components that block (`ConcurrentStatus`) or serialize their
/// own I/O (`BufferPool`, `LogManager`) carry an internal monitor and
/// must not be wrapped in an outer lock: a writer guard held across a
/// latch wait would stall every other thread.
pub struct Database {
    path: PathBuf,

    buffer_pool: BufferPool,
    catalog: Pod<Catalog>,
    concurrent_status: ConcurrentStatus,
    log_manager: LogManager,
}

static mut SINGLETON: *mut Database = 0 as *mut Database;

impl Database {
    fn new() -> Self {
        let db_name = "default_db";
        let db_path = PathBuf::from("data").join(db_name);
        if !db_path.exists() {
            std::fs::create_dir_all(&db_path).unwrap();
        }

        let log_path = db_path.join("wal.log");

        Self {
            path: db_path,

            // the capacity setting is read here, when the pool is built
            buffer_pool: BufferPool::new(BufferPool::get_capacity()),
            catalog: Arc::new(RwLock::new(Catalog::new())),
            concurrent_status: ConcurrentStatus::new(),
            log_manager: LogManager::new(log_path),
        }
    }

    /// Reset the memory status of the database, used for tests mostly.
    ///
    /// Actions:
    /// - Page cache will be rebuilt with the current page-size/capacity
    ///   settings.
    /// - Catalog will be cleared.
    /// - Lock tables and waits-for graph will be cleared.
    /// - The log manager is reopened on the existing log file.
    pub fn reset() {
        // Initialize the new db instance.
        let singleton = Self::new();

        unsafe {
            if !SINGLETON.is_null() {
                // Drop the previous db instance if it's already
                // initialized.
                mem::drop(Box::from_raw(SINGLETON));
            }

            // Put it in the heap so it can outlive this call.
            SINGLETON = mem::transmute(Box::new(singleton));
        }
    }

    pub fn global() -> &'static Self {
        static ONCE: Once = Once::new();

        ONCE.call_once(|| {
            // Make it
            let singleton = Self::new();

            unsafe {
                // Put it in the heap so it can outlive this call
                SINGLETON = mem::transmute(Box::new(singleton));
            }
        });

        unsafe { SINGLETON.as_ref().unwrap() }
    }

    pub fn buffer_pool() -> &'static BufferPool {
        &Self::global().buffer_pool
    }

    pub fn concurrent_status() -> &'static ConcurrentStatus {
        &Self::global().concurrent_status
    }

    pub fn log_manager() -> &'static LogManager {
        &Self::global().log_manager
    }

    pub fn catalog() -> RwLockReadGuard<'static, Catalog> {
        Self::global().catalog.rl()
    }

    pub fn mut_catalog() -> RwLockWriteGuard<'static, Catalog> {
        Self::global().catalog.wl()
    }

    pub fn get_path(&self) -> PathBuf {
        self.path.clone()
    }
}
