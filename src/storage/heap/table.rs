use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex, MutexGuard,
    },
};

use log::{debug, error};

use crate::{
    common::Database,
    error::StoreError,
    storage::{
        buffer_pool::BufferPool,
        heap::{HeapPage, HeapPageID},
        schema::Schema,
        tuple::Tuple,
    },
    transaction::{Permission, Transaction},
    types::{Pod, StoreResult},
    utils::HandyRwLock,
};

static TABLE_ID: AtomicU32 = AtomicU32::new(1);

/// A table stored as a heap file: an unordered sequence of fixed-size
/// pages. All page access goes through the buffer pool, which is where
/// latching happens.
pub struct HeapTable {
    name: String,

    table_id: u32,

    schema: Schema,

    file: Mutex<File>,
}

impl HeapTable {
    /// Create a heap table backed by `<data dir>/<name>.db`. The file is
    /// kept if it already exists.
    pub fn new(name: &str, schema: &Schema) -> Self {
        let file_path = Database::global().get_path().join(format!("{}.db", name));
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(&file_path)
            .unwrap();

        Self {
            name: name.to_string(),
            table_id: TABLE_ID.fetch_add(1, Ordering::Relaxed),
            schema: schema.clone(),
            file: Mutex::new(file),
        }
    }

    pub fn get_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }

    fn get_file(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap()
    }

    pub fn pages_count(&self) -> u32 {
        let len = self.get_file().metadata().unwrap().len();
        (len / BufferPool::get_page_size() as u64) as u32
    }

    /// Read a page from the table file. Asking for a page past the end
    /// of the file is a caller bug.
    pub fn read_page(&self, pid: &HeapPageID) -> Result<HeapPage, StoreError> {
        if pid.page_index >= self.pages_count() {
            return Err(StoreError::illegal_argument(&format!(
                "page {:?} does not exist in table {}, pages count: {}",
                pid,
                self.name,
                self.pages_count()
            )));
        }

        let page_size = BufferPool::get_page_size();
        let start_pos = pid.page_index as u64 * page_size as u64;

        let mut file = self.get_file();
        file.seek(SeekFrom::Start(start_pos))?;

        let mut buf: Vec<u8> = vec![0; page_size];
        file.read_exact(&mut buf)?;

        debug!("read page {:?} from table {}", pid, self.name);
        Ok(HeapPage::new(pid, &buf, &self.schema))
    }

    /// Write the serialized content of a page at its position in the
    /// table file.
    pub fn write_page(&self, pid: &HeapPageID, data: &[u8]) -> StoreResult {
        let page_size = BufferPool::get_page_size();
        let start_pos = pid.page_index as u64 * page_size as u64;

        let mut file = self.get_file();
        file.seek(SeekFrom::Start(start_pos))?;
        file.write_all(data)?;
        file.flush()?;

        debug!("wrote page {:?} to table {}", pid, self.name);
        Ok(())
    }

    pub fn write_empty_page_to_disk(&self, pid: &HeapPageID) -> StoreResult {
        self.write_page(pid, &HeapPage::empty_page_data())
    }

    /// Add a tuple to the table on behalf of the transaction. Scans the
    /// pages for a free slot under a write latch, giving the latch back
    /// on full pages; appends a fresh page when every page is packed.
    ///
    /// Returns the pages that were modified.
    pub fn insert_tuple(
        &self,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> Result<Vec<Pod<HeapPage>>, StoreError> {
        for page_index in 0..self.pages_count() {
            let pid = HeapPageID::new(self.table_id, page_index);
            let page_pod = Database::buffer_pool().get_page(tx, Permission::ReadWrite, &pid)?;

            let has_room = page_pod.rl().empty_slots_count() > 0;
            if has_room {
                page_pod.wl().insert_tuple(tuple)?;
                return Ok(vec![page_pod]);
            }

            // The page is full and untouched: hand the latch back so
            // writers don't pile up behind it.
            Database::buffer_pool().release_page(tx, &pid);
        }

        // No free slot anywhere, append a fresh page to the file.
        let pid = HeapPageID::new(self.table_id, self.pages_count());
        self.write_empty_page_to_disk(&pid)?;

        let page_pod = Database::buffer_pool().get_page(tx, Permission::ReadWrite, &pid)?;
        page_pod.wl().insert_tuple(tuple)?;
        Ok(vec![page_pod])
    }

    /// Remove a tuple (addressed by its record id) on behalf of the
    /// transaction. Returns the pages that were modified.
    pub fn delete_tuple(
        &self,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> Result<Vec<Pod<HeapPage>>, StoreError> {
        let rid = tuple.get_rid().ok_or_else(|| {
            StoreError::illegal_argument("cannot delete a tuple with no record id")
        })?;

        let page_pod = Database::buffer_pool().get_page(tx, Permission::ReadWrite, &rid.pid)?;
        page_pod.wl().delete_tuple(rid.slot)?;
        Ok(vec![page_pod])
    }

    /// Scan the table page by page under read latches.
    pub fn iter(&self, tx: &Transaction) -> HeapTableIterator {
        HeapTableIterator {
            table_id: self.table_id,
            pages_count: self.pages_count(),
            tx: *tx,
            page_index: 0,
            rows: VecDeque::new(),
        }
    }

    pub fn tuples_count(&self, tx: &Transaction) -> usize {
        self.iter(tx).count()
    }
}

pub struct HeapTableIterator {
    table_id: u32,
    pages_count: u32,
    tx: Transaction,
    page_index: u32,
    rows: VecDeque<Tuple>,
}

impl Iterator for HeapTableIterator {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        loop {
            if let Some(tuple) = self.rows.pop_front() {
                return Some(tuple);
            }

            if self.page_index >= self.pages_count {
                return None;
            }

            let pid = HeapPageID::new(self.table_id, self.page_index);
            self.page_index += 1;

            match Database::buffer_pool().get_page(&self.tx, Permission::ReadOnly, &pid) {
                Ok(page_pod) => {
                    let page = page_pod.rl();
                    self.rows.extend(page.iter());
                }
                Err(e) => {
                    error!("scan of page {:?} failed: {}", pid, e);
                    return None;
                }
            }
        }
    }
}
