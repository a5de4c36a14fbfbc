use std::io::Cursor;

use bit_vec::BitVec;

use crate::{
    error::StoreError,
    io::{read_into, StoreWriter, BIT_VEC_LEN_BYTES},
    storage::{
        buffer_pool::BufferPool,
        schema::Schema,
        tuple::{RecordID, Tuple},
    },
    transaction::TransactionID,
};

use super::HeapPageID;

/// The page capabilities the engine core relies on. The buffer pool and
/// the log manager see pages only through this surface.
pub trait Page {
    fn get_pid(&self) -> HeapPageID;

    /// Serialize the current content of the page.
    fn get_page_data(&self) -> Vec<u8>;

    /// A snapshot of the page content at the last stable point (load or
    /// commit).
    fn get_before_image(&self) -> Vec<u8>;

    /// Capture the current content as the new baseline.
    fn set_before_image(&mut self);

    /// The transaction that dirtied this page, if any.
    fn is_dirty(&self) -> Option<TransactionID>;

    /// Mark the page dirty by the given transaction, or clean with
    /// `None`.
    fn mark_dirty(&mut self, dirty_by: Option<TransactionID>);
}

/// A fixed-size page of a heap file.
///
/// # Layout
///
/// - header: one bit per slot, set when the slot holds a live row,
///   stored through the length-prefixed `BitVec` codec
/// - rows: fixed-width rows, one per slot
/// - padding: zeroes up to the page size
pub struct HeapPage {
    pid: HeapPageID,

    schema: Schema,

    // indicate slots' status: true means occupied, false means empty
    header: BitVec,

    tuples: Vec<Tuple>,

    slot_count: usize,

    old_data: Vec<u8>,

    dirty_by: Option<TransactionID>,
}

impl HeapPage {
    pub fn new(pid: &HeapPageID, bytes: &[u8], schema: &Schema) -> Self {
        let slot_count = Self::calculate_slots_count(schema);

        let mut reader = Cursor::new(bytes);
        let mut header: BitVec = read_into(&mut reader);
        // A page of all zeroes decodes to an empty header; size it to
        // the slot count either way.
        if header.len() < slot_count {
            header.grow(slot_count - header.len(), false);
        }

        let mut tuples: Vec<Tuple> = Vec::with_capacity(slot_count);
        for slot in 0..slot_count {
            let mut tuple = Tuple::read_from(&mut reader, schema);
            tuple.set_rid(Some(RecordID::new(pid, slot)));
            tuples.push(tuple);
        }

        let mut instance = Self {
            pid: *pid,
            schema: schema.clone(),
            header,
            tuples,
            slot_count,
            old_data: Vec::new(),
            dirty_by: None,
        };
        instance.set_before_image();
        instance
    }

    /// How many rows fit in a page: each row costs its width plus one
    /// header bit, and the header codec spends its length prefix first.
    pub fn calculate_slots_count(schema: &Schema) -> usize {
        let page_size = BufferPool::get_page_size();
        ((page_size - BIT_VEC_LEN_BYTES) * 8) / (schema.get_size() * 8 + 1)
    }

    pub fn get_header_size(schema: &Schema) -> usize {
        (Self::calculate_slots_count(schema) + 7) / 8
    }

    pub fn empty_page_data() -> Vec<u8> {
        vec![0; BufferPool::get_page_size()]
    }

    pub fn get_slots_count(&self) -> usize {
        self.slot_count
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.header[slot]
    }

    pub fn empty_slots_count(&self) -> usize {
        (0..self.slot_count).filter(|i| !self.header[*i]).count()
    }

    fn find_empty_slot(&self) -> Option<usize> {
        (0..self.slot_count).find(|i| !self.header[*i])
    }

    /// Place the tuple into the first empty slot and return its record
    /// id.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<RecordID, StoreError> {
        let slot = self
            .find_empty_slot()
            .ok_or_else(|| StoreError::new(&format!("page {:?} is full", self.pid)))?;

        let rid = RecordID::new(&self.pid, slot);

        let mut tuple = tuple.clone();
        tuple.set_rid(Some(rid));
        self.tuples[slot] = tuple;
        self.header.set(slot, true);

        Ok(rid)
    }

    pub fn delete_tuple(&mut self, slot: usize) -> Result<(), StoreError> {
        if slot >= self.slot_count || !self.is_slot_used(slot) {
            return Err(StoreError::illegal_argument(&format!(
                "slot {} of page {:?} holds no row",
                slot, self.pid
            )));
        }

        self.header.set(slot, false);
        Ok(())
    }

    /// Iterate over the live rows of the page.
    pub fn iter(&self) -> impl Iterator<Item = Tuple> + '_ {
        (0..self.slot_count)
            .filter(move |slot| self.header[*slot])
            .map(move |slot| self.tuples[slot].clone())
    }
}

impl Page for HeapPage {
    fn get_pid(&self) -> HeapPageID {
        self.pid
    }

    fn get_page_data(&self) -> Vec<u8> {
        let mut writer = StoreWriter::new();
        writer.write(&self.header);

        let row_size = self.schema.get_size();
        for slot in 0..self.slot_count {
            if self.header[slot] {
                writer.write(&self.tuples[slot]);
            } else {
                writer.write(vec![0u8; row_size].as_slice());
            }
        }

        writer.to_padded_bytes(BufferPool::get_page_size())
    }

    fn get_before_image(&self) -> Vec<u8> {
        self.old_data.clone()
    }

    fn set_before_image(&mut self) {
        self.old_data = self.get_page_data();
    }

    fn is_dirty(&self) -> Option<TransactionID> {
        self.dirty_by
    }

    fn mark_dirty(&mut self, dirty_by: Option<TransactionID>) {
        self.dirty_by = dirty_by;
    }
}
