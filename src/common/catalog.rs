use std::collections::HashMap;

use crate::{
    error::StoreError,
    storage::heap::HeapTable,
    types::{Pod, ResultPod},
    utils::HandyRwLock,
};

/// Resolves a table id to its heap file and schema.
pub struct Catalog {
    table_id_table_map: HashMap<Key, Value>,
}

type Key = u32;
type Value = Pod<HeapTable>;

impl Catalog {
    pub fn new() -> Self {
        Self {
            table_id_table_map: HashMap::new(),
        }
    }

    pub fn add_table(&mut self, table: Pod<HeapTable>) {
        let table_id = table.rl().get_id();
        self.table_id_table_map.insert(table_id, table);
    }

    pub fn get_table(&self, table_id: &Key) -> ResultPod<HeapTable> {
        self.table_id_table_map
            .get(table_id)
            .cloned()
            .ok_or_else(|| StoreError::new(&format!("table {} not found", table_id)))
    }

    pub fn tables_count(&self) -> usize {
        self.table_id_table_map.len()
    }

    pub fn clear(&mut self) {
        self.table_id_table_map.clear();
    }
}
