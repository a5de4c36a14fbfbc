use std::{fmt, io::Read};

use crate::io::{Decodeable, Encodeable, StoreWriter};

/// HeapPageID identifies a unique page in a heap file.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct HeapPageID {
    pub table_id: u32,

    /// The position of the page in the table file, start from 0.
    pub page_index: u32,
}

impl HeapPageID {
    pub fn new(table_id: u32, page_index: u32) -> Self {
        Self {
            table_id,
            page_index,
        }
    }

    pub fn get_table_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_short_repr(&self) -> String {
        format!("t{}_p{}", self.table_id, self.page_index)
    }
}

impl fmt::Display for HeapPageID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get_short_repr())
    }
}

impl fmt::Debug for HeapPageID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Encodeable for HeapPageID {
    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = StoreWriter::new();
        writer.write(&self.table_id);
        writer.write(&self.page_index);
        writer.to_bytes()
    }
}

impl Decodeable for HeapPageID {
    fn read_from<R: Read>(reader: &mut R) -> Self {
        let table_id = u32::read_from(reader);
        let page_index = u32::read_from(reader);
        Self {
            table_id,
            page_index,
        }
    }
}
