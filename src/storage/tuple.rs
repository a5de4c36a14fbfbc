use std::{fmt, io::Read};

use crate::{
    io::{Decodeable, Encodeable},
    storage::{
        heap::HeapPageID,
        schema::{Schema, Type},
    },
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Cell {
    Int64(i64),
}

impl Encodeable for Cell {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            Cell::Int64(v) => v.to_le_bytes().to_vec(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::Int64(v) => write!(f, "{}", v),
        }
    }
}

/// Identity of a stored row: the page it lives in and its slot there.
/// Attached to a tuple when it is materialized from a page or placed
/// into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordID {
    pub pid: HeapPageID,
    pub slot: usize,
}

impl RecordID {
    pub fn new(pid: &HeapPageID, slot: usize) -> Self {
        Self { pid: *pid, slot }
    }
}

#[derive(Clone)]
pub struct Tuple {
    cells: Vec<Cell>,

    rid: Option<RecordID>,
}

/// Row equality is content equality; where the row lives doesn't count.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

impl Tuple {
    pub fn new_from_cells(cells: &[Cell]) -> Self {
        Self {
            cells: cells.to_vec(),
            rid: None,
        }
    }

    pub fn new_int_tuples(value: i64, width: usize) -> Self {
        let cells = vec![Cell::Int64(value); width];
        Tuple { cells, rid: None }
    }

    pub fn read_from<R: Read>(reader: &mut R, schema: &Schema) -> Self {
        let mut cells: Vec<Cell> = Vec::new();
        for field in &schema.fields {
            match field.t {
                Type::Int64 => {
                    cells.push(Cell::Int64(i64::read_from(reader)));
                }
            }
        }
        Tuple { cells, rid: None }
    }

    pub fn get_cell(&self, i: usize) -> Cell {
        self.cells[i].clone()
    }

    pub fn get_rid(&self) -> Option<RecordID> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Option<RecordID>) {
        self.rid = rid;
    }
}

impl Encodeable for Tuple {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for cell in &self.cells {
            bytes.append(&mut cell.to_bytes());
        }
        bytes
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let content: Vec<String> = self.cells.iter().map(|c| c.to_string()).collect();
        write!(f, "({})", content.join(", "))
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
