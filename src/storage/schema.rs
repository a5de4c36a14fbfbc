use std::mem::size_of;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Type {
    Int64,
}

impl Type {
    /// Field width in bytes.
    pub fn get_size(&self) -> usize {
        match self {
            Type::Int64 => size_of::<i64>(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldItem {
    pub field_name: String,
    pub t: Type,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub fields: Vec<FieldItem>,
}

impl Schema {
    pub fn new(fields: Vec<FieldItem>) -> Schema {
        Schema { fields }
    }

    /// Get row size in bytes.
    pub fn get_size(&self) -> usize {
        self.fields.iter().map(|f| f.t.get_size()).sum()
    }
}

pub fn small_int_schema(width: usize, name_prefix: &str) -> Schema {
    let mut fields: Vec<FieldItem> = Vec::new();
    for i in 0..width {
        let field = FieldItem {
            field_name: format!("{}-{}", name_prefix, i),
            t: Type::Int64,
        };
        fields.push(field);
    }

    Schema { fields }
}
