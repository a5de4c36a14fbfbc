pub mod common;
pub mod error;
pub mod io;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod utils;

pub use common::{Catalog, Database};
pub use storage::heap::HeapTable;
pub use storage::schema::{small_int_schema, Schema};
