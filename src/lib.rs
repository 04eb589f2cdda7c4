pub mod storage;
pub mod types;

pub use storage::schema::{Column, Schema, SchemaManager};
pub use storage::table_manager::TableManager;
pub use types::error::{DatabaseError, Result};
pub use types::record::{Record, Row};
pub use types::value::{ColumnType, Value};
