mod column;
mod data_type;
mod schema;
mod stats;

pub use column::{Column, ColumnRef};
pub use data_type::DataType;
pub use schema::*;
pub use stats::*;
