mod manager;
mod tuple_file;

pub use manager::{overflow_path, primary_path};
pub use tuple_file::LinHashTupleFile;
