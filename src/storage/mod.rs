pub mod codec;
pub mod disk_manager;
pub mod file_type;
pub mod hash;
pub mod linhash;
pub mod manager;
pub mod page;
pub mod tuple;
pub mod tuple_file;

pub type PageNo = u32;
pub type FileId = u32;

pub use file_type::DBFileType;
pub use linhash::LinHashTupleFile;
pub use manager::StorageManager;
pub use tuple_file::{FileKind, FilePointer, FileTuple, HashLayout, HashedTupleFile, TupleFile};
