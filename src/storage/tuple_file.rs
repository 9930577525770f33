use std::fmt::{Debug, Display, Formatter};

use derive_new::new;

use crate::catalog::{SchemaRef, TableStats};
use crate::error::HashFileResult;
use crate::storage::file_type::DBFileType;
use crate::storage::tuple::Tuple;
use crate::storage::PageNo;

/// Which of a table's files a tuple lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Primary,
    Overflow,
}

/// External address of a stored tuple. `offset` names a slot directory
/// entry, so it survives compaction of the page's tuple region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, new)]
pub struct FilePointer {
    pub file: FileKind,
    pub page_no: PageNo,
    pub offset: u16,
}

impl Display for FilePointer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}:{}]", self.file, self.page_no, self.offset)
    }
}

/// A tuple together with where it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTuple {
    pub pointer: FilePointer,
    pub tuple: Tuple,
}

/// Capabilities shared by every tuple storage engine. The engine behind a
/// table is picked from the file type tag of its primary file.
pub trait TupleFile: Debug + Send + Sync {
    fn file_type(&self) -> DBFileType;

    fn schema(&self) -> SchemaRef;

    fn stats(&self) -> TableStats;

    /// First stored tuple, `None` when the table is empty.
    fn get_first_tuple(&self) -> HashFileResult<Option<FileTuple>>;

    /// Tuple following `prev` in a full scan. `prev` may have been deleted
    /// since it was returned.
    fn get_next_tuple(&self, prev: &FilePointer) -> HashFileResult<Option<FileTuple>>;

    fn get_tuple(&self, fptr: &FilePointer) -> HashFileResult<FileTuple>;

    fn add_tuple(&self, tuple: &Tuple) -> HashFileResult<FilePointer>;

    fn update_tuple(&self, fptr: &FilePointer, tuple: &Tuple) -> HashFileResult<()>;

    fn delete_tuple(&self, fptr: &FilePointer) -> HashFileResult<()>;

    /// Recomputes statistics over every tuple and persists them.
    fn analyze(&self) -> HashFileResult<()>;

    /// Consistency problems found in the stored pages, empty when healthy.
    fn verify(&self) -> HashFileResult<Vec<String>>;

    fn optimize(&self) -> HashFileResult<()>;

    fn as_hashed(&self) -> Option<&dyn HashedTupleFile> {
        None
    }
}

/// Bucket layout summary used for cost estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashLayout {
    pub buckets: u64,
    /// Overflow pages holding data, page 0 excluded.
    pub overflow_pages: u32,
}

/// Tuple files that place tuples by a hash of some key columns and can
/// answer equality lookups on them.
pub trait HashedTupleFile: TupleFile {
    /// Ordered column indices making up the hash key.
    fn key_columns(&self) -> &[usize];

    /// `key` holds the key values in `key_columns` order.
    fn find_first_tuple_equals(&self, key: &Tuple) -> HashFileResult<Option<FileTuple>>;

    fn find_next_tuple_equals(
        &self,
        prev: &FilePointer,
        key: &Tuple,
    ) -> HashFileResult<Option<FileTuple>>;

    fn layout(&self) -> HashFileResult<HashLayout>;
}
