use strum::{Display, FromRepr};

use crate::error::{HashFileError, HashFileResult};

/// Tag stored in byte 0 of page 0 of every database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum DBFileType {
    Heap = 1,
    BTree = 2,
    ExtendibleHash = 3,
    LinearHash = 4,
    Overflow = 5,
    TxnState = 20,
    Wal = 21,
}

impl DBFileType {
    pub fn from_tag(tag: u8) -> HashFileResult<Self> {
        Self::from_repr(tag)
            .ok_or_else(|| HashFileError::Storage(format!("Unknown file type tag {tag}")))
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}
